//! Assembly of the financial toolbox

use finova_core::Result;
use finova_tools::ToolRegistry;
use std::sync::Arc;

use crate::tools::{
    AdvancedCalculator, CalculateAverage, CalculateDupontRoe, CalculatePercentage, CalculateRatio,
    CalculateTotal, ExtractValuesByYear, GetHistoricalData, HistoricalDataSource,
};

/// Build the fixed toolbox shared by every analysis
///
/// Registration order is the order the model sees in the catalog.
pub fn financial_toolbox(
    calculator: AdvancedCalculator,
    historical: Arc<dyn HistoricalDataSource>,
) -> Result<ToolRegistry> {
    ToolRegistry::builder()
        .register(Arc::new(CalculateTotal))
        .register(Arc::new(CalculateAverage))
        .register(Arc::new(CalculatePercentage))
        .register(Arc::new(calculator))
        .register(Arc::new(ExtractValuesByYear))
        .register(Arc::new(CalculateDupontRoe))
        .register(Arc::new(CalculateRatio))
        .register(Arc::new(GetHistoricalData::new(historical)))
        .build()
}
