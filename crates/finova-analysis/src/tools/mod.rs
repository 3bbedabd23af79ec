//! Financial calculation tools

pub mod calculations;
pub mod calculator;
pub mod expression;
pub mod historical;

pub use calculations::{
    CalculateAverage, CalculateDupontRoe, CalculatePercentage, CalculateRatio, CalculateTotal,
    ExtractValuesByYear,
};
pub use calculator::AdvancedCalculator;
pub use expression::{ExpressionError, evaluate};
pub use historical::{GetHistoricalData, HistoricalDataSource, InMemoryHistoricalSource};
