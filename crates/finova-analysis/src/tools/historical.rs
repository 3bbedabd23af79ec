//! Historical financial data lookup

use async_trait::async_trait;
use finova_core::Result;
use finova_tools::{Tool, schema};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::normalize::bind_args;

/// Source of previously stored financial records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoricalDataSource: Send + Sync {
    /// Record for a company and period, `None` when nothing is stored
    async fn fetch(&self, company_id: &str, period: &str) -> Result<Option<Value>>;
}

/// Historical records held in memory, keyed by company and period
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoricalSource {
    records: HashMap<(String, String), Value>,
}

impl InMemoryHistoricalSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing any previous one for the same key
    pub fn with_record(
        mut self,
        company_id: impl Into<String>,
        period: impl Into<String>,
        record: Value,
    ) -> Self {
        self.insert(company_id, period, record);
        self
    }

    /// Insert a record
    pub fn insert(
        &mut self,
        company_id: impl Into<String>,
        period: impl Into<String>,
        record: Value,
    ) {
        self.records
            .insert((company_id.into(), period.into()), record);
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl HistoricalDataSource for InMemoryHistoricalSource {
    async fn fetch(&self, company_id: &str, period: &str) -> Result<Option<Value>> {
        Ok(self
            .records
            .get(&(company_id.to_string(), period.to_string()))
            .cloned())
    }
}

/// Tool exposing a [`HistoricalDataSource`] to the model
pub struct GetHistoricalData {
    source: Arc<dyn HistoricalDataSource>,
}

const HISTORICAL_PARAMS: &[&[&str]] = &[
    &["company_id", "company", "companyid"],
    &["period", "year", "date"],
];

impl GetHistoricalData {
    /// Create the tool over a data source
    pub fn new(source: Arc<dyn HistoricalDataSource>) -> Self {
        Self { source }
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Tool for GetHistoricalData {
    async fn execute(&self, params: Value) -> Result<Value> {
        let args = bind_args(&params, HISTORICAL_PARAMS);
        let company_id = as_text(&args[0]);
        let period = as_text(&args[1]);
        if company_id.is_empty() {
            return Err(finova_core::Error::InvalidInput(
                "company_id is required".to_string(),
            ));
        }

        let record = self.source.fetch(&company_id, &period).await?;
        debug!(
            company_id = %company_id,
            period = %period,
            found = record.is_some(),
            "Historical lookup"
        );
        Ok(record.unwrap_or(Value::Null))
    }

    fn name(&self) -> &str {
        "get_historical_data"
    }

    fn description(&self) -> &str {
        "Fetch stored financial data of a company for a period. Input: \
         {\"company_id\": \"...\", \"period\": \"2023\"}. Returns the stored record, \
         or null when there is none."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "company_id": schema::string("Company identifier"),
                "period": schema::string("Period label, e.g. 2023 or January 2024"),
            }),
            &["company_id", "period"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let source = InMemoryHistoricalSource::new().with_record(
            "acme",
            "2023",
            json!({"revenue": 1200}),
        );
        let tool = GetHistoricalData::new(Arc::new(source));

        let found = tool
            .execute(json!({"company_id": "acme", "period": "2023"}))
            .await
            .unwrap();
        assert_eq!(found, json!({"revenue": 1200}));

        let missing = tool.execute(json!(["acme", "2019"])).await.unwrap();
        assert_eq!(missing, Value::Null);
    }

    #[tokio::test]
    async fn test_requires_company() {
        let tool = GetHistoricalData::new(Arc::new(InMemoryHistoricalSource::new()));
        assert_err!(tool.execute(json!({"period": "2023"})).await);
        assert_ok!(tool.execute(json!("acme, 2023")).await);
    }

    #[tokio::test]
    async fn test_source_errors_propagate() {
        let mut source = MockHistoricalDataSource::new();
        source
            .expect_fetch()
            .with(eq("acme"), eq("2024"))
            .times(1)
            .returning(|_, _| Err(finova_core::Error::ProcessingFailed("store down".to_string())));
        let tool = GetHistoricalData::new(Arc::new(source));

        let err = tool
            .execute(json!({"company": "acme", "year": 2024}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("store down"));
    }
}
