//! Inbound analysis payloads
//!
//! Payloads have no fixed shape. Known sections are classified into typed
//! records; everything else is kept as [`FinancialRecord::Other`]. The raw
//! object is retained verbatim because it is what the model gets to see.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::error::{AnalysisError, Result};
use crate::normalize::to_float;

fn lenient_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<f64, D::Error> {
    Ok(to_float(&Value::deserialize(deserializer)?))
}

fn lenient_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        other => Some(to_float(&other)),
    })
}

/// Basic business information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessInfo {
    #[serde(alias = "business_name", alias = "company_name")]
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Product-based, service-based or mixed
    #[serde(default)]
    pub business_type: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub established_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_currency() -> String {
    "GHS".to_string()
}

/// Time span under analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub period_type: Option<String>,
    #[serde(default)]
    pub previous_periods: Option<u32>,
}

/// Fields shared by every dated record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBase {
    pub date: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default, alias = "product")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_optional")]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub customer_type: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default, alias = "service")]
    pub service_name: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default)]
    pub item_name: Option<String>,
    /// Counted quantity; units such as `50 kg` are dropped
    #[serde(default, deserialize_with = "lenient_optional")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_optional")]
    pub unit_cost: Option<f64>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default)]
    pub expense_type: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiabilityRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default)]
    pub creditor: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Current or non-current
    #[serde(default)]
    pub liability_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(flatten)]
    pub base: RecordBase,
    #[serde(default)]
    pub asset_name: Option<String>,
    /// Current or non-current
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional")]
    pub depreciation: Option<f64>,
}

/// One classified piece of an analysis payload
#[derive(Debug, Clone, PartialEq)]
pub enum FinancialRecord {
    BusinessInfo(BusinessInfo),
    Period(FinancialPeriod),
    Sales(SalesRecord),
    Service(ServiceRecord),
    Inventory(InventoryRecord),
    Expense(ExpenseRecord),
    Liability(LiabilityRecord),
    Asset(AssetRecord),
    /// Anything unrecognised, kept with the key it appeared under
    Other { key: String, value: Value },
}

impl FinancialRecord {
    /// Shared fields of dated records
    pub fn base(&self) -> Option<&RecordBase> {
        match self {
            Self::Sales(r) => Some(&r.base),
            Self::Service(r) => Some(&r.base),
            Self::Inventory(r) => Some(&r.base),
            Self::Expense(r) => Some(&r.base),
            Self::Liability(r) => Some(&r.base),
            Self::Asset(r) => Some(&r.base),
            Self::BusinessInfo(_) | Self::Period(_) | Self::Other { .. } => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Section {
    Sales,
    Service,
    Inventory,
    Expense,
    Liability,
    Asset,
}

impl Section {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "sales" | "sales_records" => Some(Self::Sales),
            "services" | "service_records" => Some(Self::Service),
            "inventory" | "inventory_records" => Some(Self::Inventory),
            "expenses" | "expense_records" => Some(Self::Expense),
            "liabilities" | "liability_records" => Some(Self::Liability),
            "assets" | "asset_records" => Some(Self::Asset),
            _ => None,
        }
    }

    fn classify(self, element: &Value) -> Option<FinancialRecord> {
        let element = element.clone();
        match self {
            Self::Sales => serde_json::from_value(element).ok().map(FinancialRecord::Sales),
            Self::Service => serde_json::from_value(element)
                .ok()
                .map(FinancialRecord::Service),
            Self::Inventory => serde_json::from_value(element)
                .ok()
                .map(FinancialRecord::Inventory),
            Self::Expense => serde_json::from_value(element)
                .ok()
                .map(FinancialRecord::Expense),
            Self::Liability => serde_json::from_value(element)
                .ok()
                .map(FinancialRecord::Liability),
            Self::Asset => serde_json::from_value(element).ok().map(FinancialRecord::Asset),
        }
    }
}

/// A classified analysis payload
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    raw: Map<String, Value>,
    records: Vec<FinancialRecord>,
}

impl AnalysisRequest {
    /// Classify a payload; anything but a JSON object is rejected
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(raw) = value else {
            return Err(AnalysisError::InvalidRequest(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        };

        let mut records = Vec::new();
        for (key, value) in &raw {
            classify_entry(key, value, &mut records);
        }

        Ok(Self { raw, records })
    }

    /// The payload exactly as received
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// The payload as a JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    /// Classified records, in key order
    pub fn records(&self) -> &[FinancialRecord] {
        &self.records
    }

    pub fn business_info(&self) -> Option<&BusinessInfo> {
        self.records.iter().find_map(|r| match r {
            FinancialRecord::BusinessInfo(info) => Some(info),
            _ => None,
        })
    }

    pub fn period(&self) -> Option<&FinancialPeriod> {
        self.records.iter().find_map(|r| match r {
            FinancialRecord::Period(period) => Some(period),
            _ => None,
        })
    }

    /// Company name from the business info or a top-level name field
    pub fn company_name(&self) -> Option<&str> {
        self.business_info()
            .map(|info| info.name.as_str())
            .or_else(|| {
                ["company_name", "companyName", "business_name", "name"]
                    .iter()
                    .find_map(|key| self.raw.get(*key).and_then(Value::as_str))
            })
            .filter(|name| !name.trim().is_empty())
    }

    /// Reporting currency, when stated
    pub fn currency(&self) -> Option<&str> {
        self.business_info()
            .map(|info| info.currency.as_str())
            .or_else(|| self.raw.get("currency").and_then(Value::as_str))
    }

    /// Month labels (`January 2024`) found in record dates and the period
    ///
    /// Ordered chronologically without duplicates.
    pub fn period_labels(&self) -> Vec<String> {
        let mut months = BTreeSet::new();
        let period_dates = self
            .period()
            .into_iter()
            .flat_map(|p| [p.start_date.as_deref(), p.end_date.as_deref()])
            .flatten();
        let record_dates = self
            .records
            .iter()
            .filter_map(FinancialRecord::base)
            .map(|base| base.date.as_str());

        for date in period_dates.chain(record_dates) {
            if let Some(month) = parse_month(date) {
                months.insert(month);
            }
        }

        months
            .into_iter()
            .filter_map(|(year, month)| NaiveDate::from_ymd_opt(year, month, 1))
            .map(|date| date.format("%B %Y").to_string())
            .collect()
    }

    /// `January 2024`, or `January 2024 - March 2024` for several months
    pub fn period_label(&self) -> Option<String> {
        let labels = self.period_labels();
        match labels.as_slice() {
            [] => None,
            [only] => Some(only.clone()),
            [first, .., last] => Some(format!("{first} - {last}")),
        }
    }
}

fn classify_entry(key: &str, value: &Value, records: &mut Vec<FinancialRecord>) {
    let other = || FinancialRecord::Other {
        key: key.to_string(),
        value: value.clone(),
    };

    match key {
        "business_info" => records.push(
            serde_json::from_value(value.clone())
                .map(FinancialRecord::BusinessInfo)
                .unwrap_or_else(|_| other()),
        ),
        "period" => records.push(
            serde_json::from_value(value.clone())
                .map(FinancialRecord::Period)
                .unwrap_or_else(|_| other()),
        ),
        _ => match (Section::from_key(key), value) {
            (Some(section), Value::Array(elements)) => {
                records.extend(elements.iter().map(|element| {
                    section
                        .classify(element)
                        .unwrap_or_else(|| FinancialRecord::Other {
                            key: key.to_string(),
                            value: element.clone(),
                        })
                }));
            }
            _ => records.push(other()),
        },
    }
}

/// Year and month of a `YYYY-MM-DD`, RFC 3339 or `YYYY-MM` date
fn parse_month(text: &str) -> Option<(i32, u32)> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok())
        .map(|date| (date.year(), date.month()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fresh_sip() -> Value {
        json!({
            "business_info": {
                "name": "Fresh Sip Beverages",
                "industry": "Beverage Production & Sales",
                "currency": "GHS"
            },
            "period": {"start_date": "2024-01-01", "end_date": "2024-01-31"},
            "sales_records": [
                {"date": "2024-01-01", "item_name": "Fresh Pine Juice", "quantity": 45, "amount": 360.0},
                {"date": "2024-01-15", "item_name": "Mango Juice", "amount": "GHS 1,360"}
            ],
            "expense_records": [
                {"date": "2024-01-05", "expense_type": "Rent", "amount": 1200}
            ],
            "notes": "first month of trading"
        })
    }

    #[test]
    fn test_classification() {
        let request = AnalysisRequest::from_value(fresh_sip()).unwrap();

        assert_eq!(request.company_name(), Some("Fresh Sip Beverages"));
        assert_eq!(request.currency(), Some("GHS"));
        assert_eq!(
            request.period().and_then(|p| p.start_date.as_deref()),
            Some("2024-01-01")
        );

        let sales: Vec<f64> = request
            .records()
            .iter()
            .filter_map(|r| match r {
                FinancialRecord::Sales(s) => Some(s.base.amount),
                _ => None,
            })
            .collect();
        assert_eq!(sales, vec![360.0, 1360.0]);

        assert!(request.records().iter().any(|r| matches!(
            r,
            FinancialRecord::Other { key, .. } if key == "notes"
        )));
        assert_eq!(request.to_value(), fresh_sip());
    }

    #[test]
    fn test_unfit_elements_become_other() {
        let request = AnalysisRequest::from_value(json!({
            "sales": ["not a record", {"amount": 10}],
            "assets": {"cash": 420},
            "business_info": "Fresh Sip"
        }))
        .unwrap();

        assert_eq!(request.records().len(), 4);
        assert!(
            request
                .records()
                .iter()
                .all(|r| matches!(r, FinancialRecord::Other { .. }))
        );
        assert_eq!(request.company_name(), None);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = AnalysisRequest::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err.error_type(), "invalid_request");
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_period_labels() {
        let request = AnalysisRequest::from_value(json!({
            "period": {"start_date": "2024-01-01", "end_date": "2024-03"},
            "expenses": [
                {"date": "2024-02-10T09:30:00Z", "amount": 5},
                {"date": "2024-01-20", "amount": 5},
                {"date": "sometime", "amount": 5}
            ]
        }))
        .unwrap();

        assert_eq!(
            request.period_labels(),
            vec!["January 2024", "February 2024", "March 2024"]
        );
        assert_eq!(
            request.period_label().as_deref(),
            Some("January 2024 - March 2024")
        );
    }

    #[test]
    fn test_single_month_label() {
        let request = AnalysisRequest::from_value(fresh_sip()).unwrap();
        assert_eq!(request.period_label().as_deref(), Some("January 2024"));
        assert_eq!(
            AnalysisRequest::from_value(json!({})).unwrap().period_label(),
            None
        );
    }
}
