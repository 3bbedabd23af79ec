//! Deterministic financial calculations and their tool wrappers

use async_trait::async_trait;
use finova_core::Result;
use finova_tools::{Tool, schema};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::normalize::{bind_args, to_float, to_values};

/// Round half away from zero to `places` decimals; non-finite becomes 0
pub fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() { rounded } else { 0.0 }
}

/// Sum, rounded to 2 decimals
pub fn total(values: &[f64]) -> f64 {
    round_to(values.iter().sum(), 2)
}

/// Mean, rounded to 2 decimals; 0 for no values
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round_to(values.iter().sum::<f64>() / values.len() as f64, 2)
}

/// `part / whole * 100`, rounded to 2 decimals; 0 when `whole` is 0
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    round_to(part / whole * 100.0, 2)
}

/// Quotient rounded to 4 decimals; 0 when `denominator` is 0
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    round_to(numerator / denominator, 4)
}

/// DuPont ROE from margin (percent), asset turnover and leverage
///
/// ```
/// use finova_analysis::tools::calculations::dupont_roe;
///
/// assert_eq!(dupont_roe(10.0, 2.0, 1.5), 30.0);
/// ```
pub fn dupont_roe(net_profit_margin: f64, asset_turnover: f64, financial_leverage: f64) -> f64 {
    round_to(
        (net_profit_margin / 100.0) * asset_turnover * financial_leverage * 100.0,
        2,
    )
}

/// Sum `value_key` per distinct `year_key` across a list of records
///
/// Years are compared as strings. Records without the year key are
/// skipped; input that is not a list of records gives an empty map.
pub fn values_by_year(data: &Value, year_key: &str, value_key: &str) -> BTreeMap<String, f64> {
    let parsed;
    let data = match data {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                parsed = value;
                &parsed
            }
            Err(_) => return BTreeMap::new(),
        },
        other => other,
    };
    let Value::Array(records) = data else {
        return BTreeMap::new();
    };

    let mut grouped = BTreeMap::new();
    for record in records {
        let Value::Object(fields) = record else {
            continue;
        };
        let year = match fields.get(year_key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let amount = fields.get(value_key).map_or(0.0, to_float);
        *grouped.entry(year).or_insert(0.0) += amount;
    }
    grouped
}

/// Sums a list of values
pub struct CalculateTotal;

#[async_trait]
impl Tool for CalculateTotal {
    async fn execute(&self, params: Value) -> Result<Value> {
        Ok(json!(total(&to_values(&params))))
    }

    fn name(&self) -> &str {
        "calculate_total"
    }

    fn description(&self) -> &str {
        "Calculate the sum of a list of values. Input: a list of numbers such as \
         [1200, 300.5], a comma-separated string such as \"1200, 300.5\" or \
         {\"values\": [...]}. Returns the total rounded to 2 decimals."
    }

    fn input_schema(&self) -> Value {
        values_schema()
    }
}

/// Averages a list of values
pub struct CalculateAverage;

#[async_trait]
impl Tool for CalculateAverage {
    async fn execute(&self, params: Value) -> Result<Value> {
        Ok(json!(average(&to_values(&params))))
    }

    fn name(&self) -> &str {
        "calculate_average"
    }

    fn description(&self) -> &str {
        "Calculate the average of a list of values, e.g. [100, 200, 300]. \
         Returns the mean rounded to 2 decimals, or 0 for an empty list."
    }

    fn input_schema(&self) -> Value {
        values_schema()
    }
}

/// Percentage of a part over a whole
pub struct CalculatePercentage;

const PERCENTAGE_PARAMS: &[&[&str]] = &[
    &["part", "value", "numerator"],
    &["whole", "total", "denominator"],
];

#[async_trait]
impl Tool for CalculatePercentage {
    async fn execute(&self, params: Value) -> Result<Value> {
        let args = bind_args(&params, PERCENTAGE_PARAMS);
        Ok(json!(percentage(to_float(&args[0]), to_float(&args[1]))))
    }

    fn name(&self) -> &str {
        "calculate_percentage"
    }

    fn description(&self) -> &str {
        "Calculate what percentage a part is of a whole. Input: {\"part\": 750, \
         \"whole\": 1720} or [750, 1720]. Returns part / whole * 100 rounded to \
         2 decimals, or 0 when the whole is 0."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "part": schema::number("Portion of the whole"),
                "whole": schema::number("The whole amount"),
            }),
            &["part", "whole"],
        )
    }
}

/// Quotient of two values
pub struct CalculateRatio;

const RATIO_PARAMS: &[&[&str]] = &[&["numerator", "a", "x"], &["denominator", "b", "y"]];

#[async_trait]
impl Tool for CalculateRatio {
    async fn execute(&self, params: Value) -> Result<Value> {
        let args = bind_args(&params, RATIO_PARAMS);
        Ok(json!(ratio(to_float(&args[0]), to_float(&args[1]))))
    }

    fn name(&self) -> &str {
        "calculate_ratio"
    }

    fn description(&self) -> &str {
        "Calculate the ratio between two values. Input: {\"numerator\": 1720, \
         \"denominator\": 1090} or [1720, 1090]. Returns numerator / denominator \
         rounded to 4 decimals, or 0 when the denominator is 0."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "numerator": schema::number("Value above the line"),
                "denominator": schema::number("Value below the line"),
            }),
            &["numerator", "denominator"],
        )
    }
}

/// Groups record amounts by year
pub struct ExtractValuesByYear;

const BY_YEAR_PARAMS: &[&[&str]] = &[
    &["data", "records", "items"],
    &["year_key", "year_field"],
    &["value_key", "value_field", "amount_key"],
];

#[async_trait]
impl Tool for ExtractValuesByYear {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params = match params {
            Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::Null),
            other => other,
        };

        // a bare list of records is the data itself
        let args = match &params {
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
                vec![params.clone(), Value::Null, Value::Null]
            }
            other => bind_args(other, BY_YEAR_PARAMS),
        };

        let year_key = args[1].as_str().unwrap_or("year");
        let value_key = args[2].as_str().unwrap_or("amount");
        Ok(json!(values_by_year(&args[0], year_key, value_key)))
    }

    fn name(&self) -> &str {
        "extract_values_by_year"
    }

    fn description(&self) -> &str {
        "Group records by year and sum their amounts. Input: {\"data\": [{\"year\": \
         2020, \"amount\": 100}, ...], \"year_key\": \"year\", \"value_key\": \
         \"amount\"}; the keys default to year and amount. Returns a mapping of \
         year to total."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "data": schema::array("Records to group", json!({"type": "object"})),
                "year_key": schema::string("Field holding the year (default: year)"),
                "value_key": schema::string("Field holding the amount (default: amount)"),
            }),
            &["data"],
        )
    }
}

/// DuPont return on equity
pub struct CalculateDupontRoe;

const DUPONT_PARAMS: &[&[&str]] = &[
    &["net_profit_margin", "npm", "profit_margin"],
    &["asset_turnover", "at", "turnover"],
    &["financial_leverage", "fl", "leverage", "equity_multiplier"],
];

#[async_trait]
impl Tool for CalculateDupontRoe {
    async fn execute(&self, params: Value) -> Result<Value> {
        let args = bind_args(&params, DUPONT_PARAMS);
        Ok(json!(dupont_roe(
            to_float(&args[0]),
            to_float(&args[1]),
            to_float(&args[2]),
        )))
    }

    fn name(&self) -> &str {
        "calculate_dupont_roe"
    }

    fn description(&self) -> &str {
        "Calculate return on equity with the DuPont equation. Input: \
         {\"net_profit_margin\": 10, \"asset_turnover\": 2, \"financial_leverage\": \
         1.5} with the margin in percent. Returns (margin / 100) * turnover * \
         leverage * 100 rounded to 2 decimals."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "net_profit_margin": schema::number("Net profit margin in percent"),
                "asset_turnover": schema::number("Revenue over average total assets"),
                "financial_leverage": schema::number("Average assets over average equity"),
            }),
            &["net_profit_margin", "asset_turnover", "financial_leverage"],
        )
    }
}

fn values_schema() -> Value {
    schema::any_of(
        "Values to combine",
        vec![
            schema::array("Numbers", schema::number("Value")),
            schema::string("Comma-separated numbers"),
            schema::object(
                json!({"values": schema::array("Numbers", schema::number("Value"))}),
                &["values"],
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_guards() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(ratio(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(total(&[0.1, 0.2]), 0.3);
        assert_eq!(average(&[1.0, 2.0, 2.0]), 1.67);
        assert_eq!(percentage(750.0, 1720.0), 43.6);
        assert_eq!(ratio(2.0, 3.0), 0.6667);
        assert_eq!(round_to(f64::NAN, 2), 0.0);
    }

    #[test]
    fn test_dupont_roe() {
        assert_eq!(dupont_roe(10.0, 2.0, 1.5), 30.0);
        assert_eq!(dupont_roe(-75.58, 1.578, -0.5707), 68.06);
    }

    #[test]
    fn test_values_by_year() {
        let data = json!([
            {"year": 2020, "amount": 100},
            {"year": 2020, "amount": 200},
            {"year": 2021, "amount": 300},
        ]);
        let grouped = values_by_year(&data, "year", "amount");
        assert_eq!(grouped.get("2020"), Some(&300.0));
        assert_eq!(grouped.get("2021"), Some(&300.0));
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn test_values_by_year_lenient() {
        let data = json!([
            {"year": "2020", "amount": "GHS 1,000"},
            {"amount": 5},
            "noise",
        ]);
        let grouped = values_by_year(&data, "year", "amount");
        assert_eq!(grouped.get("2020"), Some(&1000.0));
        assert_eq!(grouped.len(), 1);

        assert!(values_by_year(&json!("not json"), "year", "amount").is_empty());
        assert!(values_by_year(&json!({"year": 2020}), "year", "amount").is_empty());
    }

    #[tokio::test]
    async fn test_tool_argument_shapes() {
        let tool = CalculatePercentage;
        for params in [
            json!({"part": 25, "whole": 200}),
            json!([25, 200]),
            json!("25, 200"),
            json!("part=25, whole=200"),
        ] {
            assert_eq!(tool.execute(params).await.unwrap(), json!(12.5));
        }
    }

    #[tokio::test]
    async fn test_by_year_tool_custom_keys() {
        let tool = ExtractValuesByYear;
        let result = tool
            .execute(json!({
                "records": [{"fy": 2023, "value": 10}, {"fy": 2023, "value": 5}],
                "year_key": "fy",
                "value_key": "value",
            }))
            .await
            .unwrap();
        assert_eq!(result, json!({"2023": 15.0}));
    }

    #[tokio::test]
    async fn test_dupont_tool_aliases() {
        let result = CalculateDupontRoe
            .execute(json!({"npm": 10, "at": 2, "fl": 1.5}))
            .await
            .unwrap();
        assert_eq!(result, json!(30.0));
    }
}
