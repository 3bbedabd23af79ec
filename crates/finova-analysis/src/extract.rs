//! Total extraction of the output object from raw model text
//!
//! Parsers are tried in a fixed order and the first that yields a JSON
//! object wins. The last stage is a template, so extraction never fails.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::request::AnalysisRequest;
use crate::schema::{self, REQUIRED_FIELDS, ValidationReport};

static FENCE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").ok());

/// Which stage produced the extracted object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// The whole text was a JSON object
    Direct,
    /// A fenced code block held the object
    Fenced,
    /// The span from the first `{` to the last `}` parsed
    BraceScan,
    /// Nothing parsed; the placeholder template was used
    Template,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fenced => "fenced",
            Self::BraceScan => "brace_scan",
            Self::Template => "template",
        }
    }

    /// Whether the object came from the model rather than the template
    pub fn is_parsed(&self) -> bool {
        !matches!(self, Self::Template)
    }
}

/// Result of extraction and validation
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Best-effort output object, always carrying every required field
    pub value: Value,
    pub source: ExtractionSource,
    /// Required top-level fields completed from the template
    pub filled_fields: Vec<String>,
    pub report: ValidationReport,
}

/// Extracts and validates output objects
///
/// Seeded from a request, the template carries the company name, currency
/// and period, and validation checks period keys against the input.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    company_name: Option<String>,
    units: Option<String>,
    period: Option<String>,
    period_labels: Vec<String>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor whose template and checks follow `request`
    pub fn for_request(request: &AnalysisRequest) -> Self {
        Self {
            company_name: request.company_name().map(str::to_string),
            units: request.currency().map(str::to_string),
            period: request.period_label(),
            period_labels: request.period_labels(),
        }
    }

    /// The fallback object
    pub fn template(&self) -> Value {
        schema::template(
            self.company_name.as_deref(),
            self.units.as_deref(),
            self.period.as_deref(),
        )
    }

    /// Extract from any value; only strings are parsed
    pub fn extract(&self, raw: &Value) -> Extraction {
        match raw {
            Value::String(text) => self.extract_str(text),
            other => {
                debug!(kind = json_kind(other), "Non-string output, using template");
                self.finish(self.template(), ExtractionSource::Template, Vec::new())
            }
        }
    }

    /// Extract from raw model text
    pub fn extract_str(&self, raw: &str) -> Extraction {
        let Some((mut object, source)) = parse_object(raw) else {
            warn!(
                output_len = raw.len(),
                "No JSON object found in output, using template"
            );
            return self.finish(self.template(), ExtractionSource::Template, Vec::new());
        };

        let template = self.template();
        let mut filled = Vec::new();
        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                object.insert(field.to_string(), template[field].clone());
                filled.push(field.to_string());
            }
        }
        if !filled.is_empty() {
            debug!(fields = ?filled, "Completed missing fields from template");
        }

        self.finish(Value::Object(object), source, filled)
    }

    fn finish(
        &self,
        value: Value,
        source: ExtractionSource,
        filled_fields: Vec<String>,
    ) -> Extraction {
        let report = schema::validate(&value, &self.period_labels);
        if report.is_empty() {
            debug!(source = source.as_str(), "Output validated");
        } else {
            warn!(
                source = source.as_str(),
                errors = report.errors().count(),
                warnings = report.warnings().count(),
                "Output validation found issues"
            );
            for issue in &report.issues {
                debug!(kind = ?issue.kind, severity = ?issue.severity, "{issue}");
            }
        }

        Extraction {
            value,
            source,
            filled_fields,
            report,
        }
    }
}

fn parse_object(raw: &str) -> Option<(Map<String, Value>, ExtractionSource)> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(object) = as_object(text) {
        return Some((object, ExtractionSource::Direct));
    }

    if let Some(re) = FENCE_RE.as_ref() {
        let fenced = re
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|body| as_object(body.as_str().trim()));
        if let Some(object) = fenced {
            return Some((object, ExtractionSource::Fenced));
        }
    }

    let span = brace_span(text)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(object)) => Some((object, ExtractionSource::BraceScan)),
        Ok(other) => {
            debug!(kind = json_kind(&other), "Brace span is not an object");
            None
        }
        Err(e) => {
            debug!(error = %e, span_len = span.len(), "Brace span did not parse");
            None
        }
    }
}

/// Text from the first `{` to the last `}`
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract and validate with an unseeded [`Extractor`]
///
/// ```
/// use finova_analysis::{ExtractionSource, extract_and_validate};
/// use serde_json::json;
///
/// let extraction = extract_and_validate(&json!(null));
/// assert_eq!(extraction.source, ExtractionSource::Template);
/// assert!(extraction.value.get("incomeStatement").is_some());
/// ```
pub fn extract_and_validate(raw: &Value) -> Extraction {
    Extractor::new().extract(raw)
}

/// [`extract_and_validate`] over text
pub fn extract_and_validate_str(raw: &str) -> Extraction {
    Extractor::new().extract_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EXAMPLE_OUTPUT, IssueKind};
    use serde_json::json;

    #[test]
    fn test_stages() {
        let body = r#"{"companyInfo": {"companyName": "A", "units": "GHS", "period": "2024"}}"#;

        assert_eq!(
            extract_and_validate_str(body).source,
            ExtractionSource::Direct
        );
        assert_eq!(
            extract_and_validate_str(&format!("Here:\n```json\n{body}\n```\nDone")).source,
            ExtractionSource::Fenced
        );
        assert_eq!(
            extract_and_validate_str(&format!("```\n{body}\n```")).source,
            ExtractionSource::Fenced
        );
        assert_eq!(
            extract_and_validate_str(&format!("Final Answer: {body} hope this helps")).source,
            ExtractionSource::BraceScan
        );
        assert_eq!(
            extract_and_validate_str("no json here").source,
            ExtractionSource::Template
        );
    }

    #[test]
    fn test_fills_missing_fields() {
        let extraction =
            extract_and_validate_str(r#"{"incomeStatement": [{"lineItem": "Revenue", "2024": 5}]}"#);

        assert_eq!(
            extraction.filled_fields,
            vec![
                "companyInfo",
                "statementOfFinancialPosition",
                "dupontAnalysis"
            ]
        );
        assert_eq!(extraction.value["incomeStatement"][0]["2024"], json!(5));
        assert!(!extraction.report.has(IssueKind::Schema));
    }

    #[test]
    fn test_brace_scan_starts_at_first_brace() {
        let text = "Thought: {revenue} is known\n{\"companyInfo\": {}}";
        assert_eq!(
            brace_span(text),
            Some("{revenue} is known\n{\"companyInfo\": {}}")
        );
        assert_eq!(brace_span("} before {"), None);
        assert!(parse_object(text).is_none());
        assert_eq!(extract_and_validate(&json!(text)).source, ExtractionSource::Template);
    }

    #[test]
    fn test_never_fails() {
        for raw in [json!(""), json!("   "), json!(42), json!(["{}"]), json!("{ broken")] {
            let extraction = extract_and_validate(&raw);
            assert_eq!(extraction.source, ExtractionSource::Template, "{raw}");
            assert!(extraction.report.is_empty());
        }
    }

    #[test]
    fn test_example_extracts_cleanly() {
        let extraction = extract_and_validate_str(EXAMPLE_OUTPUT);
        assert_eq!(extraction.source, ExtractionSource::Direct);
        assert!(extraction.filled_fields.is_empty());
        assert!(extraction.report.is_valid());
    }

    #[test]
    fn test_seeded_template() {
        let request = AnalysisRequest::from_value(json!({
            "business_info": {"name": "Fresh Sip Beverages", "currency": "USD"},
            "period": {"start_date": "2024-01-01", "end_date": "2024-01-31"}
        }))
        .unwrap();
        let extraction = Extractor::for_request(&request).extract_str("nothing useful");

        assert_eq!(
            extraction.value["companyInfo"],
            json!({"companyName": "Fresh Sip Beverages", "units": "USD", "period": "January 2024"})
        );
    }
}
