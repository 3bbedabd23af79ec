//! Target output structure and its advisory validation
//!
//! [`FinancialOutput`] is the JSON shape callers receive. Validation never
//! rejects an output: it produces a [`ValidationReport`] the pipeline logs
//! next to the best-effort object.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Top-level fields every output must carry
pub const REQUIRED_FIELDS: [&str; 4] = [
    "companyInfo",
    "incomeStatement",
    "statementOfFinancialPosition",
    "dupontAnalysis",
];

/// Allowed gap between a stated subtotal and the one its inputs imply
pub const ARITHMETIC_TOLERANCE: f64 = 1.0;

/// Period-keyed figures, e.g. `{"2024": 1720}`
pub type PeriodValues = BTreeMap<String, f64>;

/// A complete financial-statement analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialOutput {
    pub company_info: CompanyInfo,
    pub income_statement: Vec<LineItem>,
    pub statement_of_financial_position: FinancialPosition,
    pub dupont_analysis: DupontAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    pub company_name: String,
    pub units: String,
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

/// One statement row: a label plus one figure per period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub line_item: String,
    #[serde(flatten)]
    pub values: PeriodValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialPosition {
    pub assets: Vec<LineItem>,
    pub equity: Vec<LineItem>,
    #[serde(default)]
    pub non_current_liabilities: Vec<LineItem>,
    #[serde(default)]
    pub current_liabilities: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DupontAnalysis {
    pub return_on_equity: Vec<ReturnOnEquity>,
    #[serde(rename = "dupontEquationROE")]
    pub dupont_equation_roe: DupontEquationRoe,
    pub return_on_asset: Vec<ReturnOnAsset>,
    pub roa_dupont_equation: RoaDupontEquation,
}

/// A period identifier: a bare year or a label such as `January 2024`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeriodKey {
    Year(i64),
    Label(String),
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOnEquity {
    pub year: PeriodKey,
    pub net_profit: f64,
    pub avg_shareholder_equity: f64,
    pub roe_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DupontEquationRoe {
    pub net_profit: PeriodValues,
    pub revenue: PeriodValues,
    pub net_profit_margin_percent: PeriodValues,
    pub total_average_assets: PeriodValues,
    pub asset_turnover_ratio_percent: PeriodValues,
    pub financial_leverage_percent: PeriodValues,
    #[serde(rename = "calculatedROE")]
    pub calculated_roe: PeriodValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOnAsset {
    pub year: PeriodKey,
    pub net_profit: f64,
    pub total_average_assets: f64,
    pub roa_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoaDupontEquation {
    pub return_on_asset_percent: PeriodValues,
}

/// Minimal well-formed output with placeholders in every required field
pub fn template(company_name: Option<&str>, units: Option<&str>, period: Option<&str>) -> Value {
    json!({
        "companyInfo": {
            "companyName": company_name.unwrap_or("Unknown"),
            "units": units.unwrap_or("GHS"),
            "period": period.unwrap_or(""),
        },
        "incomeStatement": [],
        "statementOfFinancialPosition": {
            "assets": [],
            "equity": [],
            "nonCurrentLiabilities": [],
            "currentLiabilities": [],
        },
        "dupontAnalysis": {
            "returnOnEquity": [],
            "dupontEquationROE": {
                "netProfit": {},
                "revenue": {},
                "netProfitMarginPercent": {},
                "totalAverageAssets": {},
                "assetTurnoverRatioPercent": {},
                "financialLeveragePercent": {},
                "calculatedROE": {},
            },
            "returnOnAsset": [],
            "roaDupontEquation": {"returnOnAssetPercent": {}},
        },
    })
}

/// Worked example of the exact target shape (Fresh Sip Beverages, January 2024)
pub const EXAMPLE_OUTPUT: &str = r#"{
  "companyInfo": {
    "companyName": "Fresh Sip Beverages",
    "units": "GHS",
    "period": "January 2024",
    "industry": "Beverage Production & Sales"
  },
  "incomeStatement": [
    { "lineItem": "Revenue", "2024": 1720 },
    { "lineItem": "Cost of Goods Sold", "2024": 970 },
    { "lineItem": "Gross Profit", "2024": 750 },
    { "lineItem": "Operating Expenses", "2024": 2050 },
    { "lineItem": "Net Operating Income", "2024": -1300 },
    { "lineItem": "Other Income", "2024": 0 },
    { "lineItem": "Net Profit Before Tax", "2024": -1300 },
    { "lineItem": "Tax", "2024": 0 },
    { "lineItem": "Net Profit After Tax", "2024": -1300 }
  ],
  "statementOfFinancialPosition": {
    "assets": [
      { "lineItem": "Inventory", "2024": 670 },
      { "lineItem": "Cash and Cash Equivalents", "2024": 420 },
      { "lineItem": "Total Current Assets", "2024": 1090 },
      { "lineItem": "Total Assets", "2024": 1090 }
    ],
    "equity": [
      { "lineItem": "Owner's Equity", "2024": -1910 },
      { "lineItem": "Total Equity", "2024": -1910 }
    ],
    "nonCurrentLiabilities": [],
    "currentLiabilities": [
      { "lineItem": "Accounts Payable", "2024": 3000 },
      { "lineItem": "Total Current Liabilities", "2024": 3000 }
    ]
  },
  "dupontAnalysis": {
    "returnOnEquity": [
      { "year": 2024, "netProfit": -1300, "avgShareholderEquity": -1910, "roePercent": 68.06 }
    ],
    "dupontEquationROE": {
      "netProfit": { "2024": -1300 },
      "revenue": { "2024": 1720 },
      "netProfitMarginPercent": { "2024": -75.58 },
      "totalAverageAssets": { "2024": 1090 },
      "assetTurnoverRatioPercent": { "2024": 157.80 },
      "financialLeveragePercent": { "2024": -57.07 },
      "calculatedROE": { "2024": 68.06 }
    },
    "returnOnAsset": [
      { "year": 2024, "netProfit": -1300, "totalAverageAssets": 1090, "roaPercent": -119.27 }
    ],
    "roaDupontEquation": {
      "returnOnAssetPercent": { "2024": -119.27 }
    }
  }
}"#;

/// What a validation issue is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The object does not deserialize into [`FinancialOutput`]
    Schema,
    /// A numeric leaf is NaN or infinite
    NonFinite,
    /// Period keys disagree between sections or with the input
    PeriodMismatch,
    /// A subtotal disagrees with its inputs
    Arithmetic,
    /// Equity is negative, inverting DuPont leverage
    NegativeEquity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Location in the output, e.g. `incomeStatement.Gross Profit.2024`
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn error(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Advisory findings about an output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// No error-severity issues (warnings allowed)
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
    }

    /// Whether any issue of `kind` was found
    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }
}

/// Validate an output object
///
/// `period_labels` are the month labels detected in the request; when
/// given, period keys outside them are reported as warnings.
pub fn validate(value: &Value, period_labels: &[String]) -> ValidationReport {
    let mut report = ValidationReport::default();
    find_non_finite(value, String::new(), &mut report);

    match serde_json::from_value::<FinancialOutput>(value.clone()) {
        Ok(output) => {
            check_periods(&output, period_labels, &mut report);
            check_income_statement(&output.income_statement, &mut report);
            check_negative_equity(&output, &mut report);
        }
        Err(e) => report
            .issues
            .push(ValidationIssue::error(IssueKind::Schema, "$", e.to_string())),
    }
    report
}

fn find_non_finite(value: &Value, path: String, report: &mut ValidationReport) {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|v| !v.is_finite()) => {
            report.issues.push(ValidationIssue::error(
                IssueKind::NonFinite,
                path,
                "number is not finite",
            ));
        }
        Value::String(s)
            if matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "nan" | "inf" | "-inf" | "infinity" | "-infinity"
            ) =>
        {
            report.issues.push(ValidationIssue::error(
                IssueKind::NonFinite,
                path,
                format!("'{s}' is not a finite number"),
            ));
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                find_non_finite(item, format!("{path}[{i}]"), report);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                find_non_finite(item, child, report);
            }
        }
        _ => {}
    }
}

fn line_keys(items: &[LineItem]) -> BTreeSet<String> {
    items
        .iter()
        .flat_map(|item| item.values.keys().cloned())
        .collect()
}

fn check_periods(output: &FinancialOutput, labels: &[String], report: &mut ValidationReport) {
    let position = &output.statement_of_financial_position;
    let dupont = &output.dupont_analysis;
    let roe = &dupont.dupont_equation_roe;

    let mut sections: Vec<(&str, BTreeSet<String>)> = vec![
        ("incomeStatement", line_keys(&output.income_statement)),
        ("statementOfFinancialPosition.assets", line_keys(&position.assets)),
        ("statementOfFinancialPosition.equity", line_keys(&position.equity)),
        (
            "statementOfFinancialPosition.nonCurrentLiabilities",
            line_keys(&position.non_current_liabilities),
        ),
        (
            "statementOfFinancialPosition.currentLiabilities",
            line_keys(&position.current_liabilities),
        ),
    ];
    for (name, values) in [
        ("dupontAnalysis.dupontEquationROE.netProfit", &roe.net_profit),
        ("dupontAnalysis.dupontEquationROE.revenue", &roe.revenue),
        (
            "dupontAnalysis.dupontEquationROE.netProfitMarginPercent",
            &roe.net_profit_margin_percent,
        ),
        (
            "dupontAnalysis.dupontEquationROE.totalAverageAssets",
            &roe.total_average_assets,
        ),
        (
            "dupontAnalysis.dupontEquationROE.assetTurnoverRatioPercent",
            &roe.asset_turnover_ratio_percent,
        ),
        (
            "dupontAnalysis.dupontEquationROE.financialLeveragePercent",
            &roe.financial_leverage_percent,
        ),
        ("dupontAnalysis.dupontEquationROE.calculatedROE", &roe.calculated_roe),
        (
            "dupontAnalysis.roaDupontEquation.returnOnAssetPercent",
            &dupont.roa_dupont_equation.return_on_asset_percent,
        ),
    ] {
        sections.push((name, values.keys().cloned().collect()));
    }
    sections.push((
        "dupontAnalysis.returnOnEquity",
        dupont.return_on_equity.iter().map(|r| r.year.to_string()).collect(),
    ));
    sections.push((
        "dupontAnalysis.returnOnAsset",
        dupont.return_on_asset.iter().map(|r| r.year.to_string()).collect(),
    ));

    let Some((reference_name, reference)) = sections
        .iter()
        .find(|(_, keys)| !keys.is_empty())
        .cloned()
    else {
        return;
    };

    for (name, keys) in &sections {
        for key in keys.difference(&reference) {
            report.issues.push(ValidationIssue::error(
                IssueKind::PeriodMismatch,
                format!("{name}.{key}"),
                format!("period '{key}' does not appear in {reference_name}"),
            ));
        }
    }

    if !labels.is_empty() {
        for key in reference.iter().filter(|key| !labels.contains(key)) {
            report.issues.push(ValidationIssue::warning(
                IssueKind::PeriodMismatch,
                format!("{reference_name}.{key}"),
                format!(
                    "period '{key}' is not one of the input periods ({})",
                    labels.join(", ")
                ),
            ));
        }
    }
}

const REVENUE: &[&str] = &["revenue", "total revenue", "sales", "total sales", "turnover"];
const COGS: &[&str] = &["cost of goods sold", "cost of sales", "cogs"];
const GROSS_PROFIT: &[&str] = &["gross profit"];
const OPERATING_EXPENSES: &[&str] = &["operating expenses", "total operating expenses"];
const OPERATING_INCOME: &[&str] = &["net operating income", "operating income", "operating profit"];
const OTHER_INCOME: &[&str] = &["other income"];
const PROFIT_BEFORE_TAX: &[&str] = &["net profit before tax", "profit before tax"];
const TAX: &[&str] = &["tax", "income tax", "taxation"];
const PROFIT_AFTER_TAX: &[&str] = &[
    "net profit after tax",
    "profit after tax",
    "net profit",
    "net income",
];

fn find_line<'a>(items: &'a [LineItem], aliases: &[&str]) -> Option<&'a LineItem> {
    items.iter().find(|item| {
        let label = item.line_item.trim().to_lowercase();
        aliases.contains(&label.as_str())
    })
}

fn check_income_statement(items: &[LineItem], report: &mut ValidationReport) {
    let value = |aliases: &[&str], period: &str| {
        find_line(items, aliases).and_then(|item| item.values.get(period).copied())
    };

    for period in line_keys(items) {
        let p = period.as_str();
        let revenue = value(REVENUE, p);
        let cogs = value(COGS, p);
        let gross = value(GROSS_PROFIT, p);
        let opex = value(OPERATING_EXPENSES, p);
        let operating = value(OPERATING_INCOME, p);
        let before_tax = value(PROFIT_BEFORE_TAX, p);
        let after_tax = value(PROFIT_AFTER_TAX, p);

        let implied_gross = match (revenue, cogs) {
            (Some(r), Some(c)) => Some(r - c),
            _ => None,
        };
        let implied_operating = match (gross.or(implied_gross), opex) {
            (Some(g), Some(o)) => Some(g - o),
            _ => None,
        };
        let implied_before_tax =
            operating.or(implied_operating).map(|o| o + value(OTHER_INCOME, p).unwrap_or(0.0));
        let implied_after_tax = before_tax
            .or(implied_before_tax)
            .map(|b| b - value(TAX, p).unwrap_or(0.0));

        for (label, stated, implied) in [
            ("Gross Profit", gross, implied_gross),
            ("Net Operating Income", operating, implied_operating),
            ("Net Profit Before Tax", before_tax, implied_before_tax),
            ("Net Profit After Tax", after_tax, implied_after_tax),
        ] {
            if let (Some(stated), Some(implied)) = (stated, implied) {
                if (stated - implied).abs() > ARITHMETIC_TOLERANCE {
                    report.issues.push(ValidationIssue::error(
                        IssueKind::Arithmetic,
                        format!("incomeStatement.{label}.{period}"),
                        format!("expected {implied}, found {stated}"),
                    ));
                }
            }
        }
    }
}

fn check_negative_equity(output: &FinancialOutput, report: &mut ValidationReport) {
    let dupont = &output.dupont_analysis;
    let has_dupont = !dupont.return_on_equity.is_empty()
        || !dupont.dupont_equation_roe.calculated_roe.is_empty();
    if !has_dupont {
        return;
    }

    let equity = &output.statement_of_financial_position.equity;
    let total = find_line(equity, &["total equity", "total shareholders' equity"])
        .or_else(|| equity.first());

    let mut negative: BTreeSet<String> = total
        .map(|item| {
            item.values
                .iter()
                .filter(|(_, v)| **v < 0.0)
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default();
    negative.extend(
        dupont
            .return_on_equity
            .iter()
            .filter(|r| r.avg_shareholder_equity < 0.0)
            .map(|r| r.year.to_string()),
    );

    for period in negative {
        report.issues.push(ValidationIssue::warning(
            IssueKind::NegativeEquity,
            format!("dupontAnalysis.{period}"),
            "equity is negative; financial leverage and ROE signs are inverted",
        ));
    }
}
