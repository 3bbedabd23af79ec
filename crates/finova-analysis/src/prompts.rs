//! The financial analysis instruction prompt

use finova_prompt::{JinjaTemplate, PromptBuilder};
use finova_runtime::PromptRenderer;
use finova_tools::ToolRegistry;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::request::AnalysisRequest;
use crate::schema::EXAMPLE_OUTPUT;

const TEMPLATE_NAME: &str = "financial_analysis";

const TEMPLATE: &str = "\
You are a financial analysis assistant. Analyze the financial data below with the \
available tools and produce an income statement, a statement of financial position \
and a DuPont analysis.

Financial Data:
{{ financial_data }}

Available Tools:
{{ tools }}

Tool names: {{ tool_names }}

Work in steps using exactly this format:

Thought: your reasoning about what to do next
Action: the tool to use, one of [{{ tool_names }}]
Action Input: the input for the tool, as JSON
Observation: the result of the tool

Rules:
{{ protocol_rules }}
When you know the answer, finish with:
Thought: I now know the final answer
Final Answer: the final result as one valid JSON object

FINAL OUTPUT RULES:
{{ output_rules }}
{%- if period_labels %}
Periods found in the data: {{ period_labels | join(\", \") }}
{%- endif %}

DETAILED EXAMPLE OUTPUT FORMAT:
{{ example }}

Agent Scratchpad:
{{ agent_scratchpad }}";

#[derive(Serialize)]
struct PromptVars<'a> {
    financial_data: &'a str,
    tools: &'a str,
    tool_names: &'a str,
    period_labels: &'a [String],
    protocol_rules: &'a str,
    output_rules: &'a str,
    example: &'a str,
    agent_scratchpad: &'a str,
}

fn protocol_rules() -> String {
    PromptBuilder::new()
        .numbered_list([
            "Start every step with \"Thought:\" stating your reasoning or plan.",
            "Follow every Thought immediately with one \"Action:\" line and one \
             \"Action Input:\" line. Never skip the Action.",
            "Stop after the Action Input. The Observation is written for you.",
            "If a Thought is not followed by an Action, write \"Invalid Format: Missing \
             'Action:' after 'Thought:'\" and retry the step from the last valid \
             scratchpad state.",
            "Reuse earlier observations instead of repeating identical calculations.",
            "If after several attempts you find no relevant information, your final \
             Thought must be \"I did not find any relevant information.\" followed by \
             the Final Answer.",
        ])
        .build()
}

fn output_rules() -> String {
    PromptBuilder::new()
        .numbered_list([
            "After the last step provide ONLY the final JSON after \"Final Answer:\".",
            "Keep all Thought, Action and Observation text out of the JSON.",
            "Make sure the JSON is complete and properly closed.",
            "Never wrap the JSON in markdown backticks.",
            "The example uses the year as its period key. Replace it with the period \
             labels of the data, e.g. \"January 2024\", consistently in every section.",
            "Every figure must be a plain finite number. Use 0 for unknown figures.",
        ])
        .build()
}

/// Rebuild objects with keys in sorted order, recursively
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (key, item) in entries {
                out.insert(key.clone(), sorted(item));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn render_data(financial_data: &Value) -> String {
    serde_json::to_string_pretty(&sorted(financial_data))
        .unwrap_or_else(|_| financial_data.to_string())
}

fn period_labels_of(financial_data: &Value) -> Vec<String> {
    AnalysisRequest::from_value(financial_data.clone())
        .map(|request| request.period_labels())
        .unwrap_or_default()
}

/// The parsed analysis template
pub fn financial_template() -> Result<JinjaTemplate> {
    Ok(JinjaTemplate::new(TEMPLATE_NAME, TEMPLATE)?)
}

/// Render the full prompt
///
/// Byte-identical output for identical inputs: the data is rendered as
/// pretty JSON with sorted keys.
pub fn build_prompt(
    financial_data: &Value,
    tool_catalog: &str,
    transcript: &str,
    tool_names: &str,
) -> Result<String> {
    let template = financial_template()?;
    let prompt = FinancialPrompt {
        template: &template,
        financial_data: render_data(financial_data),
        tools: tool_catalog.to_string(),
        tool_names: tool_names.to_string(),
        period_labels: period_labels_of(financial_data),
    };
    Ok(prompt.render_scratchpad(transcript)?)
}

/// Prompt of one analysis, rendered again for every loop iteration
pub struct FinancialPrompt<'a> {
    template: &'a JinjaTemplate,
    financial_data: String,
    tools: String,
    tool_names: String,
    period_labels: Vec<String>,
}

impl<'a> FinancialPrompt<'a> {
    pub fn new(
        template: &'a JinjaTemplate,
        request: &AnalysisRequest,
        registry: &ToolRegistry,
    ) -> Self {
        Self {
            template,
            financial_data: render_data(&request.to_value()),
            tools: registry.catalog(),
            tool_names: registry.tool_names(),
            period_labels: request.period_labels(),
        }
    }

    fn render_scratchpad(&self, scratchpad: &str) -> finova_prompt::Result<String> {
        let protocol_rules = protocol_rules();
        let output_rules = output_rules();
        self.template.render(&PromptVars {
            financial_data: &self.financial_data,
            tools: &self.tools,
            tool_names: &self.tool_names,
            period_labels: &self.period_labels,
            protocol_rules: &protocol_rules,
            output_rules: &output_rules,
            example: EXAMPLE_OUTPUT,
            agent_scratchpad: scratchpad,
        })
    }
}

impl PromptRenderer for FinancialPrompt<'_> {
    fn render(&self, scratchpad: &str) -> finova_core::Result<String> {
        Ok(self.render_scratchpad(scratchpad)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolbox::financial_toolbox;
    use crate::tools::{AdvancedCalculator, InMemoryHistoricalSource};
    use serde_json::json;
    use std::sync::Arc;

    fn data() -> Value {
        json!({
            "sales": [{"date": "2024-01-03", "amount": 1720}],
            "business_info": {"name": "Fresh Sip Beverages"}
        })
    }

    #[test]
    fn test_deterministic() {
        let a = build_prompt(&data(), "calculate_total: sum", "", "calculate_total").unwrap();
        let b = build_prompt(&data(), "calculate_total: sum", "", "calculate_total").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_contents() {
        let prompt = build_prompt(
            &data(),
            "calculate_total: sum",
            "Thought: add it up\n",
            "calculate_total",
        )
        .unwrap();

        let business = prompt.find("\"business_info\"").unwrap();
        let sales = prompt.find("\"sales\"").unwrap();
        assert!(business < sales);

        assert!(prompt.contains("Available Tools:\ncalculate_total: sum"));
        assert!(prompt.contains("one of [calculate_total]"));
        assert!(prompt.contains("Invalid Format: Missing 'Action:' after 'Thought:'"));
        assert!(prompt.contains("I did not find any relevant information."));
        assert!(prompt.contains("\"companyName\": \"Fresh Sip Beverages\""));
        assert!(prompt.contains("Periods found in the data: January 2024"));
        assert!(prompt.ends_with("Agent Scratchpad:\nThought: add it up\n"));
    }

    #[test]
    fn test_no_periods_line_without_dates() {
        let prompt = build_prompt(&json!({"revenue": 10}), "", "", "").unwrap();
        assert!(!prompt.contains("Periods found in the data"));
    }

    #[test]
    fn test_renderer_matches_build_prompt() {
        let registry = financial_toolbox(
            AdvancedCalculator::new(),
            Arc::new(InMemoryHistoricalSource::new()),
        )
        .unwrap();
        let request = AnalysisRequest::from_value(data()).unwrap();
        let template = financial_template().unwrap();
        let renderer = FinancialPrompt::new(&template, &request, &registry);

        let expected = build_prompt(
            &data(),
            &registry.catalog(),
            "Thought: x\n",
            &registry.tool_names(),
        )
        .unwrap();
        assert_eq!(renderer.render("Thought: x\n").unwrap(), expected);
    }
}
