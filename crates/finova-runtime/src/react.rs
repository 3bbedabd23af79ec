//! Classification of raw model output
//!
//! The model is asked to answer in the `Thought / Action / Action Input`
//! format or to close with `Final Answer:`. Whatever it actually writes is
//! parsed into a [`ReActStep`]; nothing it says is executed directly.

use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;

/// Marker that introduces the terminal answer
pub const FINAL_ANSWER: &str = "Final Answer:";

/// Marker that introduces a tool observation
pub const OBSERVATION: &str = "Observation:";

static ACTION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").ok()
});

static ACTION_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").ok());

static ACTION_INPUT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").ok());

/// Why an output could not be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Nothing but whitespace
    Empty,
    /// `Action:` without `Action Input:`
    MissingActionInput,
    /// `Action Input:` without a usable `Action:`
    MissingAction,
    /// Both a tool call and a final answer
    AmbiguousActionAndAnswer,
}

impl MalformedReason {
    /// Corrective note fed back to the model
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Empty => "Invalid Format: Empty response, continue with 'Thought:'",
            Self::MissingActionInput => "Invalid Format: Missing 'Action Input:' after 'Action:'",
            Self::MissingAction => "Invalid Format: Missing 'Action:' after 'Thought:'",
            Self::AmbiguousActionAndAnswer => {
                "Invalid Format: Either call a tool with 'Action:' or give the 'Final Answer:', not both"
            }
        }
    }
}

/// One classified model turn
#[derive(Debug, Clone, PartialEq)]
pub enum ReActStep {
    /// Reasoning without an action
    Thought { thought: String },
    /// Tool invocation
    Action {
        thought: String,
        tool: String,
        input: Value,
    },
    /// Terminal answer
    FinalAnswer { thought: String, answer: String },
    /// Output that breaks the protocol
    Malformed { reason: MalformedReason, raw: String },
}

impl ReActStep {
    /// Corrective note for steps that break the protocol
    ///
    /// A bare thought counts as a violation because every thought has to be
    /// followed by an action.
    pub fn correction(&self) -> Option<&'static str> {
        match self {
            Self::Thought { .. } => Some(MalformedReason::MissingAction.instruction()),
            Self::Malformed { reason, .. } => Some(reason.instruction()),
            Self::Action { .. } | Self::FinalAnswer { .. } => None,
        }
    }

    /// Whether this step ends the run
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }
}

/// Classify one model output
pub fn parse_react_output(text: &str) -> ReActStep {
    let text = text.trim();
    if text.is_empty() {
        return ReActStep::Malformed {
            reason: MalformedReason::Empty,
            raw: String::new(),
        };
    }

    let action = ACTION_RE.as_ref().and_then(|re| re.captures(text));
    let final_at = text.find(FINAL_ANSWER);

    match (action, final_at) {
        (Some(_), Some(_)) => ReActStep::Malformed {
            reason: MalformedReason::AmbiguousActionAndAnswer,
            raw: text.to_string(),
        },
        (Some(caps), None) => {
            let start = caps.get(0).map_or(0, |m| m.start());
            let tool = caps.get(1).map_or("", |m| m.as_str());
            let tool = clean_tool_name(tool);
            if tool.is_empty() {
                return ReActStep::Malformed {
                    reason: MalformedReason::MissingAction,
                    raw: text.to_string(),
                };
            }
            let input = caps.get(2).map_or("", |m| m.as_str());
            ReActStep::Action {
                thought: strip_thought(&text[..start]),
                tool,
                input: parse_action_input(cut_observation(input)),
            }
        }
        (None, Some(at)) => ReActStep::FinalAnswer {
            thought: strip_thought(&text[..at]),
            answer: text[at + FINAL_ANSWER.len()..].trim().to_string(),
        },
        (None, None) => {
            if matches_re(&ACTION_INPUT_RE, text) {
                ReActStep::Malformed {
                    reason: MalformedReason::MissingAction,
                    raw: text.to_string(),
                }
            } else if matches_re(&ACTION_NAME_RE, text) {
                ReActStep::Malformed {
                    reason: MalformedReason::MissingActionInput,
                    raw: text.to_string(),
                }
            } else {
                ReActStep::Thought {
                    thought: strip_thought(text),
                }
            }
        }
    }
}

/// Turn the text after `Action Input:` into a JSON argument
///
/// Fences and wrapping quotes are removed. Text that parses as JSON is
/// passed on as JSON, anything else as a plain string.
pub fn parse_action_input(raw: &str) -> Value {
    let mut text = raw.trim();
    text = strip_fence(text);
    let unquoted = strip_matching(text, '"')
        .or_else(|| strip_matching(text, '\''))
        .or_else(|| strip_matching(text, '`'));

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return match value {
            // A quoted JSON document is still the document
            Value::String(inner) => {
                serde_json::from_str::<Value>(&inner).unwrap_or(Value::String(inner))
            }
            other => other,
        };
    }
    let text = unquoted.unwrap_or(text).trim();
    serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn matches_re(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

fn clean_tool_name(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '*' | '[' | ']'))
        .trim()
        .to_string()
}

fn strip_thought(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix("Thought:").unwrap_or(text).trim().to_string()
}

fn cut_observation(input: &str) -> &str {
    input.find(OBSERVATION).map_or(input, |at| &input[..at])
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn strip_matching(text: &str, quote: char) -> Option<&str> {
    text.strip_prefix(quote)?.strip_suffix(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_with_json_input() {
        let step = parse_react_output(
            "Thought: I need total sales\nAction: calculate_total\nAction Input: [1200, 520]",
        );
        assert_eq!(
            step,
            ReActStep::Action {
                thought: "I need total sales".to_string(),
                tool: "calculate_total".to_string(),
                input: json!([1200, 520]),
            }
        );
    }

    #[test]
    fn test_action_input_cut_at_observation() {
        let step = parse_react_output(
            "Action: calculate_ratio\nAction Input: {\"numerator\": 1, \"denominator\": 4}\nObservation: 0.25",
        );
        let ReActStep::Action { input, .. } = step else {
            panic!("expected action");
        };
        assert_eq!(input, json!({"numerator": 1, "denominator": 4}));
    }

    #[test]
    fn test_numbered_markers_and_decorated_name() {
        let step = parse_react_output("Action 1: `calculate_total`\nAction 1 Input: 1, 2, 3");
        let ReActStep::Action { tool, input, .. } = step else {
            panic!("expected action");
        };
        assert_eq!(tool, "calculate_total");
        assert_eq!(input, json!("1, 2, 3"));
    }

    #[test]
    fn test_final_answer() {
        let step = parse_react_output("Thought: I now know the final answer\nFinal Answer: {\"a\": 1}");
        assert_eq!(
            step,
            ReActStep::FinalAnswer {
                thought: "I now know the final answer".to_string(),
                answer: "{\"a\": 1}".to_string(),
            }
        );
        assert!(step.is_final());
    }

    #[test]
    fn test_bare_thought_needs_correction() {
        let step = parse_react_output("Thought: let me think about revenue");
        assert!(matches!(step, ReActStep::Thought { .. }));
        assert_eq!(
            step.correction(),
            Some("Invalid Format: Missing 'Action:' after 'Thought:'")
        );
    }

    #[test]
    fn test_malformed_variants() {
        let cases = [
            ("   ", MalformedReason::Empty),
            ("Thought: x\nAction: calculate_total", MalformedReason::MissingActionInput),
            ("Thought: x\nAction Input: [1]", MalformedReason::MissingAction),
            (
                "Action: calculate_total\nAction Input: [1]\nFinal Answer: {}",
                MalformedReason::AmbiguousActionAndAnswer,
            ),
        ];
        for (text, expected) in cases {
            match parse_react_output(text) {
                ReActStep::Malformed { reason, .. } => assert_eq!(reason, expected, "{text}"),
                other => panic!("{text:?} parsed as {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_action_input_variants() {
        assert_eq!(parse_action_input("```json\n[1, 2]\n```"), json!([1, 2]));
        assert_eq!(parse_action_input("\"[1, 2]\""), json!([1, 2]));
        assert_eq!(parse_action_input("'2 + 2'"), json!("2 + 2"));
        assert_eq!(parse_action_input("42"), json!(42));
        assert_eq!(parse_action_input("GHS 1,200"), json!("GHS 1,200"));
    }
}
