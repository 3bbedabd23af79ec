//! Append-only record of one agent run

use serde_json::Value;
use std::fmt::Write;

/// One entry of the scratchpad
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    /// A completed `Thought → Action → Observation` cycle
    Step {
        thought: String,
        tool: String,
        input: Value,
        observation: String,
    },
    /// Protocol violation noted back to the model
    Correction { instruction: String },
}

impl TranscriptEntry {
    fn render_into(&self, out: &mut String) {
        match self {
            Self::Step {
                thought,
                tool,
                input,
                observation,
            } => {
                let input = match input {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let _ = writeln!(out, "Thought: {thought}");
                let _ = writeln!(out, "Action: {tool}");
                let _ = writeln!(out, "Action Input: {input}");
                let _ = writeln!(out, "Observation: {observation}");
            }
            Self::Correction { instruction } => {
                let _ = writeln!(out, "Observation: {instruction}");
            }
        }
    }
}

/// Ordered scratchpad, dropped with the run that owns it
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool cycle
    pub fn push_step(
        &mut self,
        thought: impl Into<String>,
        tool: impl Into<String>,
        input: Value,
        observation: impl Into<String>,
    ) {
        self.entries.push(TranscriptEntry::Step {
            thought: thought.into(),
            tool: tool.into(),
            input,
            observation: observation.into(),
        });
    }

    /// Record a corrective note
    pub fn push_correction(&mut self, instruction: impl Into<String>) {
        self.entries.push(TranscriptEntry::Correction {
            instruction: instruction.into(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of corrective notes so far
    pub fn corrections(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::Correction { .. }))
            .count()
    }

    /// Text form appended to the prompt
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            entry.render_into(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_step_and_correction() {
        let mut transcript = Transcript::new();
        transcript.push_step("sum sales", "calculate_total", json!([1200, 520]), "1720.0");
        transcript.push_correction("Invalid Format: Missing 'Action:' after 'Thought:'");

        assert_eq!(
            transcript.render(),
            "Thought: sum sales\n\
             Action: calculate_total\n\
             Action Input: [1200,520]\n\
             Observation: 1720.0\n\
             Observation: Invalid Format: Missing 'Action:' after 'Thought:'\n"
        );
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.corrections(), 1);
    }

    #[test]
    fn test_string_input_rendered_raw() {
        let mut transcript = Transcript::new();
        transcript.push_step("t", "advanced_calculator", json!("2 + 2"), "4.0");
        assert!(transcript.render().contains("Action Input: 2 + 2\n"));
    }

    #[test]
    fn test_empty() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert_eq!(transcript.render(), "");
    }
}
