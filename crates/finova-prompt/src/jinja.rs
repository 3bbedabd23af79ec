//! MiniJinja-backed templates

use crate::{PromptError, Result};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

/// A named prompt template
///
/// Rendering is a pure function of the template source and the variables:
/// the same inputs always produce byte-identical output. Referencing a
/// variable that was not supplied is an error rather than an empty string.
pub struct JinjaTemplate {
    name: String,
    source: String,
    env: Environment<'static>,
}

impl JinjaTemplate {
    /// Parse and validate a template
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();

        Environment::new()
            .template_from_str(&source)
            .map(|_| ())
            .map_err(|e| PromptError::TemplateParseFailed {
                name: name.clone(),
                detail: e.to_string(),
            })?;

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        Ok(Self { name, source, env })
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with the given variables
    pub fn render<S: Serialize>(&self, vars: &S) -> Result<String> {
        self.env
            .render_str(&self.source, vars)
            .map_err(|e| PromptError::RenderError {
                name: self.name.clone(),
                detail: e.to_string(),
            })
    }
}

impl std::fmt::Debug for JinjaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_template() {
        let template = JinjaTemplate::new("test", "Hello, {{ name }}!").unwrap();
        let result = template.render(&json!({ "name": "World" })).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_invalid_template_error() {
        let result = JinjaTemplate::new("test", "{{ unclosed");
        assert!(matches!(result, Err(PromptError::TemplateParseFailed { .. })));
    }

    #[test]
    fn test_missing_variable_is_error() {
        let template = JinjaTemplate::new("test", "Data: {{ financial_data }}").unwrap();
        let result = template.render(&json!({}));
        assert!(matches!(result, Err(PromptError::RenderError { .. })));
    }

    #[test]
    fn test_braces_in_values_are_not_interpreted() {
        let template = JinjaTemplate::new("test", "{{ example }}").unwrap();
        let result = template
            .render(&json!({ "example": "{\"lineItem\": \"Revenue\"}" }))
            .unwrap();
        assert_eq!(result, "{\"lineItem\": \"Revenue\"}");
    }

    #[test]
    fn test_deterministic() {
        let template =
            JinjaTemplate::new("test", "{% for t in tools %}{{ t }};{% endfor %}\n").unwrap();
        let vars = json!({ "tools": ["calculate_total", "calculate_ratio"] });

        let a = template.render(&vars).unwrap();
        let b = template.render(&vars).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "calculate_total;calculate_ratio;\n");
    }

    #[test]
    fn test_conditional() {
        let template = JinjaTemplate::new(
            "conditional",
            "{% if labels %}Periods: {{ labels | join(', ') }}{% else %}No periods{% endif %}",
        )
        .unwrap();

        let with = template
            .render(&json!({ "labels": ["January 2024", "February 2024"] }))
            .unwrap();
        assert_eq!(with, "Periods: January 2024, February 2024");

        let without = template.render(&json!({ "labels": [] })).unwrap();
        assert_eq!(without, "No periods");
    }
}
