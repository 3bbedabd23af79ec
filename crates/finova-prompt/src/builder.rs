//! Fluent prompt builder
//!
//! [`PromptBuilder`] assembles prompt fragments piece by piece, for the parts
//! of a prompt that are data-driven rather than fixed template text.

/// A fluent builder for constructing prompts
///
/// ```
/// use finova_prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new()
///     .text("You are a financial analysis assistant.")
///     .section("Rules")
///     .bullet("Use the tools")
///     .when(false, "never shown")
///     .build();
///
/// assert!(prompt.contains("## Rules"));
/// assert!(prompt.contains("- Use the tools"));
/// assert!(!prompt.contains("never shown"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    parts: Vec<String>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add static text
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.parts.push(content.into());
        self
    }

    /// Add a line of text followed by a newline
    pub fn line(self, content: impl Into<String>) -> Self {
        self.text(format!("{}\n", content.into()))
    }

    /// Add a newline
    pub fn newline(self) -> Self {
        self.text("\n")
    }

    /// Add a section header (markdown h2)
    pub fn section(self, title: impl Into<String>) -> Self {
        self.text(format!("\n## {}\n", title.into()))
    }

    /// Add content conditionally
    pub fn when(self, condition: bool, content: impl Into<String>) -> Self {
        if condition { self.text(content) } else { self }
    }

    /// Add a bullet point
    pub fn bullet(self, content: impl Into<String>) -> Self {
        self.text(format!("- {}\n", content.into()))
    }

    /// Add multiple bullet points
    pub fn bullets<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item in items {
            self = self.bullet(item);
        }
        self
    }

    /// Add a numbered item
    pub fn numbered(self, num: usize, content: impl Into<String>) -> Self {
        self.text(format!("{}. {}\n", num, content.into()))
    }

    /// Add items numbered from 1
    pub fn numbered_list<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (i, item) in items.into_iter().enumerate() {
            self = self.numbered(i + 1, item);
        }
        self
    }

    /// Whether nothing has been added yet
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(String::is_empty)
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        self.parts.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_lines() {
        let prompt = PromptBuilder::new().line("Line 1").text("Line 2").build();
        assert_eq!(prompt, "Line 1\nLine 2");
    }

    #[test]
    fn test_numbered_list() {
        let prompt = PromptBuilder::new()
            .numbered_list(["Return only JSON", "Close every brace"])
            .build();
        assert_eq!(prompt, "1. Return only JSON\n2. Close every brace\n");
    }

    #[test]
    fn test_bullets() {
        let prompt = PromptBuilder::new().bullets(["a", "b"]).build();
        assert_eq!(prompt, "- a\n- b\n");
    }

    #[test]
    fn test_is_empty() {
        assert!(PromptBuilder::new().is_empty());
        assert!(PromptBuilder::new().when(false, "x").is_empty());
        assert!(!PromptBuilder::new().newline().is_empty());
    }
}
