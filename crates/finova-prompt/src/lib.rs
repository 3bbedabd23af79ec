//! Prompt templating for finova-rs
//!
//! - [`JinjaTemplate`]: a named MiniJinja template, validated once at
//!   construction and rendered with strict undefined-variable checking
//! - [`PromptBuilder`]: fluent assembly of prompt fragments
//!
//! ```
//! use finova_prompt::{JinjaTemplate, PromptBuilder};
//! use serde_json::json;
//!
//! let rules = PromptBuilder::new()
//!     .numbered(1, "Return only JSON")
//!     .numbered(2, "Never include markdown")
//!     .build();
//!
//! let template = JinjaTemplate::new("demo", "Analyze {{ company }}.\n{{ rules }}").unwrap();
//! let prompt = template
//!     .render(&json!({ "company": "Fresh Sip", "rules": rules }))
//!     .unwrap();
//! assert!(prompt.starts_with("Analyze Fresh Sip."));
//! ```

mod builder;
mod error;
mod jinja;

pub use builder::PromptBuilder;
pub use error::{PromptError, Result};
pub use jinja::JinjaTemplate;
