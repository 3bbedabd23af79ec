//! Financial statement analysis for finova-rs
//!
//! Turns a loosely shaped JSON blob of business records into an income
//! statement, a statement of financial position and a DuPont ROE/ROA
//! breakdown. The pieces:
//!
//! - [`request`]: classification of the inbound payload into typed records
//! - [`tools`]: the calculation toolbox the model calls by name
//! - [`prompts`]: the ReAct instruction template with a worked example
//! - [`extract`]: total JSON extraction with advisory schema validation
//! - [`agent`]: [`FinancialAgent`], the bounded retry wrapper around the loop
//!
//! # Example
//!
//! ```rust,ignore
//! use finova_analysis::{AnalysisConfig, AnalysisRequest, FinancialAgent};
//! use tokio_util::sync::CancellationToken;
//!
//! let agent = FinancialAgent::builder()
//!     .provider(provider)
//!     .config(AnalysisConfig::default())
//!     .build()?;
//!
//! let request = AnalysisRequest::from_value(payload)?;
//! let outcome = agent.analyze(&request, &CancellationToken::new()).await?;
//! println!("{}", outcome.output);
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod prompts;
pub mod request;
pub mod schema;
pub mod toolbox;
pub mod tools;

pub use agent::{AnalysisOutcome, FinancialAgent, FinancialAgentBuilder};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use extract::{Extraction, ExtractionSource, Extractor, extract_and_validate};
pub use prompts::{FinancialPrompt, build_prompt};
pub use request::{AnalysisRequest, FinancialRecord};
pub use schema::{FinancialOutput, ValidationIssue, ValidationReport};
pub use toolbox::financial_toolbox;
pub use tools::{HistoricalDataSource, InMemoryHistoricalSource};
