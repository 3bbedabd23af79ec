//! Tool framework for finova-rs
//!
//! Tools are named, described, callable units a model may invoke. They are
//! collected once into an immutable [`ToolRegistry`] shared by every request,
//! and invoked through a per-session [`ToolDispatcher`] that memoizes results.

pub mod canonical;
pub mod dispatcher;
pub mod registry;
pub mod tool;

pub use canonical::canonical_key;
pub use dispatcher::{DispatchOutcome, DispatchStatus, ToolDispatcher};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use tool::{Tool, schema};
