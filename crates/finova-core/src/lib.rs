//! Core abstractions for finova-rs
//!
//! Defines the traits and types shared by every crate in the workspace: the
//! [`Agent`] trait, the per-request [`Context`] and the core [`Error`].

pub mod agent;
pub mod context;
pub mod error;

pub use agent::Agent;
pub use context::Context;
pub use error::{Error, Result};
