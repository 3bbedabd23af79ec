//! Shared utilities for finova-rs
//!
//! Logging setup and environment-driven settings used by the server binary
//! and the crates it wires together.

pub mod config;
pub mod logging;

pub use config::{ConfigError, Settings};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
