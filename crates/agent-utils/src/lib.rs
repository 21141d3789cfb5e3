//! Shared utilities for agent pipelines
//!
//! Currently this is the tracing setup shared by the binaries.

pub mod logging;

pub use logging::{LogFormat, init_tracing};
