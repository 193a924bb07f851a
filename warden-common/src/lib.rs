//! Warden - Common Types and Utilities
//!
//! This crate contains shared identifiers, error definitions, and the
//! diagnostic reporting used across the Warden instrumentation passes.

pub mod error;
pub mod types;

pub use error::{Diagnostic, PassError, Reporter, Severity, Site};
pub use types::*;
