//! Error handling for the Warden passes
//!
//! Two taxonomies live here. `PassError` covers internal invariant
//! violations that must abort the transformation: proceeding would corrupt
//! the bounds metadata the safety guarantee depends on. `Diagnostic` covers
//! known-unsupported source patterns that are skipped locally and surfaced
//! as notices.

use crate::types::LabelId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal errors raised by the instrumentation passes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PassError {
    #[error("type has no static size: {type_name}")]
    UnsizedType { type_name: String },

    #[error("malformed IR at {site}: {message}")]
    MalformedIr { site: Site, message: String },

    #[error(
        "function '{function}' contains a dynamically sized stack allocation; \
         bounds for variable-length frames cannot be computed"
    )]
    DynamicStackAllocation { function: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PassError {
    pub fn unsized_type(type_name: impl Into<String>) -> Self {
        PassError::UnsizedType {
            type_name: type_name.into(),
        }
    }

    pub fn malformed(site: Site, message: impl Into<String>) -> Self {
        PassError::MalformedIr {
            site,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PassError::Internal {
            message: message.into(),
        }
    }
}

/// A position inside a function's instruction stream.
///
/// The passes never see source text, so diagnostics point at IR sites
/// instead of file/line locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub function: String,
    pub block: LabelId,
    pub index: usize,
}

impl Site {
    pub fn new(function: impl Into<String>, block: LabelId, index: usize) -> Self {
        Self {
            function: function.into(),
            block,
            index,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:bb{}:{}", self.function, self.block, self.index)
    }
}

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A non-fatal notice about a site the passes left untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub site: Site,
}

impl Diagnostic {
    pub fn warning(message: String, site: Site) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            site,
        }
    }

    pub fn note(message: String, site: Site) -> Self {
        Self {
            severity: Severity::Note,
            message,
            site,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.severity, self.message, self.site)
    }
}

/// Collects diagnostics across a pass run
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    warning_count: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a warning diagnostic
    pub fn warning(&mut self, message: String, site: Site) {
        self.diagnostics.push(Diagnostic::warning(message, site));
        self.warning_count += 1;
    }

    /// Report a note diagnostic
    pub fn note(&mut self, message: String, site: Site) {
        self.diagnostics.push(Diagnostic::note(message, site));
    }

    /// Absorb diagnostics collected by another reporter
    pub fn extend(&mut self, diagnostics: Vec<Diagnostic>) {
        for diag in diagnostics {
            if diag.severity == Severity::Warning {
                self.warning_count += 1;
            }
            self.diagnostics.push(diag);
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Move the collected diagnostics out of the reporter
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
