//! Warden - Rewrite Passes
//!
//! Two cooperating IR rewrite passes that prepare compiled code for
//! hardware-enforced spatial memory safety. The array-to-pointer
//! normalizer turns implicit array addressing into explicit pointer
//! creation events; the bounds tagging instrumentor then pairs every such
//! event with a set-bounds primitive sized to the referent's full extent.
//!
//! The normalizer must reach a fixed point on a function before the
//! instrumentor runs on it: the instrumentor detects pointer creation only
//! through visible store instructions, which the normalizer manufactures.

pub mod defs;
pub mod expand;
pub mod instrument;
pub mod normalize;
pub mod provenance;

mod pipeline_tests;

pub use expand::expand_setbounds;
pub use instrument::instrument_function;
pub use normalize::{normalize_function, normalize_to_fixed_point};

use log::debug;
use warden_common::{Diagnostic, PassError, Reporter};
use warden_ir::Module;

/// Outcome of a pipeline run over a module
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Implicit addressing sites rewritten by the normalizer
    pub sites_rewritten: usize,
    /// Set-bounds primitives inserted by the instrumentor
    pub bounds_inserted: usize,
    /// Notices for sites left unrewritten (known-unsupported patterns)
    pub diagnostics: Vec<Diagnostic>,
}

/// Run both passes over every defined function in `module`.
///
/// The module is mutated in place; treating the set-bounds primitive as a
/// no-op, the result is observably equivalent to the input.
pub fn run_module(module: &mut Module) -> Result<PassReport, PassError> {
    // A variable-length stack frame anywhere poisons the whole unit; check
    // up front so nothing is rewritten before the abort.
    for function in &module.functions {
        instrument::check_no_dynamic_alloca(function)?;
    }

    let mut report = PassReport::default();
    let mut reporter = Reporter::new();
    let Module {
        functions,
        globals,
        layout,
        ..
    } = module;

    for function in functions.iter_mut().filter(|f| !f.is_external) {
        debug!("running passes on '{}'", function.name);
        report.sites_rewritten +=
            normalize::normalize_to_fixed_point(function, globals, layout, &mut reporter)?;
        report.bounds_inserted +=
            instrument::instrument_function(function, globals, layout)?;
    }

    report.diagnostics = reporter.into_diagnostics();
    Ok(report)
}
