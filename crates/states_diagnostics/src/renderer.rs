//! Diagnostic rendering for human-readable output.

use crate::diagnostic::Diagnostic;
use states_ir::Fsm;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic, resolving element names against `fsm`.
    fn render(&self, diag: &Diagnostic, fsm: &Fsm) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[W004]: state is unreachable from the initial state
///   --> state `Orphan`
///   = note: ...
///   = help: ...
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalRenderer;

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, fsm: &Fsm) -> String {
        let mut out = format!("{}[{}]: {}\n", diag.severity, diag.code, diag.message);
        if let Some(location) = &diag.location {
            out.push_str(&format!("  --> {}\n", location.describe(fsm)));
        }
        for note in &diag.notes {
            out.push_str(&format!("  = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("  = help: {help}\n"));
        }
        out
    }
}
