//! Diagnostic creation, severity management, and terminal rendering.
//!
//! This crate provides structured [`Diagnostic`] findings about a state
//! machine, each pointing at the machine element it concerns through an
//! [`ElementRef`]. The thread-safe [`DiagnosticSink`] accumulates findings
//! while a check runs, and [`TerminalRenderer`] formats them with element
//! names resolved against the machine.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod location;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use location::ElementRef;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
