//! Simulation runtime for finite state machines.
//!
//! This crate turns a static [`states_ir::Fsm`] into something that runs:
//!
//! - [`ReactiveEquation`] mirrors an equation tree and recomputes only the
//!   nodes downstream of a changed variable, each at most once per write.
//! - [`SignalSession`] owns the mirrors of one session and routes every
//!   variable write to them and to value listeners.
//! - [`TruthTable`] enumerates every input combination of a set of
//!   equations.
//! - [`FsmSimulator`] steps the machine one clock tick at a time under the
//!   configured action timing policies, with [`Clock`] pacing autoplay.
//! - [`verify`] reports structural problems as diagnostics.
//!
//! # Usage
//!
//! ```ignore
//! use states_sim::{FsmSimulator, TickOutcome};
//!
//! let mut sim = FsmSimulator::new(&mut fsm, config.simulation.clone());
//! sim.reset()?;
//! match sim.step() {
//!     TickOutcome::Ambiguous(candidates) => sim.resolve_ambiguity(candidates[0])?,
//!     outcome => outcome,
//! };
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod reactive;
pub mod session;
pub mod simulator;
pub mod truth_table;
pub mod verifier;

pub use clock::Clock;
pub use error::SimError;
pub use reactive::ReactiveEquation;
pub use session::SignalSession;
pub use simulator::{FsmSimulator, TickOutcome};
pub use truth_table::TruthTable;
pub use verifier::verify;
