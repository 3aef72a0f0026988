//! Configuration types deserialized from `states.toml`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The top-level configuration parsed from `states.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatesConfig {
    /// Simulator timing policies and clock pacing.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Machine verifier limits.
    #[serde(default)]
    pub verifier: VerifierConfig,
}

/// When a state action becomes observable relative to state entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateActionTiming {
    /// Applied in the same tick the state is entered.
    #[default]
    OnEntry,
    /// Applied at the start of the tick following entry.
    OneTickAfterEntry,
}

/// When a transition action becomes observable relative to the crossing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionActionTiming {
    /// Applied when the transition is crossed.
    #[default]
    AfterCrossing,
    /// Applied as soon as the transition is the single candidate, so the
    /// write is already visible when the next tick evaluates conditions.
    BeforeCrossing,
}

/// Simulation settings.
///
/// The four timing switches are independent and only move the moment a
/// write becomes observable; traversal itself is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Timing of `Set`/`Reset`/`Assign` actions on states.
    #[serde(default = "default_memorized_state_actions")]
    pub memorized_state_actions: StateActionTiming,
    /// Timing of `ActiveOnState`, pulse and counter actions on states.
    #[serde(default)]
    pub continuous_state_actions: StateActionTiming,
    /// Timing of memorized actions on transitions.
    #[serde(default)]
    pub memorized_transition_actions: TransitionActionTiming,
    /// Timing of pulse actions on transitions.
    #[serde(default)]
    pub pulse_transition_actions: TransitionActionTiming,
    /// Autoplay clock period in milliseconds.
    #[serde(default = "default_clock_period_ms")]
    pub clock_period_ms: u64,
}

impl SimulationConfig {
    /// The autoplay clock period.
    pub fn clock_period(&self) -> Duration {
        Duration::from_millis(self.clock_period_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            memorized_state_actions: default_memorized_state_actions(),
            continuous_state_actions: StateActionTiming::OnEntry,
            memorized_transition_actions: TransitionActionTiming::AfterCrossing,
            pulse_transition_actions: TransitionActionTiming::AfterCrossing,
            clock_period_ms: default_clock_period_ms(),
        }
    }
}

fn default_memorized_state_actions() -> StateActionTiming {
    StateActionTiming::OneTickAfterEntry
}

fn default_clock_period_ms() -> u64 {
    1000
}

/// Machine verifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VerifierConfig {
    /// Widest total input width for which truth tables are enumerated.
    #[serde(default = "default_max_truth_table_width")]
    pub max_truth_table_width: u32,
    /// Whether to report states unreachable from the initial state.
    #[serde(default = "default_true")]
    pub check_unreachable_states: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_truth_table_width: default_max_truth_table_width(),
            check_unreachable_states: true,
        }
    }
}

fn default_max_truth_table_width() -> u32 {
    12
}

fn default_true() -> bool {
    true
}
