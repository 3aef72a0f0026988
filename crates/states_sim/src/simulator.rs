//! Clocked execution of a finite state machine.
//!
//! [`FsmSimulator`] drives one [`Fsm`] through ticks. Each tick:
//!
//! 1. Pulses written during the previous tick are released. Bits prepared
//!    for the next crossing that the release cleared are written again.
//! 2. State actions deferred to "one tick after entry" are applied.
//! 3. The outgoing conditions of the active state are evaluated. A missing
//!    condition is true; a null or non-1-bit condition is false.
//! 4. No candidate keeps the state and re-applies its counter actions; one
//!    candidate is crossed; several suspend the simulation until
//!    [`resolve_ambiguity`](FsmSimulator::resolve_ambiguity) picks one.
//!
//! The timing policies of [`SimulationConfig`] only move the moment an
//! action's write becomes visible; the traversal is the same for all of
//! them. Transition actions timed "before crossing" are applied as soon as
//! their transition is the single candidate, and rolled back if it stops
//! being one before the next tick.

use std::time::Instant;

use log::{debug, info, warn};
use states_common::{BitRange, BitValue};
use states_config::{SimulationConfig, StateActionTiming, TransitionActionTiming};
use states_ir::{
    Action, ActionCategory, ActionKind, EquationId, Fsm, IrError, StateId, TransitionId,
    VariableId, VariableKind,
};

use crate::clock::Clock;
use crate::error::SimError;
use crate::session::{SignalSession, ValueListener};

/// Callback invoked with the newly active state.
pub type StateListener = Box<dyn FnMut(Option<StateId>)>;

/// What a call to [`FsmSimulator::step`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No state is active; nothing happened.
    Idle,
    /// An ambiguity is pending; nothing happened.
    Blocked,
    /// No transition was a candidate; the active state was kept.
    Stayed,
    /// A transition was crossed.
    Fired {
        /// The crossed transition.
        transition: TransitionId,
        /// The state left.
        from: StateId,
        /// The state entered.
        to: StateId,
    },
    /// Several transitions were candidates; simulation is suspended.
    Ambiguous(Vec<TransitionId>),
}

/// Before-crossing writes of the current single candidate.
#[derive(Debug)]
struct PreparedCrossing {
    transition: TransitionId,
    writes: Vec<PreparedWrite>,
}

#[derive(Debug)]
struct PreparedWrite {
    action: Action,
    /// Bits the action drives.
    written: BitValue,
    /// Bits to restore on rollback; unused for pulses.
    replaced: BitValue,
}

impl PreparedWrite {
    fn is_pulse(&self) -> bool {
        self.action.category_on_transition() == ActionCategory::Pulse
    }
}

/// Steps a machine tick by tick.
pub struct FsmSimulator<'a> {
    fsm: &'a mut Fsm,
    config: SimulationConfig,
    session: SignalSession,
    clock: Clock,
    active: Option<StateId>,
    latest_transition: Option<TransitionId>,
    pending_ambiguity: Option<Vec<TransitionId>>,
    /// Pulses to release at the start of the next tick.
    pulses: Vec<Action>,
    /// State actions waiting for the tick after entry.
    deferred: Vec<Action>,
    prepared: Option<PreparedCrossing>,
    state_listeners: Vec<StateListener>,
}

impl<'a> FsmSimulator<'a> {
    /// Opens a simulation session on `fsm`.
    ///
    /// Reactive mirrors are built from the equations as they are now. The
    /// simulator starts idle; call [`reset`](Self::reset) to activate the
    /// initial state.
    pub fn new(fsm: &'a mut Fsm, config: SimulationConfig) -> Self {
        let session = SignalSession::start(fsm);
        let clock = Clock::new(config.clock_period());
        Self {
            fsm,
            config,
            session,
            clock,
            active: None,
            latest_transition: None,
            pending_ambiguity: None,
            pulses: Vec::new(),
            deferred: Vec::new(),
            prepared: None,
            state_listeners: Vec::new(),
        }
    }

    /// Returns the simulated machine.
    pub fn fsm(&self) -> &Fsm {
        &*self.fsm
    }

    /// Returns the simulation settings.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Restarts the simulation from the initial state.
    ///
    /// Inputs and locals get their initial values, outputs are zeroed and
    /// every pending pulse, deferred action, prepared crossing and ambiguity
    /// is discarded. Safe to call at any point of a session.
    pub fn reset(&mut self) -> Result<(), SimError> {
        info!("simulation reset");
        self.latest_transition = None;
        self.pending_ambiguity = None;
        self.prepared = None;
        self.pulses.clear();
        self.deferred.clear();
        self.clock.reset();

        let variables: Vec<(VariableId, VariableKind, u32)> = self
            .fsm
            .variables()
            .iter()
            .map(|(id, var)| (id, var.kind(), var.size()))
            .collect();
        for (id, kind, size) in variables {
            match kind {
                VariableKind::Input | VariableKind::Local => {
                    self.session.reset_variable(self.fsm.variables_mut(), id);
                }
                VariableKind::Output => {
                    self.session.write(
                        self.fsm.variables_mut(),
                        id,
                        &BitValue::zero(size),
                        BitRange::All,
                    )?;
                }
                VariableKind::Constant => {}
            }
        }

        let Some(initial) = self.fsm.initial_state() else {
            self.active = None;
            self.clock.stop();
            self.emit_state_changed();
            return Err(SimError::NoInitialState);
        };
        self.active = Some(initial);
        self.activate(initial);
        self.emit_state_changed();
        self.refresh_prepared();
        Ok(())
    }

    /// Runs one clock tick.
    pub fn step(&mut self) -> TickOutcome {
        let Some(current) = self.active else {
            return TickOutcome::Idle;
        };
        if self.pending_ambiguity.is_some() {
            return TickOutcome::Blocked;
        }
        let tick = self.clock.advance();

        let released = std::mem::take(&mut self.pulses);
        for action in &released {
            self.release(action);
        }
        if !released.is_empty() {
            self.reassert_prepared();
        }
        let counters_applied = self.apply_deferred();

        let candidates = self.candidates(current, true);
        let outcome = match candidates.len() {
            0 => {
                if !counters_applied {
                    self.apply_counters(current);
                }
                TickOutcome::Stayed
            }
            1 => self.fire(candidates[0]),
            _ => {
                warn!(
                    "tick {tick}: {} transitions are candidates, waiting for a choice",
                    candidates.len()
                );
                self.pending_ambiguity = Some(candidates.clone());
                self.clock.stop();
                TickOutcome::Ambiguous(candidates)
            }
        };
        self.refresh_prepared();
        debug!("tick {tick}: {outcome:?}");
        outcome
    }

    /// Crosses `choice`, one of the candidates of the pending ambiguity.
    pub fn resolve_ambiguity(&mut self, choice: TransitionId) -> Result<TickOutcome, SimError> {
        let Some(candidates) = &self.pending_ambiguity else {
            return Err(SimError::NoAmbiguityPending);
        };
        if !candidates.contains(&choice) {
            return Err(SimError::NotACandidate(choice));
        }
        self.pending_ambiguity = None;
        let outcome = self.fire(choice);
        self.refresh_prepared();
        Ok(outcome)
    }

    // ---- autoplay ----

    /// Starts autoplay; ticks become due one period apart from `now`.
    pub fn start(&mut self, now: Instant) -> Result<(), SimError> {
        if self.active.is_none() {
            return Err(SimError::Idle);
        }
        if let Some(candidates) = &self.pending_ambiguity {
            return Err(SimError::AmbiguityPending(candidates.len()));
        }
        self.clock.start(now);
        Ok(())
    }

    /// Stops autoplay. The current tick, if any, has already completed.
    pub fn stop(&mut self) {
        self.clock.stop();
    }

    /// Returns `true` while autoplay is running.
    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Runs every tick that became due at `now`.
    ///
    /// Autoplay stops when a tick reports an ambiguity or finds no active
    /// state.
    pub fn poll(&mut self, now: Instant) -> Vec<TickOutcome> {
        let due = self.clock.due(now);
        let mut outcomes = Vec::new();
        for _ in 0..due {
            if !self.clock.is_running() {
                break;
            }
            let outcome = self.step();
            if matches!(outcome, TickOutcome::Idle | TickOutcome::Blocked) {
                self.clock.stop();
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    // ---- inputs ----

    /// Drives an input variable from outside.
    pub fn set_input(&mut self, id: VariableId, value: &BitValue) -> Result<bool, SimError> {
        self.check_input(id)?;
        self.write_input(id, value, BitRange::All)
    }

    /// Drives one bit of an input variable.
    pub fn set_input_bit(&mut self, id: VariableId, bit: u32, value: bool) -> Result<bool, SimError> {
        let size = self.check_input(id)?;
        if bit >= size {
            return Err(SimError::BitOutOfRange { bit, size });
        }
        self.write_input(id, &BitValue::from_bool(value), BitRange::Bit(bit))
    }

    /// Inverts one bit of an input variable.
    pub fn toggle_input_bit(&mut self, id: VariableId, bit: u32) -> Result<(), SimError> {
        let current = self
            .fsm
            .variables()
            .variable(id)
            .map(|var| var.current_value().bit(bit))
            .unwrap_or(false);
        self.set_input_bit(id, bit, !current)?;
        Ok(())
    }

    fn check_input(&self, id: VariableId) -> Result<u32, SimError> {
        match self.fsm.variables().variable(id) {
            Some(var) if var.kind() == VariableKind::Input => Ok(var.size()),
            Some(_) => Err(SimError::NotAnInput(id)),
            None => Err(SimError::Ir(IrError::UnknownVariable(id))),
        }
    }

    fn write_input(
        &mut self,
        id: VariableId,
        value: &BitValue,
        range: BitRange,
    ) -> Result<bool, SimError> {
        let changed = self
            .session
            .write(self.fsm.variables_mut(), id, value, range)?;
        if changed {
            self.refresh_prepared();
        }
        Ok(changed)
    }

    // ---- observation ----

    /// Registers a callback invoked whenever the active state changes,
    /// including on reset.
    pub fn on_state_changed(&mut self, listener: StateListener) {
        self.state_listeners.push(listener);
    }

    /// Registers a callback invoked whenever a variable value changes.
    pub fn on_value_changed(&mut self, listener: ValueListener) {
        self.session.on_value_changed(listener);
    }

    /// The active state; `None` while idle.
    pub fn active_state(&self) -> Option<StateId> {
        self.active
    }

    /// The last transition crossed since reset.
    pub fn latest_transition(&self) -> Option<TransitionId> {
        self.latest_transition
    }

    /// The candidates of the unresolved ambiguity, if any.
    pub fn pending_ambiguity(&self) -> Option<&[TransitionId]> {
        self.pending_ambiguity.as_deref()
    }

    /// Ticks run since the last reset.
    pub fn tick_count(&self) -> u64 {
        self.clock.ticks()
    }

    /// The autoplay clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Changes the autoplay period.
    pub fn set_clock_period(&mut self, period: std::time::Duration) {
        self.clock.set_period(period);
    }

    /// Current value of a variable.
    pub fn value(&self, id: VariableId) -> Option<&BitValue> {
        self.fsm.variables().variable(id).map(|var| var.current_value())
    }

    /// Live value of an equation.
    pub fn equation_value(&self, id: EquationId) -> Option<&BitValue> {
        self.session.value(id)
    }

    /// The reactive session of this simulation.
    pub fn session(&self) -> &SignalSession {
        &self.session
    }

    // ---- traversal ----

    /// Outgoing transitions of `state` whose condition holds, in creation
    /// order.
    fn candidates(&self, state: StateId, log_broken: bool) -> Vec<TransitionId> {
        self.fsm
            .outgoing(state)
            .iter()
            .copied()
            .filter(|&id| match self.condition_holds(id) {
                Some(holds) => holds,
                None => {
                    if log_broken {
                        warn!("condition of {id} is not a 1-bit value; treated as false");
                    }
                    false
                }
            })
            .collect()
    }

    /// `None` when the condition is broken.
    fn condition_holds(&self, id: TransitionId) -> Option<bool> {
        let condition = match self.fsm.transition(id)?.condition() {
            None => return Some(true),
            Some(eq) => eq,
        };
        match self.session.value(condition) {
            Some(value) if value.size() == 1 => Some(value.bit(0)),
            _ => None,
        }
    }

    fn fire(&mut self, id: TransitionId) -> TickOutcome {
        let Some(transition) = self.fsm.transition(id).cloned() else {
            return TickOutcome::Stayed;
        };
        let (from, to) = (transition.source(), transition.target());
        self.deactivate(from);

        let prepared_here = match self.prepared.take() {
            Some(prepared) if prepared.transition == id => {
                self.pulses.extend(
                    prepared
                        .writes
                        .into_iter()
                        .filter(PreparedWrite::is_pulse)
                        .map(|w| w.action),
                );
                true
            }
            Some(stale) => {
                self.rollback(stale);
                false
            }
            None => false,
        };
        for action in transition.actions() {
            let timing = self.transition_timing(action);
            if prepared_here && timing == TransitionActionTiming::BeforeCrossing {
                continue;
            }
            self.perform_transition_action(action);
        }

        self.active = Some(to);
        self.latest_transition = Some(id);
        self.activate(to);
        info!("crossed {id}: {from} -> {to}");
        self.emit_state_changed();
        TickOutcome::Fired {
            transition: id,
            from,
            to,
        }
    }

    fn activate(&mut self, state: StateId) {
        let actions = self
            .fsm
            .state(state)
            .map(|s| s.actions().to_vec())
            .unwrap_or_default();
        for action in actions {
            match self.state_timing(&action) {
                StateActionTiming::OnEntry => self.perform_state_action(&action),
                StateActionTiming::OneTickAfterEntry => self.deferred.push(action),
            }
        }
    }

    fn deactivate(&mut self, state: StateId) {
        self.deferred.clear();
        let held: Vec<Action> = self
            .fsm
            .state(state)
            .map(|s| {
                s.actions()
                    .iter()
                    .filter(|a| a.kind == ActionKind::ActiveOnState)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for action in &held {
            self.release(action);
        }
    }

    /// Applies deferred state actions. Returns whether a counter was among
    /// them.
    fn apply_deferred(&mut self) -> bool {
        let deferred = std::mem::take(&mut self.deferred);
        for action in &deferred {
            self.perform_state_action(action);
        }
        deferred.iter().any(|a| !a.is_level())
    }

    fn apply_counters(&mut self, state: StateId) {
        let counters: Vec<Action> = self
            .fsm
            .state(state)
            .map(|s| s.actions().iter().filter(|a| !a.is_level()).cloned().collect())
            .unwrap_or_default();
        for action in &counters {
            self.apply(action);
        }
    }

    fn perform_state_action(&mut self, action: &Action) {
        if self.apply(action).is_some() && action.category_on_state() == ActionCategory::Pulse {
            self.pulses.push(action.clone());
        }
    }

    fn perform_transition_action(&mut self, action: &Action) {
        if self.apply(action).is_some() && action.category_on_transition() == ActionCategory::Pulse
        {
            self.pulses.push(action.clone());
        }
    }

    fn state_timing(&self, action: &Action) -> StateActionTiming {
        match action.category_on_state() {
            ActionCategory::Memorized => self.config.memorized_state_actions,
            ActionCategory::Pulse | ActionCategory::Continuous => {
                self.config.continuous_state_actions
            }
        }
    }

    fn transition_timing(&self, action: &Action) -> TransitionActionTiming {
        match action.category_on_transition() {
            ActionCategory::Pulse => self.config.pulse_transition_actions,
            ActionCategory::Memorized | ActionCategory::Continuous => {
                self.config.memorized_transition_actions
            }
        }
    }

    // ---- before-crossing preparation ----

    fn refresh_prepared(&mut self) {
        let before = TransitionActionTiming::BeforeCrossing;
        if self.config.memorized_transition_actions != before
            && self.config.pulse_transition_actions != before
        {
            return;
        }
        let single = match self.active {
            Some(state) if self.pending_ambiguity.is_none() => {
                match self.candidates(state, false).as_slice() {
                    [only] => Some(*only),
                    _ => None,
                }
            }
            _ => None,
        };
        if let Some(prepared) = &self.prepared {
            if Some(prepared.transition) == single {
                return;
            }
        }
        if let Some(stale) = self.prepared.take() {
            self.rollback(stale);
        }
        if let Some(id) = single {
            self.prepare(id);
        }
    }

    fn prepare(&mut self, id: TransitionId) {
        let actions: Vec<Action> = self
            .fsm
            .transition(id)
            .map(|t| {
                t.actions()
                    .iter()
                    .filter(|a| self.transition_timing(a) == TransitionActionTiming::BeforeCrossing)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let mut writes = Vec::new();
        for action in actions {
            let Some(replaced) = self.apply(&action) else {
                continue;
            };
            let Some(written) = self.current_bits(&action) else {
                continue;
            };
            writes.push(PreparedWrite {
                action,
                written,
                replaced,
            });
        }
        debug!("prepared {} for crossing", id);
        self.prepared = Some(PreparedCrossing {
            transition: id,
            writes,
        });
    }

    /// Writes the prepared bits again after a pulse release cleared them.
    fn reassert_prepared(&mut self) {
        let Some(mut prepared) = self.prepared.take() else {
            return;
        };
        for write in &mut prepared.writes {
            let Some(current) = self.current_bits(&write.action) else {
                continue;
            };
            if current == write.written {
                continue;
            }
            if !write.is_pulse() {
                write.replaced = current;
            }
            self.write(write.action.variable, &write.written, write.action.range);
        }
        self.prepared = Some(prepared);
    }

    fn rollback(&mut self, prepared: PreparedCrossing) {
        debug!("rolling back writes prepared for {}", prepared.transition);
        for write in prepared.writes.iter().rev() {
            if write.is_pulse() {
                self.release(&write.action);
            } else {
                self.write(write.action.variable, &write.replaced, write.action.range);
            }
        }
    }

    // ---- writes ----

    /// Performs an action. Returns the bits it replaced, or `None` when
    /// nothing was written.
    fn apply(&mut self, action: &Action) -> Option<BitValue> {
        let current = self.current_bits(action)?;
        let next = action.next_value(&current);
        if next.is_null() {
            warn!(
                "{:?} on {} has no value for range {:?}; skipped",
                action.kind, action.variable, action.range
            );
            return None;
        }
        self.write(action.variable, &next, action.range)
            .then_some(current)
    }

    /// The current bits of the range an action addresses.
    fn current_bits(&self, action: &Action) -> Option<BitValue> {
        let bits = self
            .fsm
            .variables()
            .variable(action.variable)?
            .current_value()
            .subrange(action.range);
        (!bits.is_null()).then_some(bits)
    }

    /// Zeroes the bits an action addressed.
    fn release(&mut self, action: &Action) {
        let width = self
            .fsm
            .variables()
            .variable(action.variable)
            .and_then(|var| action.range.resolve(var.size()))
            .map(|(msb, lsb)| msb - lsb + 1);
        if let Some(width) = width {
            self.write(action.variable, &BitValue::zero(width), action.range);
        }
    }

    fn write(&mut self, id: VariableId, value: &BitValue, range: BitRange) -> bool {
        match self
            .session
            .write(self.fsm.variables_mut(), id, value, range)
        {
            Ok(_) => true,
            Err(err) => {
                warn!("write to {id} rejected: {err}");
                false
            }
        }
    }

    fn emit_state_changed(&mut self) {
        let active = self.active;
        for listener in &mut self.state_listeners {
            listener(active);
        }
    }
}

impl std::fmt::Debug for FsmSimulator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsmSimulator")
            .field("active", &self.active)
            .field("latest_transition", &self.latest_transition)
            .field("pending_ambiguity", &self.pending_ambiguity)
            .field("tick", &self.clock.ticks())
            .finish_non_exhaustive()
    }
}
