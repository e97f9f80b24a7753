// src/watch/binding.rs

//! Pure per-binding state machine.
//!
//! Every watch binding cycles through `Idle → Pending → Running → Idle`.
//! This module holds only the transition logic: no timers, channels or
//! tasks. The async shell in [`trigger`](super::trigger) feeds it inputs and
//! carries out the returned actions.
//!
//! Changes that arrive while the bound task is running never queue up: they
//! set a single "re-run" flag, so any burst of events during a run produces
//! exactly one follow-up run.

/// Where a binding currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingState {
    #[default]
    Idle,
    /// A change was seen; waiting for the quiet period to elapse.
    Pending,
    /// The bound task is executing. `rerun` is set when a change arrived
    /// after the run started.
    Running { rerun: bool },
}

/// Something that happened to the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingInput {
    /// A matching path changed.
    Changed,
    /// The quiet period after the last change elapsed.
    Quiesced,
    /// The run started by this binding reached a terminal outcome.
    RunFinished,
}

/// What the async shell must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingAction {
    Nothing,
    /// (Re-)start the quiet-period timer.
    ArmTimer,
    /// Start a run of the bound task.
    StartRun,
}

#[derive(Debug, Default)]
pub struct BindingCore {
    state: BindingState,
    runs_started: u64,
}

impl BindingCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    pub fn step(&mut self, input: BindingInput) -> BindingAction {
        use BindingAction::*;
        use BindingInput::*;
        use BindingState::*;

        let (next, action) = match (self.state, input) {
            (Idle, Changed) | (Pending, Changed) => (Pending, ArmTimer),
            (Pending, Quiesced) => (Running { rerun: false }, StartRun),
            (Running { .. }, Changed) => (Running { rerun: true }, Nothing),
            (Running { rerun: true }, RunFinished) => (Pending, ArmTimer),
            (Running { rerun: false }, RunFinished) => (Idle, Nothing),
            // Stale timer or a completion we did not start: ignore.
            (state, _) => (state, Nothing),
        };

        if action == StartRun {
            self.runs_started += 1;
        }
        self.state = next;
        action
    }
}
