//! State machine for one conversation session.
//!
//! Validates transitions against the transition table, merges slot values
//! into the session context, and refuses to enter a state whose required
//! context is absent. Keeps a bounded log of recent transitions for
//! debugging.

use super::schema::ContextSchema;
use super::state::{FlowType, HOME, State};
use super::transition::{TransitionError, TransitionTable};
use crate::services::conversation::context::{ContextPatch, SessionContext};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::LazyLock;

const MAX_LOG_SIZE: usize = 100;

static DEFAULT_TABLE: LazyLock<TransitionTable> = LazyLock::new(TransitionTable::new);

/// A log entry recording a state change.
#[derive(Debug, Clone)]
pub struct TransitionLog {
    pub from: State,
    pub to: State,
    /// True when the move bypassed table and schema checks
    pub forced: bool,
    pub timestamp: DateTime<Utc>,
}

impl TransitionLog {
    pub fn new(from: State, to: State, forced: bool) -> Self {
        Self {
            from,
            to,
            forced,
            timestamp: Utc::now(),
        }
    }
}

/// The result of a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: State,
    pub to: State,
    pub state_changed: bool,
}

/// Conversation state machine.
///
/// Owns the current state and the accumulated context for one session.
/// Callers load it from a stored session, drive it for one inbound
/// message, and export it back for persistence.
pub struct StateMachine {
    current_state: State,
    context: SessionContext,
    transition_table: &'static TransitionTable,
    schema: ContextSchema,
    event_log: VecDeque<TransitionLog>,
    max_log_size: usize,
}

impl StateMachine {
    /// Creates a machine at HOME with an empty context.
    pub fn new() -> Self {
        Self::with_context(HOME, SessionContext::default())
    }

    /// Creates a machine resumed from a stored state and context.
    pub fn with_context(state: State, context: SessionContext) -> Self {
        Self {
            current_state: state,
            context,
            transition_table: &DEFAULT_TABLE,
            schema: ContextSchema::new(),
            event_log: VecDeque::with_capacity(16),
            max_log_size: MAX_LOG_SIZE,
        }
    }

    pub fn current_state(&self) -> State {
        self.current_state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn transition_table(&self) -> &TransitionTable {
        self.transition_table
    }

    pub fn event_log(&self) -> &VecDeque<TransitionLog> {
        &self.event_log
    }

    /// Family of the current state.
    pub fn flow_type(&self) -> FlowType {
        self.current_state.flow_type()
    }

    /// True if `state` has no exits other than HOME.
    pub fn is_terminal_state(&self, state: State) -> bool {
        self.transition_table.is_terminal(state)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal_state(self.current_state)
    }

    /// Moves to `target`, merging `patch` into the context first.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` if the table has no edge from the current
    ///   state to `target`. Nothing is modified.
    /// - `MissingContext` if a field required by `target` is absent after
    ///   the merge. The merged values are kept; the state does not change.
    pub fn transition_to(
        &mut self,
        target: State,
        patch: ContextPatch,
    ) -> Result<StateTransition, TransitionError> {
        let from = self.current_state;

        if !self.transition_table.is_valid_transition(from, target) {
            tracing::debug!(from = %from, to = %target, "[StateMachine] Rejected transition");
            return Err(TransitionError::InvalidTransition {
                from,
                attempted: target,
            });
        }

        if from.is_safe() {
            self.context.last_safe_state = Some(from);
        }
        self.context.apply(&patch);

        let missing = self.context.missing(self.schema.required_fields(target));
        if !missing.is_empty() {
            tracing::debug!(
                from = %from,
                to = %target,
                missing = ?missing,
                "[StateMachine] Missing context for transition"
            );
            return Err(TransitionError::MissingContext { target, missing });
        }

        self.commit(from, target, false);

        Ok(StateTransition {
            from,
            to: target,
            state_changed: from != target,
        })
    }

    /// Boolean form of [`transition_to`](Self::transition_to).
    pub fn try_transition_to(&mut self, target: State, patch: ContextPatch) -> bool {
        self.transition_to(target, patch).is_ok()
    }

    /// Checks whether `transition_to(target, patch)` would succeed without
    /// modifying the machine.
    pub fn check_transition(
        &self,
        target: State,
        patch: &ContextPatch,
    ) -> Result<(), TransitionError> {
        let from = self.current_state;
        if !self.transition_table.is_valid_transition(from, target) {
            return Err(TransitionError::InvalidTransition {
                from,
                attempted: target,
            });
        }

        let mut merged = self.context.clone();
        merged.apply(patch);
        let missing = merged.missing(self.schema.required_fields(target));
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TransitionError::MissingContext { target, missing })
        }
    }

    /// Moves to `target` without table or schema checks (recovery only).
    pub fn force_transition(&mut self, target: State, patch: ContextPatch) {
        let from = self.current_state;
        self.context.apply(&patch);
        tracing::warn!(from = %from, to = %target, "[StateMachine] Forced transition");
        self.commit(from, target, true);
    }

    /// Forces the machine back to the last safe state, or HOME if none was
    /// recorded. The context is left as is.
    pub fn reset_to_safe_state(&mut self) -> State {
        let target = self.context.last_safe_state.unwrap_or(HOME);
        self.force_transition(target, ContextPatch::new());
        target
    }

    /// Explicit return to the hub: clears the context, then moves to HOME.
    pub fn return_home(&mut self) {
        let from = self.current_state;
        self.context.clear();
        tracing::debug!(from = %from, "[StateMachine] Returning home");
        self.commit(from, HOME, true);
    }

    /// Current state and a copy of the context, for persistence.
    pub fn export_state(&self) -> (State, SessionContext) {
        (self.current_state, self.context.clone())
    }

    /// Replaces state and context with persisted values.
    pub fn import_state(&mut self, state: State, context: SessionContext) {
        self.current_state = state;
        self.context = context;
    }

    /// Returns the number of transitions logged.
    pub fn log_size(&self) -> usize {
        self.event_log.len()
    }

    fn commit(&mut self, from: State, to: State, forced: bool) {
        self.current_state = to;
        self.event_log.push_back(TransitionLog::new(from, to, forced));
        while self.event_log.len() > self.max_log_size {
            self.event_log.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
