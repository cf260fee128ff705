//! Pure state machine for flow control
//!
//! No I/O and no async: the engine executes steps, reports each result as an
//! [`FlowEvent`], and performs the [`FlowAction`]s that come back.
//!
//! Key rules:
//! - Pure function: transition(state, event) -> (state, actions)
//! - Invalid transitions end the run as a Failure (never panic)
//! - Once an outcome is determined it is never revised
//! - Every terminal transition requests exactly one diagnostic capture

use flowcheck_core::{CaptureCause, LogLevel, Outcome, StepAction};

/// Flow state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Start,
    Navigated,
    Stabilized,
    ConsentHandled,
    /// Secondary contexts were closed; reachable from any pre-credential state
    PopupSuppressed,
    CredentialSurfaceReady,
    Submitted,
    /// A navigation or search interaction finished
    Interacted,
    OutcomeDetermined { outcome: Outcome, message: String },
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::OutcomeDetermined { .. })
    }
}

/// Step results reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    StepCompleted { action: StepAction },
    /// Primary path came up empty; the step's fallback carried it
    StepFellBack { action: StepAction, detail: String },
    /// Nothing to do (no consent banner, single context, auto-submitted)
    StepSkipped { action: StepAction, reason: String },
    /// A bounded wait the step depends on expired
    StepFailed { action: StepAction, reason: String },
    OutcomeReached { outcome: Outcome, message: String },
    /// Unexpected error anywhere in the run
    Fault { message: String },
}

/// Side effects for the engine to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    Log { level: LogLevel, message: String },
    Capture { cause: CaptureCause },
}

fn log(level: LogLevel, message: impl Into<String>) -> FlowAction {
    FlowAction::Log {
        level,
        message: message.into(),
    }
}

/// Diagnostic cause for a terminal outcome
pub fn capture_cause(outcome: &Outcome) -> CaptureCause {
    match outcome {
        Outcome::Success => CaptureCause::Success,
        Outcome::Failure { .. } => CaptureCause::Error,
        Outcome::Timeout | Outcome::Ambiguous => CaptureCause::Timeout,
    }
}

/// State reached when `action` finishes in `state`, if that is a legal move
fn advance(state: &FlowState, action: StepAction) -> Option<FlowState> {
    use FlowState::*;
    use StepAction::*;

    match (state, action) {
        (Start, Navigate) => Some(Navigated),
        (Navigated, Stabilize) => Some(Stabilized),
        (Stabilized, HandleConsent) => Some(ConsentHandled),
        (Stabilized | ConsentHandled | PopupSuppressed, SuppressPopups) => Some(PopupSuppressed),
        (ConsentHandled | PopupSuppressed, LocateCredentialSurface) => Some(CredentialSurfaceReady),
        (CredentialSurfaceReady, SubmitCredentials) => Some(Submitted),
        (ConsentHandled | PopupSuppressed, FollowMenuPath | SubmitSearch) => Some(Interacted),
        _ => None,
    }
}

fn terminal(outcome: Outcome, message: String, mut actions: Vec<FlowAction>) -> (FlowState, Vec<FlowAction>) {
    actions.push(FlowAction::Capture {
        cause: capture_cause(&outcome),
    });
    (FlowState::OutcomeDetermined { outcome, message }, actions)
}

fn invalid(state: &FlowState, event: &FlowEvent) -> (FlowState, Vec<FlowAction>) {
    let message = format!(
        "Invalid state transition: {:?} cannot handle event {:?}",
        state, event
    );
    terminal(
        Outcome::failure("invalid transition"),
        message.clone(),
        vec![log(LogLevel::Error, message)],
    )
}

/// Pure state transition function
///
/// Takes current state and event, returns new state and actions to execute.
/// This function is completely deterministic and has no side effects.
///
/// # Terminal state
/// Events arriving after the outcome is determined leave the state unchanged
/// and only produce a warning.
pub fn transition(state: FlowState, event: FlowEvent) -> (FlowState, Vec<FlowAction>) {
    match (state, event) {
        // Outcome is final
        (state @ FlowState::OutcomeDetermined { .. }, event) => (
            state,
            vec![log(
                LogLevel::Warn,
                format!("Outcome already determined; ignoring {:?}", event),
            )],
        ),

        (_, FlowEvent::Fault { message }) => {
            let message = format!("Test failed with exception: {}", message);
            terminal(
                Outcome::failure("exception"),
                message.clone(),
                vec![log(LogLevel::Error, message)],
            )
        }

        (_, FlowEvent::StepFailed { action, reason }) => terminal(
            Outcome::failure(reason.clone()),
            reason.clone(),
            vec![log(LogLevel::Error, format!("Step {} failed: {}", action, reason))],
        ),

        (
            FlowState::Submitted | FlowState::Interacted,
            FlowEvent::OutcomeReached { outcome, message },
        ) => {
            let level = if outcome.is_success() {
                LogLevel::Info
            } else {
                LogLevel::Warn
            };
            let line = format!("Outcome: {} ({})", outcome, message);
            terminal(outcome, message, vec![log(level, line)])
        }

        // Single context: nothing to suppress, state unchanged
        (state, FlowEvent::StepSkipped { action: StepAction::SuppressPopups, reason })
            if advance(&state, StepAction::SuppressPopups).is_some() =>
        {
            (
                state,
                vec![log(LogLevel::Info, format!("Step suppress_popups skipped: {}", reason))],
            )
        }

        (state, event @ FlowEvent::StepCompleted { .. })
        | (state, event @ FlowEvent::StepFellBack { .. })
        | (state, event @ FlowEvent::StepSkipped { .. }) => {
            let (action, line, level) = match &event {
                FlowEvent::StepCompleted { action } => {
                    (*action, format!("Step {} completed", action), LogLevel::Info)
                }
                FlowEvent::StepFellBack { action, detail } => (
                    *action,
                    format!("Step {} used fallback: {}", action, detail),
                    LogLevel::Warn,
                ),
                FlowEvent::StepSkipped { action, reason } => (
                    *action,
                    format!("Step {} skipped: {}", action, reason),
                    LogLevel::Info,
                ),
                _ => return invalid(&state, &event),
            };
            match advance(&state, action) {
                Some(next) => (next, vec![log(level, line)]),
                None => invalid(&state, &event),
            }
        }

        // All other invalid transitions
        (state, event) => invalid(&state, &event),
    }
}
