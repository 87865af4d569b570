//! Pure state transition function
//!
//! Given the current session state and an event, decides the next phase
//! and the effects the controller must carry out. No I/O happens here.

use super::state::{is_termination_command, SessionPhase, SessionState, TERMINATION_NOTICE};
use super::{Effect, Event};
use crate::executor::ExecutionError;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_phase: SessionPhase,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(phase: SessionPhase) -> Self {
        Self {
            new_phase: phase,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Input rejected before it reaches the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("You need to ask a question first")]
    EmptyInput,
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("A reply is still being generated, wait for it before sending another message")]
    Busy,
    #[error("The conversation has ended, reset the session to start again")]
    Terminated,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, SessionError> {
    match (&state.phase, event) {
        // ============================================================
        // Session start
        // ============================================================
        (SessionPhase::Idle | SessionPhase::AwaitingInput, Event::Start) => {
            Ok(TransitionResult::new(SessionPhase::AwaitingInput))
        }

        // ============================================================
        // User submissions
        // ============================================================
        (SessionPhase::Idle | SessionPhase::AwaitingInput, Event::Submit { text })
            if text.trim().is_empty() =>
        {
            Err(ValidationError::EmptyInput.into())
        }

        (SessionPhase::Idle | SessionPhase::AwaitingInput, Event::Submit { text })
            if is_termination_command(&text) =>
        {
            Ok(terminate())
        }

        (SessionPhase::Idle | SessionPhase::AwaitingInput, Event::Submit { text }) => {
            Ok(TransitionResult::new(SessionPhase::Processing {
                user_text: text.clone(),
            })
            .with_effect(Effect::RequestReply { user_text: text }))
        }

        (SessionPhase::Idle | SessionPhase::AwaitingInput, Event::Stop) => Ok(terminate()),

        // One request in flight per session
        (
            SessionPhase::Processing { .. },
            Event::Start | Event::Submit { .. } | Event::Stop | Event::Reset,
        ) => Err(SessionError::Busy),

        // ============================================================
        // Backend results
        // ============================================================
        (SessionPhase::Processing { user_text }, Event::ReplyReceived { text }) => {
            Ok(TransitionResult::new(SessionPhase::AwaitingInput)
                .with_effect(Effect::record_exchange(user_text.clone(), text)))
        }

        (SessionPhase::Processing { .. }, Event::ReplyFailed { error }) => {
            Ok(TransitionResult::new(SessionPhase::AwaitingInput)
                .with_effect(Effect::record_system(failure_notice(&error))))
        }

        // ============================================================
        // Termination and reset
        // ============================================================
        (SessionPhase::Terminated, Event::Start | Event::Submit { .. } | Event::Stop) => {
            Err(SessionError::Terminated)
        }

        (_, Event::Reset) => {
            Ok(TransitionResult::new(SessionPhase::Idle).with_effect(Effect::ClearLog))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (phase, event) => Err(SessionError::InvalidTransition(format!(
            "No transition from {phase:?} with event {event:?}"
        ))),
    }
}

fn terminate() -> TransitionResult {
    TransitionResult::new(SessionPhase::Terminated)
        .with_effect(Effect::record_system(TERMINATION_NOTICE))
}

/// System turn text recorded when a reply could not be produced
pub fn failure_notice(error: &ExecutionError) -> String {
    format!("Something went wrong: {error}")
}
