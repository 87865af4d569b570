//! Chat turn execution
//!
//! Turns a persona, the conversation so far and the new user text into one
//! backend call. Every failure comes back as an [`ExecutionError`].

use crate::llm::{LlmError, LlmErrorKind, LlmMessage, LlmRequest, LlmService, SystemContent};
use crate::persona::PersonaDefinition;
use crate::session::{Speaker, Turn};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default bound on a single backend call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Failure to produce a reply for one turn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("The model backend is unavailable: {0}")]
    BackendUnavailable(String),
    #[error("The model backend timed out: {0}")]
    Timeout(String),
    #[error("The model backend returned a response that could not be read: {0}")]
    MalformedResponse(String),
}

impl From<LlmError> for ExecutionError {
    fn from(e: LlmError) -> Self {
        match e.kind {
            LlmErrorKind::Timeout => ExecutionError::Timeout(e.message),
            LlmErrorKind::MalformedResponse => ExecutionError::MalformedResponse(e.message),
            LlmErrorKind::Network
            | LlmErrorKind::RateLimit
            | LlmErrorKind::ServerError
            | LlmErrorKind::Auth
            | LlmErrorKind::InvalidRequest
            | LlmErrorKind::Unknown => ExecutionError::BackendUnavailable(e.message),
        }
    }
}

/// Whether earlier turns are sent along with the new user text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// Only the latest user text; each call is stateless
    #[default]
    LatestOnly,
    /// Every recorded (User, Assistant) exchange precedes the new text
    Replay,
}

impl FromStr for HistoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" | "latest_only" | "none" => Ok(HistoryMode::LatestOnly),
            "replay" | "full" => Ok(HistoryMode::Replay),
            other => Err(format!("invalid history mode: '{other}'")),
        }
    }
}

/// Wrap user text the way every persona prompt expects it
pub fn format_query(user_text: &str) -> String {
    format!("Query: {user_text}")
}

/// Formats requests for a persona and calls the model backend
pub struct ChatTurnExecutor {
    llm: Arc<dyn LlmService>,
    timeout: Option<Duration>,
    history_mode: HistoryMode,
    max_tokens: Option<u32>,
}

impl ChatTurnExecutor {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            timeout: Some(DEFAULT_TIMEOUT),
            history_mode: HistoryMode::default(),
            max_tokens: None,
        }
    }

    /// `None` waits for the backend indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_mode(mut self, mode: HistoryMode) -> Self {
        self.history_mode = mode;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Build the backend request for one turn
    pub fn build_request(
        &self,
        persona: &PersonaDefinition,
        history: &[Turn],
        user_text: &str,
    ) -> LlmRequest {
        let mut messages = Vec::new();

        if self.history_mode == HistoryMode::Replay {
            // System turns are UI notices, never model context
            for turn in history {
                match turn.speaker {
                    Speaker::User => messages.push(LlmMessage::user(format_query(&turn.text))),
                    Speaker::Assistant => messages.push(LlmMessage::assistant(turn.text.clone())),
                    Speaker::System => {}
                }
            }
        }

        messages.push(LlmMessage::user(format_query(user_text)));

        LlmRequest {
            system: vec![SystemContent::new(persona.system_instruction())],
            messages,
            max_tokens: self.max_tokens,
        }
    }

    /// Run one turn against the backend
    pub async fn execute(
        &self,
        persona: &PersonaDefinition,
        history: &[Turn],
        user_text: &str,
    ) -> Result<String, ExecutionError> {
        debug_assert!(
            !user_text.trim().is_empty(),
            "empty input must be rejected before execution"
        );

        let request = self.build_request(persona, history, user_text);
        let call = self.llm.complete(&request);

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                ExecutionError::Timeout(format!("no reply after {limit:?}"))
            })?,
            None => call.await,
        }?;

        Ok(response.text)
    }
}
