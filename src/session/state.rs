//! Session state types

use super::log::ConversationLog;
use serde::{Deserialize, Serialize};

/// Input that ends the conversation, compared case-insensitively
pub const TERMINATION_KEYWORD: &str = "stop";

/// System turn recorded when the conversation ends
pub const TERMINATION_NOTICE: &str = "The conversation has ended.";

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Fresh session, empty log
    #[default]
    Idle,

    /// Ready for user input, no request in flight
    AwaitingInput,

    /// Backend call in flight for this user text
    Processing { user_text: String },

    /// Conversation ended; only a reset leaves this state
    Terminated,
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingInput => "awaiting_input",
            SessionPhase::Processing { .. } => "processing",
            SessionPhase::Terminated => "terminated",
        }
    }

    /// Whether a submission can be accepted right now
    pub fn accepts_input(&self) -> bool {
        matches!(self, SessionPhase::Idle | SessionPhase::AwaitingInput)
    }
}

/// Everything one session owns
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub log: ConversationLog,
    /// Text of the submission currently being processed
    pub pending_input: String,
    pub phase: SessionPhase,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == SessionPhase::Terminated
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.phase, SessionPhase::Processing { .. })
    }
}

/// True when `text` asks to end the conversation
pub fn is_termination_command(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(TERMINATION_KEYWORD)
}
