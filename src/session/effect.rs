//! Effects produced by state transitions

use super::log::Turn;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append turns to the log as one unit
    RecordTurns(Vec<Turn>),

    /// Drop every recorded turn
    ClearLog,

    /// Ask the backend for a reply to this text
    RequestReply { user_text: String },
}

impl Effect {
    pub fn record_exchange(user_text: impl Into<String>, reply: impl Into<String>) -> Self {
        Effect::RecordTurns(vec![Turn::user(user_text), Turn::assistant(reply)])
    }

    pub fn record_system(text: impl Into<String>) -> Self {
        Effect::RecordTurns(vec![Turn::system(text)])
    }
}
