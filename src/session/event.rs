//! Events that drive a session

use crate::executor::ExecutionError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Start,
    Submit { text: String },
    Stop,
    Reset,

    // Backend events
    ReplyReceived { text: String },
    ReplyFailed { error: ExecutionError },
}
