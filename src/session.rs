//! Chat session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `transition` decides, `SessionController` carries out the effects.

mod controller;
mod effect;
pub mod event;
pub mod log;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use controller::SessionController;
pub use effect::Effect;
pub use event::Event;
pub use log::{Speaker, Turn};
pub use state::{SessionPhase, SessionState};
pub use transition::{transition, SessionError};
