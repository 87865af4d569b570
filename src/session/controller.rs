//! Session controller: runs the state machine and carries out its effects

use super::{transition, Effect, Event, SessionError, SessionPhase, SessionState};
use crate::executor::ChatTurnExecutor;
use crate::persona::PersonaDefinition;
use std::sync::Arc;
use tokio::sync::watch;

/// Drives one session for one persona
pub struct SessionController {
    session_id: String,
    persona: Arc<PersonaDefinition>,
    executor: Arc<ChatTurnExecutor>,
    state: SessionState,
    observer: Option<watch::Sender<SessionState>>,
}

impl SessionController {
    pub fn new(
        session_id: impl Into<String>,
        persona: Arc<PersonaDefinition>,
        executor: Arc<ChatTurnExecutor>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            persona,
            executor,
            state: SessionState::new(),
            observer: None,
        }
    }

    /// Publish every state change to `observer`, including entry into
    /// `Processing` before the backend call starts
    pub fn with_observer(mut self, observer: watch::Sender<SessionState>) -> Self {
        observer.send_replace(self.state.clone());
        self.observer = Some(observer);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn persona(&self) -> &PersonaDefinition {
        &self.persona
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.process_event(Event::Start).await
    }

    /// Submit user text; returns once the turn is fully recorded
    pub async fn submit(&mut self, text: &str) -> Result<(), SessionError> {
        self.process_event(Event::Submit {
            text: text.to_string(),
        })
        .await
    }

    /// End the conversation, same as submitting the termination keyword
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        self.process_event(Event::Stop).await
    }

    /// Back to `Idle` with an empty log
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.process_event(Event::Reset).await
    }

    async fn process_event(&mut self, event: Event) -> Result<(), SessionError> {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.state, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(
                        session_id = %self.session_id,
                        phase = self.state.phase.name(),
                        error = %e,
                        "Event rejected"
                    );
                    return Err(e);
                }
            };

            let old_phase = std::mem::replace(&mut self.state.phase, result.new_phase);
            self.state.pending_input = match &self.state.phase {
                SessionPhase::Processing { user_text } => user_text.clone(),
                _ => String::new(),
            };

            tracing::debug!(
                session_id = %self.session_id,
                from = old_phase.name(),
                to = self.state.phase.name(),
                "Session transition"
            );

            for effect in result.effects {
                if matches!(effect, Effect::RequestReply { .. }) {
                    self.publish();
                }
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
            self.publish();
        }

        Ok(())
    }

    fn publish(&self) {
        if let Some(observer) = &self.observer {
            observer.send_replace(self.state.clone());
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::RecordTurns(turns) => {
                self.state.log.append_all(turns);
                None
            }
            Effect::ClearLog => {
                self.state.log.clear();
                None
            }
            Effect::RequestReply { user_text } => {
                tracing::info!(
                    session_id = %self.session_id,
                    persona = %self.persona.id(),
                    model = %self.executor.model_id(),
                    "Requesting reply"
                );
                let reply = self
                    .executor
                    .execute(&self.persona, self.state.log.turns(), &user_text)
                    .await;
                Some(match reply {
                    Ok(text) => Event::ReplyReceived { text },
                    Err(error) => {
                        tracing::warn!(
                            session_id = %self.session_id,
                            error = %error,
                            "Reply failed"
                        );
                        Event::ReplyFailed { error }
                    }
                })
            }
        }
    }
}
