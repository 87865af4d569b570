//! Runtime for hosting chat sessions
//!
//! Owns one `SessionController` per active user session. Sessions share no
//! state; each one sits behind its own async mutex and publishes its state
//! through a watch channel, so reads never wait for an in-flight turn.

use crate::executor::{ChatTurnExecutor, HistoryMode};
use crate::llm::ModelRegistry;
use crate::persona::{PersonaCatalog, PersonaDefinition};
use crate::session::{SessionController, SessionError, SessionPhase, SessionState, Turn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Sessions untouched for this long are dropped
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Settings applied to every session the runtime creates
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub timeout: Option<Duration>,
    pub history_mode: HistoryMode,
    pub max_tokens: Option<u32>,
    /// `None` keeps sessions until they are explicitly ended
    pub idle_ttl: Option<Duration>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            timeout: Some(crate::executor::DEFAULT_TIMEOUT),
            history_mode: HistoryMode::LatestOnly,
            max_tokens: None,
            idle_ttl: Some(DEFAULT_IDLE_TTL),
        }
    }
}

/// Errors surfaced by the session host
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unknown persona: {0}")]
    UnknownPersona(String),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

/// What the display layer needs to render a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub persona: String,
    pub model: String,
    pub phase: SessionPhase,
    pub accepts_input: bool,
    pub terminated: bool,
    pub pending_input: String,
    pub turns: Vec<Turn>,
}

struct SessionEntry {
    id: String,
    persona: String,
    model: String,
    controller: Arc<Mutex<SessionController>>,
    state: watch::Receiver<SessionState>,
    last_active: std::sync::Mutex<Instant>,
}

impl SessionEntry {
    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn last_active(&self) -> Instant {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_busy(&self) -> bool {
        self.controller.try_lock().is_err()
    }

    /// Latest published state; never blocks on the controller
    fn view(&self) -> SessionView {
        let state = self.state.borrow();
        SessionView {
            id: self.id.clone(),
            persona: self.persona.clone(),
            model: self.model.clone(),
            phase: state.phase.clone(),
            accepts_input: state.phase.accepts_input(),
            terminated: state.is_terminated(),
            pending_input: state.pending_input.clone(),
            turns: state.log.snapshot(),
        }
    }
}

/// Manager for all live sessions
pub struct SessionManager {
    personas: Arc<PersonaCatalog>,
    llm_registry: Arc<ModelRegistry>,
    settings: RuntimeSettings,
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl SessionManager {
    pub fn new(
        personas: Arc<PersonaCatalog>,
        llm_registry: Arc<ModelRegistry>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            personas,
            llm_registry,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn personas(&self) -> &PersonaCatalog {
        &self.personas
    }

    /// Create and start a session for `persona_id`, optionally on a specific model
    pub async fn create(
        &self,
        persona_id: &str,
        model: Option<&str>,
    ) -> Result<SessionView, RuntimeError> {
        let persona: PersonaDefinition = self
            .personas
            .get(persona_id)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownPersona(persona_id.to_string()))?;

        let model_id = model.unwrap_or_else(|| self.llm_registry.default_model_id());
        let llm = self
            .llm_registry
            .get(model_id)
            .ok_or_else(|| RuntimeError::UnknownModel(model_id.to_string()))?;

        let executor = ChatTurnExecutor::new(llm)
            .with_timeout(self.settings.timeout)
            .with_history_mode(self.settings.history_mode)
            .with_max_tokens(self.settings.max_tokens);

        let (tx, rx) = watch::channel(SessionState::new());
        let id = uuid::Uuid::new_v4().to_string();
        let mut controller = SessionController::new(&id, Arc::new(persona), Arc::new(executor))
            .with_observer(tx);
        controller.start().await?;

        let entry = Arc::new(SessionEntry {
            id: controller.session_id().to_string(),
            persona: controller.persona().id().to_string(),
            model: model_id.to_string(),
            controller: Arc::new(Mutex::new(controller)),
            state: rx,
            last_active: std::sync::Mutex::new(Instant::now()),
        });
        let view = entry.view();
        self.sessions.write().await.insert(id.clone(), entry);

        tracing::info!(session_id = %id, persona = %persona_id, model = %model_id, "Session created");
        Ok(view)
    }

    /// Current view of a session, `Processing` included while a turn is in flight
    pub async fn get(&self, id: &str) -> Result<SessionView, RuntimeError> {
        let entry = self.entry(id).await?;
        entry.touch();
        Ok(entry.view())
    }

    /// Submit user text. Rejected as busy if a turn is already in flight.
    pub async fn submit(&self, id: &str, text: String) -> Result<SessionView, RuntimeError> {
        let (entry, guard) = self.try_acquire(id).await?;

        // Run on its own task so a dropped request cannot strand the
        // session in Processing
        let handle = tokio::spawn(async move {
            let mut guard = guard;
            guard.submit(&text).await
        });

        let result = handle
            .await
            .map_err(|e| RuntimeError::TaskFailed(e.to_string()))?;
        entry.touch();
        result?;
        Ok(entry.view())
    }

    pub async fn stop(&self, id: &str) -> Result<SessionView, RuntimeError> {
        let (entry, mut guard) = self.try_acquire(id).await?;
        guard.stop().await?;
        Ok(entry.view())
    }

    pub async fn reset(&self, id: &str) -> Result<SessionView, RuntimeError> {
        let (entry, mut guard) = self.try_acquire(id).await?;
        guard.reset().await?;
        guard.start().await?;
        Ok(entry.view())
    }

    /// Drop a session and everything it recorded
    pub async fn end(&self, id: &str) -> Result<(), RuntimeError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| tracing::info!(session_id = %id, "Session ended"))
            .ok_or_else(|| RuntimeError::SessionNotFound(id.to_string()))
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for at least `ttl`; returns how many went
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        self.evict_idle_at(Instant::now(), ttl).await
    }

    async fn evict_idle_at(&self, now: Instant, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        // A turn in flight counts as activity
        sessions.retain(|id, entry| {
            let idle = now.saturating_duration_since(entry.last_active());
            let keep = idle < ttl || entry.is_busy();
            if !keep {
                tracing::debug!(session_id = %id, idle_secs = idle.as_secs(), "Evicting idle session");
            }
            keep
        });

        before - sessions.len()
    }

    /// Periodically evict idle sessions. Returns `None` when no idle TTL is
    /// configured. The task stops once the manager is dropped.
    pub fn spawn_reaper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let ttl = self.settings.idle_ttl?;
        let period = (ttl / 4).min(Duration::from_secs(60));
        let manager = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let evicted = manager.evict_idle(ttl).await;
                if evicted > 0 {
                    let remaining = manager.session_count().await;
                    tracing::info!(
                        evicted,
                        remaining,
                        "Idle sessions evicted"
                    );
                }
            }
        }))
    }

    async fn entry(&self, id: &str) -> Result<Arc<SessionEntry>, RuntimeError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::SessionNotFound(id.to_string()))
    }

    async fn try_acquire(
        &self,
        id: &str,
    ) -> Result<(Arc<SessionEntry>, OwnedMutexGuard<SessionController>), RuntimeError> {
        let entry = self.entry(id).await?;
        let guard = entry
            .controller
            .clone()
            .try_lock_owned()
            .map_err(|_| RuntimeError::Session(SessionError::Busy))?;
        entry.touch();
        Ok((entry, guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockLlmService;
    use crate::session::Speaker;

    fn manager_with(mock: Arc<MockLlmService>) -> SessionManager {
        SessionManager::new(
            Arc::new(PersonaCatalog::builtin()),
            Arc::new(ModelRegistry::with_service(mock)),
            RuntimeSettings::default(),
        )
    }

    #[tokio::test]
    async fn create_starts_session_awaiting_input() {
        let manager = manager_with(Arc::new(MockLlmService::new("mock")));
        let view = manager.create("doctor", None).await.unwrap();

        assert_eq!(view.persona, "doctor");
        assert_eq!(view.model, "mock");
        assert_eq!(view.phase, SessionPhase::AwaitingInput);
        assert!(view.accepts_input);
        assert!(view.turns.is_empty());
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn create_rejects_unknown_persona_and_model() {
        let manager = manager_with(Arc::new(MockLlmService::new("mock")));
        assert!(matches!(
            manager.create("pirate", None).await,
            Err(RuntimeError::UnknownPersona(_))
        ));
        assert!(matches!(
            manager.create("doctor", Some("gpt-9")).await,
            Err(RuntimeError::UnknownModel(_))
        ));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_text("Wahoo!");
        let manager = manager_with(mock);

        let a = manager.create("mario", None).await.unwrap();
        let b = manager.create("mario", None).await.unwrap();
        manager.submit(&a.id, "Hi Mario".to_string()).await.unwrap();

        assert_eq!(manager.get(&a.id).await.unwrap().turns.len(), 2);
        assert!(manager.get(&b.id).await.unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected_as_busy() {
        let mock = Arc::new(
            MockLlmService::new("mock").with_delay(Duration::from_millis(200)),
        );
        mock.queue_text("first reply");
        let manager = Arc::new(manager_with(mock.clone()));
        let session = manager.create("cybersec", None).await.unwrap();

        let first = {
            let manager = manager.clone();
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "first".to_string()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = manager.submit(&session.id, "second".to_string()).await;
        assert!(matches!(
            second,
            Err(RuntimeError::Session(SessionError::Busy))
        ));

        let view = first.await.unwrap().unwrap();
        assert_eq!(view.turns.len(), 2);
        assert_eq!(view.turns[0].text, "first");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn get_reports_processing_without_waiting_for_reply() {
        let mock = Arc::new(
            MockLlmService::new("mock").with_delay(Duration::from_millis(1500)),
        );
        mock.queue_text("Take it one day at a time.");
        let manager = Arc::new(manager_with(mock));
        let session = manager.create("psychiatrist", None).await.unwrap();

        let turn = {
            let manager = manager.clone();
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "I feel stressed".to_string()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let view = manager.get(&session.id).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(
            view.phase,
            SessionPhase::Processing {
                user_text: "I feel stressed".to_string()
            }
        );
        assert!(!view.accepts_input);
        assert_eq!(view.pending_input, "I feel stressed");
        assert!(view.turns.is_empty());

        let view = turn.await.unwrap().unwrap();
        assert_eq!(view.phase, SessionPhase::AwaitingInput);
        assert_eq!(view.turns.len(), 2);
    }

    #[tokio::test]
    async fn stop_reset_and_end() {
        let manager = manager_with(Arc::new(MockLlmService::new("mock")));
        let session = manager.create("psychiatrist", None).await.unwrap();

        let view = manager.stop(&session.id).await.unwrap();
        assert!(view.terminated);
        assert_eq!(view.turns[0].speaker, Speaker::System);

        let view = manager.reset(&session.id).await.unwrap();
        assert_eq!(view.phase, SessionPhase::AwaitingInput);
        assert!(view.turns.is_empty());

        manager.end(&session.id).await.unwrap();
        assert!(matches!(
            manager.get(&session.id).await,
            Err(RuntimeError::SessionNotFound(_))
        ));
        assert!(manager.end(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_after_ttl() {
        let manager = manager_with(Arc::new(MockLlmService::new("mock")));
        let ttl = Duration::from_secs(60);
        for _ in 0..3 {
            manager.create("mario", None).await.unwrap();
        }

        assert_eq!(manager.evict_idle_at(Instant::now(), ttl).await, 0);
        assert_eq!(manager.session_count().await, 3);

        let later = Instant::now() + ttl + Duration::from_secs(1);
        assert_eq!(manager.evict_idle_at(later, ttl).await, 3);
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn in_flight_session_survives_eviction() {
        let mock = Arc::new(
            MockLlmService::new("mock").with_delay(Duration::from_millis(300)),
        );
        mock.queue_text("Here we go!");
        let manager = Arc::new(manager_with(mock));
        let busy = manager.create("mario", None).await.unwrap();
        manager.create("doctor", None).await.unwrap();

        let turn = {
            let manager = manager.clone();
            let id = busy.id.clone();
            tokio::spawn(async move { manager.submit(&id, "Let's-a go".to_string()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(manager.evict_idle_at(later, Duration::from_secs(60)).await, 1);
        assert!(manager.get(&busy.id).await.is_ok());

        turn.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reaper_sweeps_abandoned_sessions() {
        let settings = RuntimeSettings {
            idle_ttl: Some(Duration::from_millis(100)),
            ..RuntimeSettings::default()
        };
        let manager = Arc::new(SessionManager::new(
            Arc::new(PersonaCatalog::builtin()),
            Arc::new(ModelRegistry::with_service(Arc::new(MockLlmService::new(
                "mock",
            )))),
            settings,
        ));
        manager.create("cybersec", None).await.unwrap();
        manager.create("cybersec", None).await.unwrap();

        let reaper = manager.spawn_reaper().unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(manager.session_count().await, 0);
        reaper.abort();
    }

    #[tokio::test]
    async fn no_reaper_without_ttl() {
        let settings = RuntimeSettings {
            idle_ttl: None,
            ..RuntimeSettings::default()
        };
        let manager = Arc::new(SessionManager::new(
            Arc::new(PersonaCatalog::builtin()),
            Arc::new(ModelRegistry::with_service(Arc::new(MockLlmService::new(
                "mock",
            )))),
            settings,
        ));
        assert!(manager.spawn_reaper().is_none());
    }
}
