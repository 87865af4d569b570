//! HTTP API for the persona chat server

mod assets;
mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::llm::ModelRegistry;
use crate::persona::PersonaCatalog;
use crate::runtime::{RuntimeSettings, SessionManager};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(
        personas: PersonaCatalog,
        llm_registry: Arc<ModelRegistry>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(
                Arc::new(personas),
                llm_registry.clone(),
                settings,
            )),
            llm_registry,
        }
    }
}
