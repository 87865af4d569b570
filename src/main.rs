//! Persona Chat - single-turn prompted chat sessions
//!
//! Serves a set of fixed-persona assistants over HTTP. Each browser
//! session gets its own state machine and conversation log.

mod api;
mod config;
mod executor;
mod llm;
mod persona;
mod runtime;
mod session;

use api::{create_router, AppState};
use config::AppConfig;
use llm::ModelRegistry;
use persona::PersonaCatalog;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; keys may come from the real environment
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    // Configuration
    let config = AppConfig::from_env();

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No models configured. Set OLLAMA_MODELS or OPENAI_API_KEY.");
    }

    let personas = PersonaCatalog::builtin();
    tracing::info!(
        personas = ?personas.all().iter().map(|p| p.id()).collect::<Vec<_>>(),
        history_mode = ?config.runtime.history_mode,
        timeout_secs = ?config.runtime.timeout.map(|t| t.as_secs()),
        idle_ttl_secs = ?config.runtime.idle_ttl.map(|t| t.as_secs()),
        "Persona catalog loaded"
    );

    // Create application state
    let state = AppState::new(personas, llm_registry, config.runtime.clone());
    if state.sessions.spawn_reaper().is_none() {
        tracing::info!("Idle session eviction disabled");
    }

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = config.socket_addr();
    tracing::info!("Persona chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
