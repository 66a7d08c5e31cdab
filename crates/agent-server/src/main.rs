//! Agent HTTP Server
//!
//! Axum-based server exposing the decide/act loop over REST and
//! server-sent events.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{
    CheckpointStore, FileCheckpointStore, LlmProvider, LoopController, MemoryCheckpointStore,
    PromptedReasoner,
};
use agent_runtime::OllamaProvider;

use crate::config::ServerConfig;
use crate::handlers::{chat_handler, chat_stream_handler, health_check, list_models};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(handlers::SESSION_HEADER)]);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Agent API
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", get(chat_stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Initialize LLM provider
    let provider = Arc::new(OllamaProvider::from_config(config.ollama.clone())?);

    // Verify Ollama connection
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama at {}", config.ollama.base_url());
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - turns will fail until it is");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    // Initialize tools
    let tools = agent_tools::default_registry()?;
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    // Session checkpoints
    let store: Arc<dyn CheckpointStore> = match &config.checkpoint_dir {
        Some(dir) => {
            tracing::info!("Checkpoints stored in {}", dir.display());
            Arc::new(FileCheckpointStore::new(dir))
        }
        None => {
            tracing::warn!("CHECKPOINT_DIR not set - sessions are kept in memory only");
            Arc::new(MemoryCheckpointStore::new())
        }
    };

    let mut engine = PromptedReasoner::new(provider.clone(), provider.default_options());
    if let Some(prompt) = &config.system_prompt {
        tracing::info!("Using custom system prompt from AGENT_SYSTEM_PROMPT");
        engine = engine.with_system_prompt(prompt.clone());
    }
    let controller = LoopController::builder()
        .engine(Arc::new(engine))
        .tools(Arc::new(tools))
        .store(store)
        .config(config.agent.clone())
        .build()?;

    let state = AppState {
        controller: Arc::new(controller),
        provider,
    };

    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 agent server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/models      - List available models");
    tracing::info!("  POST /api/chat        - Run one turn");
    tracing::info!("  GET  /api/chat/stream - Run one turn as server-sent events");
    tracing::info!(
        "  max_iterations={} decide_timeout={:?} tool_timeout={:?}",
        config.agent.max_iterations,
        config.agent.decide_timeout,
        config.agent.tool_timeout
    );

    axum::serve(listener, app).await?;

    Ok(())
}
