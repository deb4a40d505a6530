//! NotesAI HTTP API
//!
//! REST endpoints over [`PageService`] plus the writing assistant. Routes
//! are grouped per resource under [`routes`] and merged in
//! [`create_router`].
//!
//! # Usage
//!
//! ```bash
//! NOTESAI_PORT=4000 RUST_LOG=debug cargo run --bin notesai-server
//! ```
//!
//! CORS is fully permissive; the server is meant to run on the user's
//! machine next to the editor.

use anyhow::Context;
use axum::{http::Method, Router};
use notesai_core::{Orchestrator, PageService, Settings};
use notesai_llm_engine::{
    EngineConfig, EngineError, InferenceEngine, OpenAiEngine, DEFAULT_MODEL,
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
mod http_error;
pub mod routes;

pub use config::ServerConfig;
pub use http_error::HttpError;

/// Builds the inference engine the settings ask for
pub type EngineFactory =
    Arc<dyn Fn(&Settings) -> Result<Arc<dyn InferenceEngine>, EngineError> + Send + Sync>;

/// Engine talking to the LM Studio server named in the settings
pub fn lm_studio_factory() -> EngineFactory {
    Arc::new(|settings: &Settings| {
        let model = settings
            .lm_studio_model
            .clone()
            .or_else(|| settings.preferred_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let config = EngineConfig::for_server(settings.lm_studio_url.clone(), model);
        let engine: Arc<dyn InferenceEngine> = Arc::new(OpenAiEngine::new(config)?);
        Ok(engine)
    })
}

struct AssistantSlot {
    orchestrator: Orchestrator,
    /// False when the settings pick the in-browser engine without fallback
    enabled: bool,
}

/// Application state shared across all endpoints
///
/// The orchestrator is swapped when settings change; the swap keeps its
/// task slot and event channel, so running tasks and SSE clients are not
/// disturbed.
#[derive(Clone)]
pub struct AppState {
    pub pages: PageService,
    assistant: Arc<RwLock<AssistantSlot>>,
    engine_factory: EngineFactory,
}

impl AppState {
    /// Read the settings (writing defaults if needed) and build the engine
    pub async fn new(pages: PageService, engine_factory: EngineFactory) -> anyhow::Result<Self> {
        let settings = pages
            .get_settings()
            .await
            .context("Failed to read settings")?;
        let engine = engine_factory(&settings).context("Failed to build inference engine")?;

        Ok(Self {
            pages,
            assistant: Arc::new(RwLock::new(AssistantSlot {
                orchestrator: Orchestrator::new(engine),
                enabled: settings.server_engine().is_some(),
            })),
            engine_factory,
        })
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, AssistantSlot> {
        self.assistant
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, AssistantSlot> {
        self.assistant
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.read_slot().orchestrator.clone()
    }

    pub fn assistant_enabled(&self) -> bool {
        self.read_slot().enabled
    }

    /// Rebuild the engine after a settings change
    pub fn apply_settings(&self, settings: &Settings) -> Result<(), EngineError> {
        let engine = (self.engine_factory)(settings)?;
        let mut slot = self.write_slot();
        slot.orchestrator = slot.orchestrator.with_engine(engine);
        slot.enabled = settings.server_engine().is_some();
        tracing::info!(
            "Assistant engine rebuilt ({}, enabled: {})",
            settings.ai_engine,
            slot.enabled
        );
        Ok(())
    }
}

/// Create the main application router with all endpoint modules
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::routes())
        .merge(routes::pages::routes(state.clone()))
        .merge(routes::search::routes(state.clone()))
        .merge(routes::images::routes(state.clone()))
        .merge(routes::settings::routes(state.clone()))
        .merge(routes::assistant::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Any origin, the usual methods, any header; preflights end here
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

/// Bind and serve until the process stops
pub async fn start_server(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("NotesAI API listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
