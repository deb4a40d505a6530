//! NotesAI API server
//!
//! Configuration comes from `NOTESAI_HOST`, `NOTESAI_PORT` and
//! `NOTESAI_DB_PATH`; log filtering from `RUST_LOG` (default `info`).

use anyhow::Context;
use notesai_core::PageService;
use notesai_server::{lm_studio_factory, start_server, AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("Opening database at {}", config.db_path.display());

    let pages = PageService::open(config.db_path.clone())
        .await
        .context("Failed to open database")?;
    let state = AppState::new(pages, lm_studio_factory()).await?;

    start_server(&config, state).await
}
