//! Recompute the searchable text of every page and rebuild the search index
//!
//! Run once after importing pages written by older versions, whose
//! searchable text is missing or stale.
//!
//! `--indexable` stores the broader server-side text instead, which also
//! covers block types and string props.

use anyhow::Context;
use notesai_core::text::IndexMode;
use notesai_core::PageService;
use notesai_server::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mode = index_mode(std::env::args().skip(1))?;
    let config = ServerConfig::from_env()?;
    let pages = PageService::open(config.db_path.clone())
        .await
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;

    let updated = pages
        .backfill_searchable_text_with(mode)
        .await
        .context("Failed to reindex pages")?;
    tracing::info!("Reindexed {} pages", updated);
    Ok(())
}

fn index_mode(mut args: impl Iterator<Item = String>) -> anyhow::Result<IndexMode> {
    match args.next().as_deref() {
        None => Ok(IndexMode::Searchable),
        Some("--indexable") => Ok(IndexMode::Indexable),
        Some(other) => anyhow::bail!("Unknown argument '{}', expected --indexable", other),
    }
}
