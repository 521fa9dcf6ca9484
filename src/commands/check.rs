// src/commands/check.rs
//! Startup check and session database initialization

use anyhow::{Context, Result};
use apkrelay::RelayConfig;
use apkrelay::session::SqliteSessionStore;
use std::path::PathBuf;
use tracing::info;

/// Assemble every component and run the pipeline's startup check
pub async fn cmd_check(config: &RelayConfig) -> Result<()> {
    let pipeline = config.build_pipeline()?;
    pipeline
        .startup_check()
        .await
        .context("Startup check failed")?;

    println!("bundletool: ok");
    println!("scratch: {}", pipeline.config().scratch_dir.display());
    println!("public links: {}", pipeline.config().public_base_url);
    Ok(())
}

/// Create or migrate the SQLite session database
pub fn cmd_init_db(config: &RelayConfig, db_path: Option<PathBuf>) -> Result<()> {
    let db_path = db_path.unwrap_or_else(|| config.sessions.db_path.clone());
    info!("Initializing session database at: {}", db_path.display());

    SqliteSessionStore::open(&db_path)
        .with_context(|| format!("Failed to initialize {}", db_path.display()))?;

    println!("Session database initialized successfully at: {}", db_path.display());
    Ok(())
}
