// src/commands/serve.rs
//! Server command

use anyhow::{Context, Result};
use apkrelay::RelayConfig;
use apkrelay::server::{ServerState, run_server};

pub async fn cmd_serve(mut config: RelayConfig, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
        config.validate()?;
    }

    let server_config = config.to_server_config()?;
    let pipeline = config
        .build_pipeline()
        .context("Failed to assemble the pipeline")?;

    let mut state = ServerState::new(server_config, pipeline);
    if let Some(local) = config.local_blob_store() {
        state = state.with_local_blobs(local);
    }

    run_server(state).await
}
