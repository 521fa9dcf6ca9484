// src/commands/mod.rs
//! Command handlers for the apkrelay CLI

mod check;
mod local;
#[cfg(feature = "server")]
mod serve;

pub use check::{cmd_check, cmd_init_db};
pub use local::{cmd_convert, cmd_extract};
#[cfg(feature = "server")]
pub use serve::cmd_serve;

use anyhow::Result;
use apkrelay::RelayConfig;
use std::path::Path;
use tracing::info;

/// Load the configuration file, or defaults plus environment
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            RelayConfig::load(path)
        }
        None => RelayConfig::from_env(),
    }
}
