// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve { bind } => commands::cmd_serve(config, bind).await,
        Commands::Convert { bundle, output } => {
            commands::cmd_convert(&config, &bundle, &output).await
        }
        Commands::Extract {
            archive,
            device_spec,
            output,
        } => commands::cmd_extract(&config, &archive, &device_spec, &output).await,
        Commands::Check => commands::cmd_check(&config).await,
        Commands::InitDb { db_path } => commands::cmd_init_db(&config, db_path),
    }
}
