// src/cli.rs
//! CLI definitions for apkrelay
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apkrelay")]
#[command(author, version)]
#[command(about = "Convert Android App Bundles and deliver per-device APKs", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults plus environment when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    #[cfg(feature = "server")]
    Serve {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Convert a bundle into a universal APK set
    Convert {
        /// Path to the .aab bundle
        bundle: PathBuf,

        /// Where to write the .apks archive
        output: PathBuf,
    },

    /// Extract the best APK for a device from an APK set
    Extract {
        /// Path to the .apks archive
        archive: PathBuf,

        /// JSON device spec (sdkVersion, supportedAbis, ...)
        #[arg(short, long)]
        device_spec: PathBuf,

        /// Where to copy the selected APK
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify bundletool, storage and session configuration
    Check,

    /// Create or migrate the SQLite session database
    InitDb {
        /// Database path (defaults to the configured one)
        #[arg(short, long)]
        db_path: Option<PathBuf>,
    },
}
