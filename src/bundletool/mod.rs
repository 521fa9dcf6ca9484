// src/bundletool/mod.rs

//! Conversion tool abstraction
//!
//! The pipeline talks to bundletool through the narrow [`ConversionTool`]
//! trait so that orchestration can be exercised against a fake returning
//! canned output. [`Bundletool`] is the process-backed implementation.
//!
//! Failure detection follows a [`DiagnosticPolicy`]: a non-zero exit status
//! always fails; unless the exit status is trusted, a diagnostic stream
//! containing [`ERROR_MARKER`] also fails. The artifacts themselves (archive
//! file, output directory listing) stay the authoritative success signal and
//! are checked by the pipeline stages.

mod process;

pub use process::{Bundletool, DEFAULT_JAR, Launcher};

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// Literal looked for in the diagnostic stream
pub const ERROR_MARKER: &str = "Error";

/// Default ceiling on captured output for `build-apks` (50 MiB)
pub const BUILD_OUTPUT_LIMIT: usize = 50 * 1024 * 1024;

/// Default ceiling on captured output for `extract-apks` (100 MiB)
pub const EXTRACT_OUTPUT_LIMIT: usize = 100 * 1024 * 1024;

/// Tool invocation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Build,
    Extract,
}

impl ToolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build-apks",
            Self::Extract => "extract-apks",
        }
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured result of one tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` if terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful exit with the given streams
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn exited_ok(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// How tool output is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticPolicy {
    /// Skip the diagnostic-marker scan on a clean exit
    pub trust_exit_status: bool,
}

impl DiagnosticPolicy {
    /// Fail if the invocation reported an error
    pub fn check(&self, mode: ToolMode, output: &ToolOutput) -> Result<()> {
        if !output.exited_ok() {
            let status = output
                .exit_code
                .map(|c| format!("exit code {c}"))
                .unwrap_or_else(|| "terminated by signal".to_string());
            return Err(Error::ToolFailed {
                mode,
                message: format!("{}: {}", status, output.stderr.trim()),
            });
        }

        if !self.trust_exit_status && output.stderr.contains(ERROR_MARKER) {
            return Err(Error::ToolFailed {
                mode,
                message: output.stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Black-box bundle conversion tool
#[async_trait]
pub trait ConversionTool: Send + Sync {
    /// Convert `bundle` into a universal APK set at `output` (overwriting)
    async fn build(&self, bundle: &Path, output: &Path) -> Result<ToolOutput>;

    /// Extract device packages from `archive` into `output_dir`
    async fn extract(
        &self,
        archive: &Path,
        output_dir: &Path,
        device_spec: &Path,
    ) -> Result<ToolOutput>;

    /// Verify the tool can be launched
    async fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Name for logging
    fn name(&self) -> &str;
}
