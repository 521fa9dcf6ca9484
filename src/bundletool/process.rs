// src/bundletool/process.rs

//! Process-backed bundletool
//!
//! Each call spawns a fresh process. stdout and stderr are drained
//! concurrently into buffers that share one byte ceiling; a process that
//! exceeds it is killed and the call fails.

use super::{BUILD_OUTPUT_LIMIT, ConversionTool, EXTRACT_OUTPUT_LIMIT, ToolMode, ToolOutput};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

/// Default bundletool release shipped next to the service
pub const DEFAULT_JAR: &str = "bundletool-all-1.18.1.jar";

/// How bundletool is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// `java -jar <jar> <args>`
    Jar { java: PathBuf, jar: PathBuf },
    /// A standalone launcher script or binary: `<command> <args>`
    Command(PathBuf),
}

impl Launcher {
    fn program(&self) -> &Path {
        match self {
            Self::Jar { java, .. } => java,
            Self::Command(command) => command,
        }
    }

    fn prefix_args(&self) -> Vec<OsString> {
        match self {
            Self::Jar { jar, .. } => vec!["-jar".into(), jar.clone().into_os_string()],
            Self::Command(_) => Vec::new(),
        }
    }
}

/// bundletool invoked as an external process
#[derive(Debug, Clone)]
pub struct Bundletool {
    launcher: Launcher,
    build_output_limit: usize,
    extract_output_limit: usize,
}

impl Bundletool {
    /// Run the jar with the given java binary
    pub fn jar(java: impl Into<PathBuf>, jar: impl Into<PathBuf>) -> Self {
        Self::new(Launcher::Jar {
            java: java.into(),
            jar: jar.into(),
        })
    }

    /// Run a standalone launcher
    pub fn command(command: impl Into<PathBuf>) -> Self {
        Self::new(Launcher::Command(command.into()))
    }

    pub fn new(launcher: Launcher) -> Self {
        Self {
            launcher,
            build_output_limit: BUILD_OUTPUT_LIMIT,
            extract_output_limit: EXTRACT_OUTPUT_LIMIT,
        }
    }

    /// Set custom output ceilings
    pub fn with_output_limits(mut self, build: usize, extract: usize) -> Self {
        self.build_output_limit = build;
        self.extract_output_limit = extract;
        self
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    fn build_args(bundle: &Path, output: &Path) -> Vec<OsString> {
        vec![
            ToolMode::Build.as_str().into(),
            flag("--bundle=", bundle),
            flag("--output=", output),
            "--mode=universal".into(),
            "--overwrite".into(),
        ]
    }

    fn extract_args(archive: &Path, output_dir: &Path, device_spec: &Path) -> Vec<OsString> {
        vec![
            ToolMode::Extract.as_str().into(),
            flag("--apks=", archive),
            flag("--output-dir=", output_dir),
            flag("--device-spec=", device_spec),
        ]
    }

    async fn run(&self, mode: ToolMode, args: Vec<OsString>, limit: usize) -> Result<ToolOutput> {
        let mut command = Command::new(self.launcher.program());
        command
            .args(self.launcher.prefix_args())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {:?}", command.as_std());

        let mut child = command.spawn().map_err(|e| Error::ToolFailed {
            mode,
            message: format!("failed to launch {}: {e}", self.launcher.program().display()),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::Internal("stdout not captured".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| Error::Internal("stderr not captured".into()))?;

        let budget = Arc::new(AtomicUsize::new(0));
        let captured = tokio::try_join!(
            read_bounded(stdout, budget.clone(), limit),
            read_bounded(stderr, budget.clone(), limit),
        );

        let (stdout, stderr) = match captured {
            Ok(streams) => streams,
            Err(e) => {
                // Buffer exceeded or the pipe failed: stop the process
                let _ = child.kill().await;
                return Err(Error::ToolFailed {
                    mode,
                    message: e.to_string(),
                });
            }
        };

        let status = child.wait().await?;
        Ok(ToolOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn flag(name: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(name);
    arg.push(path.as_os_str());
    arg
}

/// Drain `reader`, failing once the shared budget passes `limit`
async fn read_bounded<R: AsyncRead + Unpin>(
    mut reader: R,
    budget: Arc<AtomicUsize>,
    limit: usize,
) -> std::io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(captured);
        }
        let total = budget.fetch_add(n, Ordering::Relaxed) + n;
        if total > limit {
            return Err(std::io::Error::other(format!(
                "output exceeded {limit} bytes"
            )));
        }
        captured.extend_from_slice(&buf[..n]);
    }
}

#[async_trait]
impl ConversionTool for Bundletool {
    async fn build(&self, bundle: &Path, output: &Path) -> Result<ToolOutput> {
        info!("Converting bundle {} -> {}", bundle.display(), output.display());
        self.run(
            ToolMode::Build,
            Self::build_args(bundle, output),
            self.build_output_limit,
        )
        .await
    }

    async fn extract(
        &self,
        archive: &Path,
        output_dir: &Path,
        device_spec: &Path,
    ) -> Result<ToolOutput> {
        info!("Extracting {} into {}", archive.display(), output_dir.display());
        self.run(
            ToolMode::Extract,
            Self::extract_args(archive, output_dir, device_spec),
            self.extract_output_limit,
        )
        .await
    }

    async fn check(&self) -> Result<()> {
        let program = self.launcher.program();
        which::which(program)
            .map_err(|e| Error::ToolNotFound(format!("{}: {e}", program.display())))?;

        if let Launcher::Jar { jar, .. } = &self.launcher
            && !tokio::fs::try_exists(jar).await.unwrap_or(false)
        {
            return Err(Error::ToolNotFound(format!(
                "bundletool jar not found at {}",
                jar.display()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "bundletool"
    }
}
