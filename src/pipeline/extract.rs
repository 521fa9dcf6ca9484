// src/pipeline/extract.rs

//! Extraction stage: archive + device spec to one selected package

use crate::bundletool::{ConversionTool, DiagnosticPolicy, ToolMode};
use crate::device::{DEVICE_SPEC_FILENAME, DeviceSpec};
use crate::error::{Error, Result};
use crate::scratch::{ScratchGuard, ScratchKind};
use crate::selection::{list_candidates, select_best_match};
use crate::units::format_file_size;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of one extraction
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Scratch directory holding the tool's output
    pub output_dir: PathBuf,
    /// Files the tool produced, sorted by name
    pub candidates: Vec<String>,
    /// File name of the selected package
    pub selected: String,
    /// Full path of the selected package
    pub path: PathBuf,
    /// Size of the selected package in bytes
    pub size: u64,
}

/// Extract the package for `spec` from `archive`
///
/// The spec is validated before any scratch path or process is spent. The
/// output directory is allocated through `guard`, so it is released with the
/// rest of the invocation's scratch.
pub async fn extract_for_device(
    tool: &dyn ConversionTool,
    policy: DiagnosticPolicy,
    guard: &mut ScratchGuard,
    archive: &Path,
    spec: &DeviceSpec,
    min_package_size: u64,
) -> Result<ExtractionResult> {
    spec.validate()?;
    if !tokio::fs::try_exists(archive).await.unwrap_or(false) {
        return Err(Error::InputMissing(archive.to_path_buf()));
    }

    let output_dir = guard.allocate(ScratchKind::OutputDir).await?;
    let spec_path = output_dir.join(DEVICE_SPEC_FILENAME);
    tokio::fs::write(&spec_path, spec.to_document()?).await?;

    let report = tool.extract(archive, &output_dir, &spec_path).await?;
    policy.check(ToolMode::Extract, &report)?;

    let candidates = list_candidates(&output_dir).await?;
    debug!("Extraction produced {:?}", candidates);

    let Some(selected) = select_best_match(&candidates, &spec.supported_abis) else {
        return Err(Error::NoMatchingPackage {
            abis: spec.supported_abis.clone(),
            candidates,
        });
    };
    let selected = selected.to_string();
    let path = output_dir.join(&selected);

    let size = tokio::fs::metadata(&path)
        .await
        .map_err(|e| Error::InvalidOutput {
            path: path.clone(),
            reason: format!("selected package is unreadable: {e}"),
        })?
        .len();

    if size < min_package_size {
        return Err(Error::InvalidOutput {
            path,
            reason: format!(
                "file is {}, expected at least {}",
                format_file_size(size),
                format_file_size(min_package_size)
            ),
        });
    }

    info!(
        "Selected {} ({}) for ABIs {:?}",
        selected,
        format_file_size(size),
        spec.supported_abis
    );

    Ok(ExtractionResult {
        output_dir,
        candidates,
        selected,
        path,
        size,
    })
}
