// src/pipeline/convert.rs

//! Conversion stage: bundle to universal APK set

use crate::bundletool::{ConversionTool, DiagnosticPolicy, ToolMode};
use crate::error::{Error, Result};
use crate::units::format_file_size;
use std::path::Path;
use tracing::info;

/// Convert `bundle` into an APK set at `output`, returning the archive size
///
/// The bundle must exist. The tool's report is judged by `policy`; the archive
/// on disk is then checked independently, since a missing or empty output
/// is a failure whatever the tool said. The bundle is left in place.
pub async fn convert_bundle(
    tool: &dyn ConversionTool,
    policy: DiagnosticPolicy,
    bundle: &Path,
    output: &Path,
) -> Result<u64> {
    if !tokio::fs::try_exists(bundle).await.unwrap_or(false) {
        return Err(Error::InputMissing(bundle.to_path_buf()));
    }

    let report = tool.build(bundle, output).await?;
    policy.check(ToolMode::Build, &report)?;

    let size = match tokio::fs::metadata(output).await {
        Ok(metadata) => metadata.len(),
        Err(_) => {
            return Err(Error::ConversionFailed(format!(
                "{} reported success but wrote no archive at {}",
                tool.name(),
                output.display()
            )));
        }
    };
    if size == 0 {
        return Err(Error::ConversionFailed(format!(
            "archive {} is empty",
            output.display()
        )));
    }

    info!("Converted {} ({})", bundle.display(), format_file_size(size));
    Ok(size)
}
