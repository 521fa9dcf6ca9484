// src/commands/local.rs
//! Run the conversion and extraction stages on local files

use anyhow::{Context, Result};
use apkrelay::pipeline::{convert_bundle, extract_for_device};
use apkrelay::scratch::ScratchSpace;
use apkrelay::{DeviceSpec, RelayConfig, format_file_size};
use std::path::Path;
use tracing::info;

/// Convert a bundle into an APK set
pub async fn cmd_convert(config: &RelayConfig, bundle: &Path, output: &Path) -> Result<()> {
    let tool = config.bundletool()?;
    let policy = config.pipeline_config()?.diagnostics;

    let size = convert_bundle(&tool, policy, bundle, output)
        .await
        .with_context(|| format!("Failed to convert {}", bundle.display()))?;

    println!("Wrote {} ({})", output.display(), format_file_size(size));
    Ok(())
}

/// Extract the package matching a device spec file
pub async fn cmd_extract(
    config: &RelayConfig,
    archive: &Path,
    device_spec: &Path,
    output: &Path,
) -> Result<()> {
    let tool = config.bundletool()?;
    let pipeline_config = config.pipeline_config()?;

    let document = std::fs::read_to_string(device_spec)
        .with_context(|| format!("Failed to read device spec {}", device_spec.display()))?;
    let value: serde_json::Value = serde_json::from_str(&document)
        .with_context(|| format!("Device spec {} is not JSON", device_spec.display()))?;
    let spec = DeviceSpec::from_value(&value)?;

    let scratch = ScratchSpace::new(&pipeline_config.scratch_dir);
    let mut guard = scratch.guard();

    let result = extract_for_device(
        &tool,
        pipeline_config.diagnostics,
        &mut guard,
        archive,
        &spec,
        pipeline_config.min_package_size,
    )
    .await;

    let copied = match &result {
        Ok(extraction) => {
            info!("Candidates: {:?}", extraction.candidates);
            tokio::fs::copy(&extraction.path, output).await.map(|_| ())
        }
        Err(_) => Ok(()),
    };
    guard.release().await;

    let extraction = result?;
    copied.with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Selected {} ({}) -> {}",
        extraction.selected,
        format_file_size(extraction.size),
        output.display()
    );
    Ok(())
}
