// src/units.rs
//! Human-readable sizes and durations
//!
//! Used by the configuration file ("500MB", "30s") and by log lines that
//! report artifact sizes.

use anyhow::{Context, Result};
use std::time::Duration;

const KIB: u64 = 1024;

/// Parse a human-readable size string (e.g., "500MB", "100KB", "1.5GB")
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("TB") {
        (n, KIB * KIB * KIB * KIB)
    } else if let Some(n) = s.strip_suffix("GB") {
        (n, KIB * KIB * KIB)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, KIB * KIB)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, KIB)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1u64)
    } else {
        // Assume bytes
        (s.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid size number: {}", num_str))?;

    if !num.is_finite() {
        anyhow::bail!("Size must be a finite number: {}", s);
    }
    if num < 0.0 {
        anyhow::bail!("Size cannot be negative: {}", s);
    }

    let bytes = num * multiplier as f64;
    if bytes >= u64::MAX as f64 {
        anyhow::bail!("Size is too large: {}", s);
    }
    Ok(bytes as u64)
}

/// Parse a human-readable duration string (e.g., "30s", "2m", "24h")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("ms") {
        return n
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("Invalid duration number: {}", n));
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 24 * 60 * 60)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Assume seconds
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration number: {}", num_str))?;

    let secs = num
        .checked_mul(multiplier)
        .with_context(|| format!("Duration is too large: {}", s))?;
    Ok(Duration::from_secs(secs))
}

/// Format a byte count with two decimals (e.g., "1.50 MB")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, UNITS[unit])
}
