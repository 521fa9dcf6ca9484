// src/selection.rs

//! Best-match package selection
//!
//! Picks one package out of an extraction output directory:
//!
//! 1. Walk the device's ABIs in the caller's order. The first ABI with a
//!    candidate wins; within one ABI the first candidate in listing order wins.
//! 2. Otherwise take the first universal package.
//! 3. Otherwise there is no match, which is a normal outcome for a device the
//!    bundle does not support.
//!
//! Name matching is case-insensitive; the `.apk` suffix test is exact.

use crate::error::Result;
use std::path::Path;

/// Extension of installable packages
pub const PACKAGE_EXTENSION: &str = ".apk";

/// Token identifying a universal package
pub const UNIVERSAL_TOKEN: &str = "universal";

fn is_package(name: &str) -> bool {
    name.ends_with(PACKAGE_EXTENSION)
}

fn contains_token(name: &str, token: &str) -> bool {
    name.to_lowercase().contains(&token.to_lowercase())
}

/// Select the best candidate for `abis`, or `None`
pub fn select_best_match<'a, S: AsRef<str>>(candidates: &'a [String], abis: &[S]) -> Option<&'a str> {
    for abi in abis {
        let abi = abi.as_ref();
        if let Some(found) = candidates
            .iter()
            .find(|name| contains_token(name, abi) && is_package(name))
        {
            return Some(found.as_str());
        }
    }

    candidates
        .iter()
        .find(|name| contains_token(name, UNIVERSAL_TOKEN) && is_package(name))
        .map(String::as_str)
}

/// List regular file names in `dir`, sorted by name
pub async fn list_candidates(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}
