// src/config.rs

//! Configuration loading utilities.
//!
//! Convenience functions for loading the keyword and filter term lists that
//! drive the collectors. Term files are newline-delimited, one term per line.

use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};

/// Load a newline-delimited term list (keywords or stream filters).
///
/// Blank lines and `#` comment lines are skipped.
pub fn load_terms(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Failed to read term list {}: {e}", path.display()))
    })?;

    let terms: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();

    if terms.is_empty() {
        return Err(AppError::config(format!(
            "Term list {} is empty",
            path.display()
        )));
    }

    log::info!("Loaded {} terms from {}", terms.len(), path.display());
    Ok(terms)
}
