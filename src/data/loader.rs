//! CSV acquisition: one blocking network read, or a local file.
//!
//! The source table is comma-delimited with no header row; the five column
//! names are attached after parsing. Any failure here aborts the run — there
//! is no retry path.

use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use super::{FEATURE_NAMES, TARGET_COLUMN};
use crate::error::{IrisError, Result};

/// Fetch the raw CSV body from a remote location.
pub fn fetch_remote(url: &str) -> Result<String> {
    info!(url, "fetching dataset");
    let response = ureq::get(url)
        .call()
        .map_err(|e| IrisError::DataError(format!("fetch failed: {}", e)))?;
    response
        .into_string()
        .map_err(|e| IrisError::DataError(format!("read failed: {}", e)))
}

/// Read the raw CSV body from a local file.
pub fn load_file(path: &Path) -> Result<String> {
    info!(path = %path.display(), "reading dataset");
    std::fs::read_to_string(path)
        .map_err(|e| IrisError::DataError(format!("{}: {}", path.display(), e)))
}

/// Parse a headerless five-column CSV body and attach the semantic names.
pub fn parse_csv(body: &str) -> Result<DataFrame> {
    let reader = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(Cursor::new(body.as_bytes()));

    let mut df = reader
        .finish()
        .map_err(|e| IrisError::DataError(e.to_string()))?;

    if df.width() != FEATURE_NAMES.len() + 1 {
        return Err(IrisError::DataError(format!(
            "expected {} columns, got {}",
            FEATURE_NAMES.len() + 1,
            df.width()
        )));
    }

    let names: Vec<&str> = FEATURE_NAMES
        .iter()
        .copied()
        .chain(std::iter::once(TARGET_COLUMN))
        .collect();
    df.set_column_names(&names)
        .map_err(|e| IrisError::DataError(e.to_string()))?;

    Ok(df)
}
