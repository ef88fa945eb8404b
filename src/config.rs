use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::FilterSpec;
use crate::error::PipelineError;

/// Default field separator of the student CSV exports.
pub const DEFAULT_DELIMITER: u8 = b';';

/// Ingestion settings and input size bounds.
///
/// The column bound also bounds the quadratic correlation-matrix work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub max_rows: usize,
    pub max_columns: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            max_rows: 1_000_000,
            max_columns: 256,
        }
    }
}

impl LoadOptions {
    pub(crate) fn check_rows(&self, rows: usize) -> std::result::Result<(), PipelineError> {
        if rows > self.max_rows {
            return Err(PipelineError::TooLarge {
                what: "row",
                actual: rows,
                limit: self.max_rows,
            });
        }
        Ok(())
    }

    pub(crate) fn check_columns(&self, columns: usize) -> std::result::Result<(), PipelineError> {
        if columns > self.max_columns {
            return Err(PipelineError::TooLarge {
                what: "column",
                actual: columns,
                limit: self.max_columns,
            });
        }
        Ok(())
    }
}

/// Read a filter spec from a JSON file.
pub fn load_filter_spec(path: &Path) -> Result<FilterSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading filter file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing filter file {}", path.display()))
}

/// Write a filter spec as pretty-printed JSON.
pub fn save_filter_spec(path: &Path, spec: &FilterSpec) -> Result<()> {
    let text = serde_json::to_string_pretty(spec).context("serialising filter spec")?;
    std::fs::write(path, text).with_context(|| format!("writing filter file {}", path.display()))
}
