/// Errors raised by the filtering and statistics pipeline.
///
/// Ingestion and the binaries wrap these in `anyhow::Error`; library callers
/// can match on the variant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// The operation is undefined on a dataset without records.
    #[error("dataset has no records")]
    EmptyDataset,

    /// A required column is not part of the schema.
    #[error("column '{column}' not found in schema")]
    MissingColumn { column: String },

    /// A value (or a whole column) is not of the expected type.
    #[error("column '{column}'{}: expected {expected} value", row_suffix(.row))]
    InvalidType {
        column: String,
        row: Option<usize>,
        expected: &'static str,
    },

    /// A numeric range constraint is malformed (`min > max` or NaN bound).
    #[error("invalid range for column '{column}': [{min}, {max}]")]
    InvalidRange { column: String, min: f64, max: f64 },

    /// Records do not conform to the schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// Input exceeds the configured load limits.
    #[error("{what} count {actual} exceeds limit {limit}")]
    TooLarge {
        what: &'static str,
        actual: usize,
        limit: usize,
    },
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" row {r}"),
        None => String::new(),
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
