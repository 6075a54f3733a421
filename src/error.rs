use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NnError>;

/// Every failure the training engine can report.
///
/// All errors are fatal to the call that produced them; there is nothing
/// transient to retry. Fix the model or the input shapes and call again.
#[derive(Debug, Error)]
pub enum NnError {
    /// Incompatible matrix or layer dimensions.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("index ({row}, {col}) is out of range for a {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Bad model construction or training argument.
    #[error("invalid model argument: {0}")]
    InvalidModelArgument(String),

    /// Operation called in the wrong lifecycle state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A required sample collection was empty.
    #[error("argument `{0}` must not be empty")]
    ArgumentNull(&'static str),

    /// Declared but unimplemented functionality.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
