use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Json {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("reader for format `{format}` is not active")]
    NotActive { format: String },

    /// The activation window was opened twice.
    #[error("reader for format `{format}` is already active")]
    AlreadyActive { format: String },

    #[error("no entry is loaded")]
    NoEntry,

    #[error("entry {row} out of range ({entries} entries)")]
    RowOutOfRange { row: u64, entries: u64 },

    #[error("branch `{0}` not found")]
    MissingBranch(String),

    #[error("branch `{branch}` has no value at entry {row}")]
    MissingValue { branch: String, row: u64 },

    #[error("branch `{branch}` holds {found}, expected {expected}")]
    TypeMismatch {
        branch: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("variable `{variable}` is not available in format `{format}`")]
    Unavailable { variable: String, format: String },
}
