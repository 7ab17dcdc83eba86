//! Error types for schema compilation and configuration.
//!
//! Every variant aborts a generation run: artifacts are only written once the
//! whole catalog has been parsed, classified and lowered.
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: cannot separate name and type in `{text}`")]
    Parse {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("{path}:{line}: variable `{name}` is declared without a type")]
    MissingType {
        path: PathBuf,
        line: usize,
        name: String,
    },

    #[error("{path}: no tree-name header (`name:`) found")]
    MissingTreeName { path: PathBuf },

    #[error("no schema files given")]
    NoFormats,

    #[error("format `{0}` is listed more than once")]
    DuplicateFormat(String),

    #[error("bad schema file pattern `{pattern}`: {message}")]
    Glob { pattern: String, message: String },

    #[error("variable `{variable}` in format `{format}` has unsupported type `{ty}`")]
    UnsupportedType {
        variable: String,
        format: String,
        ty: String,
    },

    #[error("`{0}` cannot be used as an accessor name")]
    InvalidName(String),

    #[error("accessor `{method}` would be generated for both `{first}` and `{second}`")]
    AccessorCollision {
        method: String,
        first: String,
        second: String,
    },

    /// Broken internal invariant; never caused by schema content alone.
    #[error("internal consistency error: {0}")]
    Consistency(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path} {message}")]
    Invalid { path: PathBuf, message: String },
}
