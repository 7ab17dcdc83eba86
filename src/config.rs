//! Generator options: an optional JSON file, overridden by CLI flags.
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::catalog::Policy;
use crate::codegen::{CodegenOptions, DEFAULT_RUNTIME_PATH};
use crate::error::ConfigError;

pub const DEFAULT_SCHEMA_DIR: &str = "txt/variables";
pub const DEFAULT_OUT_DIR: &str = "src/babies";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenOptions {
    pub schema_dir: PathBuf,
    pub out_dir: PathBuf,
    pub runtime_path: String,
    pub implement_common_in_base: bool,
    pub single_file: bool,
    /// Format names (or glob patterns) relative to `schema_dir`.
    pub formats: Vec<String>,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from(DEFAULT_SCHEMA_DIR),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            implement_common_in_base: false,
            single_file: false,
            formats: Vec::new(),
        }
    }
}

impl GenOptions {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        from_str_with_path(&source).map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Defaults when `path` is `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn policy(&self) -> Policy {
        Policy { implement_common_in_base: self.implement_common_in_base }
    }

    pub fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions { runtime_path: self.runtime_path.clone(), single_file: self.single_file }
    }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}
