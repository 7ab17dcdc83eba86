//! Accessor generator for flat ntuple formats.
//!
//! Schema files (`name: type` lines under a tree-name header) are parsed into
//! a [`catalog::Catalog`], classified, lowered to an [`ir::Plan`] and emitted
//! as Rust source that reads rows through [`runtime`].
use std::path::{Path, PathBuf};

pub mod catalog;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod ir;
pub mod lower;
pub mod runtime;
pub mod schema;
pub mod types;

pub use catalog::{Catalog, Classification, Policy};
pub use codegen::{CodegenOptions, GeneratedFile};
pub use error::{Result, SchemaError};

/// Parse `paths`, classify and emit. Nothing is returned unless every step
/// succeeds.
pub fn generate<P: AsRef<Path> + Sync>(
    paths: &[P],
    policy: &Policy,
    options: CodegenOptions,
) -> Result<Vec<GeneratedFile>> {
    let catalog = schema::parse_schema_files(paths)?;
    generate_from_catalog(&catalog, policy, options)
}

pub fn generate_from_catalog(
    catalog: &Catalog,
    policy: &Policy,
    options: CodegenOptions,
) -> Result<Vec<GeneratedFile>> {
    let plan = lower::lower(catalog, policy)?;
    let mut cg = codegen::Codegen::new(options);
    cg.emit(&plan);
    Ok(cg.into_files())
}

/// Write `files` under `out_dir`, creating directories as needed.
pub fn write_files(files: &[GeneratedFile], out_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = out_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &file.contents)?;
        tracing::info!(path = %path.display(), bytes = file.contents.len(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}
