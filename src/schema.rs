//! Line-oriented schema parser.
//!
//! A schema file holds one tree-name header (`name:` with no space) followed
//! by `name: type` declarations. Anything that does not start with a letter or
//! underscore is a comment; there is no `#` comment syntax.
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::catalog::{Catalog, Format};
use crate::error::{Result, SchemaError};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// One parsed `name: type` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleVariable {
    pub ty: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    TreeHeader(&'a str),
    Comment,
    Declaration(&'a str),
}

/// Result of tokenising one schema file, before it is merged into a catalog.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    pub format: String,
    pub tree: String,
    pub path: PathBuf,
    /// `(line number, declaration)`, in file order.
    pub declarations: Vec<(usize, SimpleVariable)>,
}

// ————————————————————————————————————————————————————————————————————————————
// LINES
// ————————————————————————————————————————————————————————————————————————————

pub fn tree_header(line: &str) -> Option<&str> {
    if line.contains(' ') {
        return None;
    }
    line.find(':').map(|at| &line[..at])
}

pub fn is_comment(line: &str) -> bool {
    if line.len() <= 2 {
        return true;
    }
    match line.chars().find(|c| *c != ' ') {
        Some(c) => !(c.is_ascii_alphabetic() || c == '_'),
        None => true,
    }
}

pub fn classify_line(line: &str) -> Line<'_> {
    if let Some(tree) = tree_header(line) {
        Line::TreeHeader(tree)
    } else if is_comment(line) {
        Line::Comment
    } else {
        Line::Declaration(line)
    }
}

/// Trim, collapse runs of spaces and drop one trailing `;`.
pub fn normalize_spaces(line: &str) -> String {
    let collapsed = line.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");
    match collapsed.strip_suffix(';') {
        Some(stripped) => stripped.trim_end().to_string(),
        None => collapsed,
    }
}

/// Split a declaration at its last colon. `Err(None)` means no colon at
/// all, `Err(Some(name))` means the type is empty.
pub fn parse_declaration(line: &str) -> std::result::Result<SimpleVariable, Option<String>> {
    let text = normalize_spaces(line);
    let at = text.rfind(':').ok_or(None)?;
    let name = text[..at].trim().to_string();
    let ty = text[at + 1..].trim().to_string();
    if ty.is_empty() {
        return Err(Some(name));
    }
    Ok(SimpleVariable { ty, name })
}

// ————————————————————————————————————————————————————————————————————————————
// FILES
// ————————————————————————————————————————————————————————————————————————————

/// Format name of a schema file: its file name.
pub fn format_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

pub fn parse_schema_source(path: &Path, source: &str) -> Result<SchemaFile> {
    let mut tree: Option<String> = None;
    let mut declarations = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let raw = raw.trim_end_matches('\r');
        match classify_line(raw) {
            Line::TreeHeader(name) => {
                if tree.is_some() {
                    // only the first block of a file is consumed
                    break;
                }
                tree = Some(name.to_string());
            }
            Line::Comment => {}
            Line::Declaration(text) => match parse_declaration(text) {
                Ok(decl) => declarations.push((line_no, decl)),
                Err(None) => {
                    return Err(SchemaError::Parse {
                        path: path.to_path_buf(),
                        line: line_no,
                        text: text.to_string(),
                    });
                }
                Err(Some(name)) => {
                    return Err(SchemaError::MissingType {
                        path: path.to_path_buf(),
                        line: line_no,
                        name,
                    });
                }
            },
        }
    }

    let tree = tree.ok_or_else(|| SchemaError::MissingTreeName { path: path.to_path_buf() })?;
    Ok(SchemaFile {
        format: format_name(path),
        tree,
        path: path.to_path_buf(),
        declarations,
    })
}

pub fn parse_schema_file(path: &Path) -> Result<SchemaFile> {
    let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = parse_schema_source(path, &source)?;
    tracing::info!(
        format = %parsed.format,
        tree = %parsed.tree,
        variables = parsed.declarations.len(),
        "parsed schema file"
    );
    Ok(parsed)
}

/// Merge tokenised files into one catalog, in the given order.
pub fn build_catalog(files: Vec<SchemaFile>) -> Result<Catalog> {
    if files.is_empty() {
        return Err(SchemaError::NoFormats);
    }
    let mut catalog = Catalog::new();
    for file in &files {
        catalog.add_format(Format {
            name: file.format.clone(),
            tree: file.tree.clone(),
            source: file.path.clone(),
        })?;
    }
    for file in files {
        for (line, decl) in &file.declarations {
            if let Some(prev) = catalog.declare(&file.format, decl) {
                if prev != decl.ty {
                    tracing::warn!(
                        path = %file.path.display(),
                        line,
                        variable = %decl.name,
                        previous = %prev,
                        current = %decl.ty,
                        "variable redeclared with a different type"
                    );
                }
            }
        }
    }
    catalog.finish();
    Ok(catalog)
}

/// Parse every schema file (concurrently) and merge them in file order.
pub fn parse_schema_files<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Catalog> {
    let files = paths
        .par_iter()
        .map(|path| parse_schema_file(path.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    build_catalog(files)
}

/// Resolve format names under `schema_dir`. Names with glob characters are
/// expanded (sorted); a pattern matching nothing is an error.
pub fn resolve_schema_files<I>(schema_dir: &Path, names: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in names {
        let name = raw.as_ref();
        let joined = schema_dir.join(name);
        if !has_glob_chars(name) {
            out.push(joined);
            continue;
        }
        let pattern = joined.to_string_lossy().to_string();
        let entries = glob::glob(&pattern).map_err(|e| SchemaError::Glob {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        let mut matched = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SchemaError::Glob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            if path.is_file() {
                matched.push(path);
            }
        }
        if matched.is_empty() {
            return Err(SchemaError::Glob { pattern, message: "matched no files".into() });
        }
        matched.sort();
        out.extend(matched);
    }
    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //
