//! Columnar store seam and the in-memory/NDJSON implementation.
//!
//! The store is not re-entrant across instances, so every mutating call
//! (adding files, advancing the row, counting) happens under [`store_lock`].
use std::path::Path;

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};

use super::datum::Datum;
use super::error::{Result, RuntimeError};

static STORE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Process-wide lock shared by every reader. Not re-entrant.
pub fn store_lock() -> MutexGuard<'static, ()> {
    STORE_LOCK.lock()
}

pub trait ColumnarStore: Send {
    fn tree_name(&self) -> &str;

    /// Append the rows of one file; returns how many rows it added.
    fn add_file(&mut self, path: &Path) -> Result<u64>;

    fn entries(&self) -> u64;

    fn load_entry(&mut self, row: u64) -> Result<()>;

    /// Value of `branch` in the loaded row.
    fn read(&self, branch: &str) -> Result<&Datum>;

    /// Drop file-backed data and the loaded row.
    fn release(&mut self);
}

// ————————————————————————————————————————————————————————————————————————————
// MEMORY STORE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
struct Table {
    columns: IndexMap<String, Vec<Option<Datum>>>,
    rows: u64,
}

impl Table {
    fn push_row<I, K>(&mut self, row: I)
    where
        I: IntoIterator<Item = (K, Datum)>,
        K: Into<String>,
    {
        let index = self.rows as usize;
        for (name, datum) in row {
            let column = self.columns.entry(name.into()).or_default();
            // pad rows that did not carry this branch
            column.resize(index, None);
            column.push(Some(datum));
        }
        self.rows += 1;
    }

    fn get(&self, branch: &str, row: u64) -> Result<&Datum> {
        let column = self
            .columns
            .get(branch)
            .ok_or_else(|| RuntimeError::MissingBranch(branch.to_string()))?;
        column
            .get(row as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RuntimeError::MissingValue { branch: branch.to_string(), row })
    }
}

/// Column-major rows held in memory.
///
/// Rows pushed with [`MemoryStore::push_row`] are resident and survive
/// [`ColumnarStore::release`]; rows read from NDJSON files (one JSON object
/// per line) are dropped on release and re-read on the next activation.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tree: String,
    resident: Table,
    files: Table,
    current: Option<u64>,
}

impl MemoryStore {
    pub fn new(tree: impl Into<String>) -> Self {
        Self {
            tree: tree.into(),
            resident: Table::default(),
            files: Table::default(),
            current: None,
        }
    }

    pub fn push_row<I, K>(&mut self, row: I)
    where
        I: IntoIterator<Item = (K, Datum)>,
        K: Into<String>,
    {
        self.resident.push_row(row);
    }

    pub fn with_rows<R, I, K>(tree: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, Datum)>,
        K: Into<String>,
    {
        let mut store = Self::new(tree);
        for row in rows {
            store.push_row(row);
        }
        store
    }

    pub fn current_row(&self) -> Option<u64> {
        self.current
    }

    /// Rows of one NDJSON file. Nothing is stored unless every line parses.
    fn parse_ndjson(&mut self, path: &Path, source: &str) -> Result<u64> {
        let mut rows = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let json_error = |message: String| RuntimeError::Json {
                path: path.to_path_buf(),
                line: index + 1,
                message,
            };
            let value = serde_json::from_str::<serde_json::Value>(line)
                .map_err(|e| json_error(e.to_string()))?;
            let serde_json::Value::Object(fields) = value else {
                return Err(json_error("row is not a JSON object".into()));
            };
            // nulls mark a branch without a value in this row
            let row = fields
                .iter()
                .filter_map(|(name, v)| Datum::from_json(v).map(|d| (name.clone(), d)))
                .collect::<Vec<_>>();
            rows.push(row);
        }
        let added = rows.len() as u64;
        for row in rows {
            self.files.push_row(row);
        }
        Ok(added)
    }
}

impl ColumnarStore for MemoryStore {
    fn tree_name(&self) -> &str {
        &self.tree
    }

    fn add_file(&mut self, path: &Path) -> Result<u64> {
        let source = std::fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let added = self.parse_ndjson(path, &source)?;
        tracing::debug!(tree = %self.tree, path = %path.display(), rows = added, "added file");
        Ok(added)
    }

    fn entries(&self) -> u64 {
        self.resident.rows + self.files.rows
    }

    fn load_entry(&mut self, row: u64) -> Result<()> {
        let entries = self.entries();
        if row >= entries {
            return Err(RuntimeError::RowOutOfRange { row, entries });
        }
        self.current = Some(row);
        Ok(())
    }

    fn read(&self, branch: &str) -> Result<&Datum> {
        let row = self.current.ok_or(RuntimeError::NoEntry)?;
        if row < self.resident.rows {
            self.resident.get(branch, row)
        } else {
            self.files.get(branch, row - self.resident.rows)
        }
    }

    fn release(&mut self) {
        self.files = Table::default();
        self.current = None;
    }
}
