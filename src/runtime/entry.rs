//! Reader state machine, activation guard and per-row caches.
//!
//! ```text
//! Uninitialized ──activate──▶ Activated ──get_entry(i)──▶ Loaded(i) ◀──get_entry(j)──┐
//!                                 ▲                          │  └────────────────────┘
//!                              activate                 Activator drop
//!                                 │                          ▼
//!                                 └─────────────────── Deactivated
//! ```
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;

use super::datum::FromDatum;
use super::error::{Result, RuntimeError};
use super::store::{ColumnarStore, store_lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Uninitialized,
    Activated,
    Loaded(u64),
    Deactivated,
}

/// Shared navigation state of one generated reader.
pub struct Entry {
    format: &'static str,
    files: Vec<PathBuf>,
    store: Box<dyn ColumnarStore>,
    state: ReaderState,
    entries: Option<u64>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("format", &self.format)
            .field("tree", &self.store.tree_name())
            .field("files", &self.files)
            .field("state", &self.state)
            .field("entries", &self.entries)
            .finish()
    }
}

impl Entry {
    pub fn new(format: &'static str, store: Box<dyn ColumnarStore>) -> Self {
        Self {
            format,
            files: Vec::new(),
            store,
            state: ReaderState::Uninitialized,
            entries: None,
        }
    }

    pub fn format(&self) -> &'static str {
        self.format
    }

    pub fn tree_name(&self) -> &str {
        self.store.tree_name()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ReaderState::Activated | ReaderState::Loaded(_))
    }

    pub fn current_row(&self) -> Option<u64> {
        match self.state {
            ReaderState::Loaded(row) => Some(row),
            _ => None,
        }
    }

    pub fn file_names(&self) -> &[PathBuf] {
        &self.files
    }

    /// Register a file. While active it is read into the store immediately.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if self.is_active() {
            let _lock = store_lock();
            self.store.add_file(&path)?;
        }
        self.files.push(path);
        self.entries = None;
        Ok(())
    }

    /// Total rows over every file; cached until the file list changes.
    pub fn get_entries(&mut self) -> Result<u64> {
        if let Some(entries) = self.entries {
            return Ok(entries);
        }
        let _lock = store_lock();
        let entries = if self.is_active() {
            self.store.entries()
        } else {
            // count without keeping the files open
            let counted = self.load_files().map(|()| self.store.entries());
            self.store.release();
            counted?
        };
        self.entries = Some(entries);
        Ok(entries)
    }

    pub fn get_entry(&mut self, row: u64) -> Result<()> {
        if !self.is_active() {
            return Err(RuntimeError::NotActive { format: self.format.to_string() });
        }
        let entries = self.get_entries()?;
        if row >= entries {
            return Err(RuntimeError::RowOutOfRange { row, entries });
        }
        {
            let _lock = store_lock();
            self.store.load_entry(row)?;
        }
        self.state = ReaderState::Loaded(row);
        Ok(())
    }

    /// Typed value of `branch` in the loaded row.
    pub fn read<T: FromDatum>(&self, branch: &str) -> Result<T> {
        if self.current_row().is_none() {
            return Err(RuntimeError::NoEntry);
        }
        let datum = self.store.read(branch)?;
        T::from_datum(datum).ok_or_else(|| RuntimeError::TypeMismatch {
            branch: branch.to_string(),
            expected: T::TYPE_NAME,
            found: datum.kind(),
        })
    }

    // caller holds the store lock
    fn load_files(&mut self) -> Result<()> {
        for path in &self.files {
            self.store.add_file(path)?;
        }
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(RuntimeError::AlreadyActive { format: self.format.to_string() });
        }
        let _lock = store_lock();
        if let Err(err) = self.load_files() {
            self.store.release();
            return Err(err);
        }
        self.state = ReaderState::Activated;
        tracing::debug!(format = self.format, files = self.files.len(), "activated");
        Ok(())
    }

    fn deactivate(&mut self) {
        let _lock = store_lock();
        self.store.release();
        self.state = ReaderState::Deactivated;
        tracing::debug!(format = self.format, "deactivated");
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NTUPLE
// ————————————————————————————————————————————————————————————————————————————

/// Entry navigation shared by every generated reader.
pub trait Ntuple {
    fn entry(&self) -> &Entry;
    fn entry_mut(&mut self) -> &mut Entry;

    /// Forget every cached branch value.
    fn clear_cache(&mut self);

    fn format(&self) -> &'static str {
        self.entry().format()
    }

    fn tree_name(&self) -> &str {
        self.entry().tree_name()
    }

    fn file_names(&self) -> &[PathBuf] {
        self.entry().file_names()
    }

    fn add_file(&mut self, path: &Path) -> Result<()> {
        self.entry_mut().add_file(path)
    }

    fn get_entries(&mut self) -> Result<u64> {
        self.entry_mut().get_entries()
    }

    fn get_entry(&mut self, row: u64) -> Result<()> {
        self.clear_cache();
        self.entry_mut().get_entry(row)
    }

    fn activate(&mut self) -> Result<Activator<'_, Self>>
    where
        Self: Sized,
    {
        Activator::new(self)
    }
}

/// Scoped activation window. Dropping it clears the caches and releases the
/// store, whichever way the scope is left.
pub struct Activator<'a, B: Ntuple + ?Sized> {
    baby: &'a mut B,
}

impl<'a, B: Ntuple + ?Sized> Activator<'a, B> {
    pub fn new(baby: &'a mut B) -> Result<Self> {
        baby.entry_mut().activate()?;
        baby.clear_cache();
        Ok(Self { baby })
    }
}

impl<B: Ntuple + ?Sized> Deref for Activator<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.baby
    }
}

impl<B: Ntuple + ?Sized> DerefMut for Activator<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.baby
    }
}

impl<B: Ntuple + ?Sized> Drop for Activator<'_, B> {
    fn drop(&mut self) {
        self.baby.clear_cache();
        self.baby.entry_mut().deactivate();
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ROW CACHE
// ————————————————————————————————————————————————————————————————————————————

/// One branch value, read on first access after a row change.
pub struct RowCache<T> {
    cell: OnceCell<T>,
}

impl<T> Default for RowCache<T> {
    fn default() -> Self {
        Self { cell: OnceCell::new() }
    }
}

impl<T: fmt::Debug> fmt::Debug for RowCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RowCache").field(&self.cell.get()).finish()
    }
}

impl<T> RowCache<T> {
    pub fn is_cached(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn clear(&mut self) {
        self.cell.take();
    }
}

impl<T: FromDatum> RowCache<T> {
    /// A failed read is fatal: the schema promised this branch.
    pub fn get_or_read(&self, entry: &Entry, branch: &str) -> &T {
        self.cell.get_or_init(|| match entry.read::<T>(branch) {
            Ok(value) => value,
            Err(err) => fatal(format_args!(
                "reading `{branch}` in format `{}`: {err}",
                entry.format()
            )),
        })
    }
}

/// Log and abort. Reserved for broken contracts, not recoverable errors.
pub fn fatal(message: impl fmt::Display) -> ! {
    tracing::error!("{message}");
    panic!("{message}");
}

/// Body of every accessor stub: the variable does not exist in `format`.
pub fn unavailable(variable: &str, format: &str) -> ! {
    fatal(RuntimeError::Unavailable {
        variable: variable.to_string(),
        format: format.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Datum, MemoryStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Reader {
        entry: Entry,
        pt: RowCache<f32>,
    }

    impl Ntuple for Reader {
        fn entry(&self) -> &Entry {
            &self.entry
        }
        fn entry_mut(&mut self) -> &mut Entry {
            &mut self.entry
        }
        fn clear_cache(&mut self) {
            self.pt.clear();
        }
    }

    impl Reader {
        fn pt(&self) -> f32 {
            *self.pt.get_or_read(&self.entry, "pt")
        }
    }

    fn reader() -> Reader {
        let store = MemoryStore::with_rows(
            "tree",
            [[("pt", Datum::Float(1.5))], [("pt", Datum::Float(2.5))]],
        );
        Reader { entry: Entry::new("reader", Box::new(store)), pt: RowCache::default() }
    }

    #[test]
    fn state_machine_walk() {
        let mut p = reader();
        assert_eq!(p.entry().state(), ReaderState::Uninitialized);
        assert!(matches!(p.get_entry(0), Err(RuntimeError::NotActive { .. })));
        {
            let mut active = p.activate().unwrap();
            assert_eq!(active.entry().state(), ReaderState::Activated);
            assert_eq!(active.get_entries().unwrap(), 2);
            active.get_entry(1).unwrap();
            assert_eq!(active.entry().state(), ReaderState::Loaded(1));
            assert_eq!(active.pt(), 2.5);
        }
        assert_eq!(p.entry().state(), ReaderState::Deactivated);
        assert!(!p.pt.is_cached());

        // a second pass may reopen the reader
        let mut again = p.activate().unwrap();
        again.get_entry(0).unwrap();
        assert_eq!(again.pt(), 1.5);
    }

    #[test]
    fn reactivation_while_active_is_rejected() {
        let mut p = reader();
        let mut active = p.activate().unwrap();
        let nested = Activator::new(&mut *active);
        assert!(matches!(nested, Err(RuntimeError::AlreadyActive { .. })));
    }

    #[test]
    fn cache_is_refreshed_on_row_change() {
        let mut p = reader();
        let mut active = p.activate().unwrap();
        active.get_entry(0).unwrap();
        assert!(!active.pt.is_cached());
        assert_eq!(active.pt(), 1.5);
        assert!(active.pt.is_cached());
        active.get_entry(1).unwrap();
        assert!(!active.pt.is_cached());
        assert_eq!(active.pt(), 2.5);
    }

    #[test]
    fn row_out_of_range() {
        let mut p = reader();
        let mut active = p.activate().unwrap();
        assert!(matches!(
            active.get_entry(5),
            Err(RuntimeError::RowOutOfRange { row: 5, entries: 2 })
        ));
    }

    #[test]
    fn drop_deactivates_on_early_return() {
        fn first_row_pt(p: &mut Reader) -> Result<f32> {
            let mut active = p.activate()?;
            active.get_entry(9)?;
            Ok(active.pt())
        }
        let mut p = reader();
        assert!(first_row_pt(&mut p).is_err());
        assert_eq!(p.entry().state(), ReaderState::Deactivated);
    }

    #[test]
    fn entries_cached_until_files_change() {
        let mut p = reader();
        assert_eq!(p.get_entries().unwrap(), 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.ndjson");
        std::fs::write(&path, "{\"pt\": 3.5}\n").unwrap();
        p.add_file(&path).unwrap();
        assert_eq!(p.get_entries().unwrap(), 3);

        let mut active = p.activate().unwrap();
        active.get_entry(2).unwrap();
        assert_eq!(active.pt(), 3.5);
    }

    #[test]
    #[should_panic(expected = "not available in format `reader`")]
    fn stub_is_fatal() {
        unavailable("iso", "reader");
    }

    #[test]
    #[should_panic(expected = "reading `pt`")]
    fn unreadable_branch_is_fatal() {
        let store = MemoryStore::with_rows("tree", [[("pt", Datum::Text("x".into()))]]);
        let mut p = Reader { entry: Entry::new("reader", Box::new(store)), pt: RowCache::default() };
        let mut active = p.activate().unwrap();
        active.get_entry(0).unwrap();
        let _ = active.pt();
    }

    #[test]
    fn failed_add_file_leaves_reader_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ndjson");
        std::fs::write(&path, "{\"pt\": 2.0}\n{\"pt\": 3.0}\n[1]\n").unwrap();

        let mut p = reader();
        let mut active = p.activate().unwrap();
        assert!(matches!(active.add_file(&path), Err(RuntimeError::Json { line: 3, .. })));
        assert!(active.file_names().is_empty());
        assert_eq!(active.get_entries().unwrap(), 2);
        assert!(matches!(active.get_entry(2), Err(RuntimeError::RowOutOfRange { row: 2, entries: 2 })));
    }

    static BUSY: AtomicBool = AtomicBool::new(false);
    static OVERLAPPED: AtomicBool = AtomicBool::new(false);

    /// Store that records whether two readers were ever inside it at once.
    struct Exclusive;

    impl Exclusive {
        fn enter() {
            if BUSY.swap(true, Ordering::SeqCst) {
                OVERLAPPED.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_micros(200));
            BUSY.store(false, Ordering::SeqCst);
        }
    }

    impl ColumnarStore for Exclusive {
        fn tree_name(&self) -> &str {
            "tree"
        }
        fn add_file(&mut self, _: &Path) -> Result<u64> {
            Exclusive::enter();
            Ok(0)
        }
        fn entries(&self) -> u64 {
            Exclusive::enter();
            20
        }
        fn load_entry(&mut self, _: u64) -> Result<()> {
            Exclusive::enter();
            Ok(())
        }
        fn read(&self, branch: &str) -> Result<&Datum> {
            Err(RuntimeError::MissingBranch(branch.to_string()))
        }
        fn release(&mut self) {}
    }

    #[test]
    fn readers_on_two_threads_never_share_the_store() {
        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    let mut r = Reader {
                        entry: Entry::new("exclusive", Box::new(Exclusive)),
                        pt: RowCache::default(),
                    };
                    let mut active = r.activate().unwrap();
                    for row in 0..20 {
                        // invalidates the entry count, so every pass counts again
                        active.add_file(Path::new("extra.ndjson")).unwrap();
                        active.get_entry(row).unwrap();
                    }
                });
            }
        });
        assert!(!OVERLAPPED.load(Ordering::SeqCst));
    }
}
