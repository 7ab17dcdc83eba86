//! Support library for generated accessors.
//!
//! Every generated `Baby*` type owns an [`Entry`] (the reader state machine
//! over a [`ColumnarStore`]) and one [`RowCache`] per branch it implements.
//! Store mutation is serialised process-wide through [`store_lock`].
pub mod datum;
pub mod entry;
pub mod error;
pub mod function;
pub mod store;

pub use datum::{Datum, FromDatum};
pub use entry::{Activator, Entry, Ntuple, ReaderState, RowCache, fatal, unavailable};
pub use error::{Result, RuntimeError};
pub use function::{AsF64, FunctionTable, NamedAccessor, NumericValue, not_numeric};
pub use store::{ColumnarStore, MemoryStore, store_lock};

// generated registries keep their function table in a lazy static
pub use once_cell::sync::Lazy;
