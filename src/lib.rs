//! docvalues - per-document value slot storage for a search backend
//!
//! Each document carries a sparse set of *value slots* (slot number ->
//! opaque byte string). This crate maintains, per slot, a compact sorted
//! mapping from document id to value on top of an ordered key/value table:
//! - Delta-coded, size-bounded value chunks with random-access point lookup
//! - An in-place merge protocol folding pending edits into existing chunks
//! - A per-document slot set (bitmap or interpolative-coded) so all values
//!   of one document can be enumerated without scanning every slot
//! - Per-slot statistics (frequency plus lexicographic value bounds)
//!
//! The backing table is an extension point (see [`Table`]); an ordered
//! in-memory implementation is provided.

pub mod codec;
pub mod error;
pub mod table;
pub mod values;

pub use error::{Error, Result};
pub use table::{MemTable, Table, TableCursor};
pub use values::{Document, ValueChunkReader, ValueManager, ValueStats, ValueUpdater};

/// Document identifier. Zero is reserved and means "no document".
pub type DocId = u32;

/// Value slot number.
pub type SlotNo = u32;

/// Highest valid document id.
pub const MAX_DOCID: DocId = u32::MAX - 1;

/// Sentinel slot number meaning "no slot" (used by the stats cache).
pub const BAD_SLOT: SlotNo = u32::MAX;
