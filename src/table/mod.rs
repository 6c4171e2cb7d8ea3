//! Ordered key/value table abstraction
//!
//! The value store sits on top of two ordered byte-key tables (postlist
//! and termlist). [`Table`] and [`TableCursor`] capture exactly the
//! capabilities the store needs; any ordered storage backend can
//! implement them. [`MemTable`] is the in-memory realization used in
//! tests and for embedding.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::Result;
use crate::error::Error;

/// An ordered byte-key table.
///
/// Methods take `&self`; implementations are expected to provide their
/// own interior mutability (the in-memory table wraps a lock, a disk
/// backend would wrap its write handle).
pub trait Table: Send + Sync {
    /// Whether the table is open for reads and writes.
    fn is_open(&self) -> bool;

    /// Insert or replace the entry for `key`.
    fn add(&self, key: &[u8], tag: &[u8]) -> Result<()>;

    /// Delete the entry for `key`. Deleting an absent key is a no-op.
    fn del(&self, key: &[u8]) -> Result<()>;

    /// Point lookup: if `key` exists, copy its tag into `tag` and
    /// return `true`.
    fn get_exact_entry(&self, key: &[u8], tag: &mut Vec<u8>) -> Result<bool>;

    /// Create a cursor, or `None` if the table is closed.
    fn cursor(&self) -> Option<Box<dyn TableCursor>>;
}

/// A positionable cursor over a [`Table`].
///
/// After any mutation of the underlying table the position is
/// unspecified until the next `find_entry`.
pub trait TableCursor: Send {
    /// Seek to `key`. On an exact match returns `true`; otherwise the
    /// cursor is left on the greatest entry before `key` (or before the
    /// first entry, where `current_key` is empty) and returns `false`.
    fn find_entry(&mut self, key: &[u8]) -> bool;

    /// Advance to the next entry; returns `false` once past the end.
    fn next(&mut self) -> bool;

    /// Whether the cursor has moved past the last entry.
    fn after_end(&self) -> bool;

    /// Key of the current entry, or empty before the first entry and
    /// after the end.
    fn current_key(&self) -> &[u8];

    /// Fetch and return the tag of the current entry.
    fn read_tag(&mut self) -> &[u8];
}

#[derive(Debug)]
struct MemTableInner {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    open: bool,
}

/// Ordered in-memory [`Table`] backed by a `BTreeMap`.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct MemTable {
    inner: Arc<RwLock<MemTableInner>>,
}

impl MemTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemTableInner {
                entries: BTreeMap::new(),
                open: true,
            })),
        }
    }

    /// Mark the table closed; further writes fail and cursors are
    /// no longer handed out.
    pub fn close(&self) {
        self.inner.write().open = false;
    }

    /// Number of entries, for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for MemTable {
    fn is_open(&self) -> bool {
        self.inner.read().open
    }

    fn add(&self, key: &[u8], tag: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.open {
            return Err(Error::DatabaseClosed);
        }
        inner.entries.insert(key.to_vec(), tag.to_vec());
        Ok(())
    }

    fn del(&self, key: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.open {
            return Err(Error::DatabaseClosed);
        }
        inner.entries.remove(key);
        Ok(())
    }

    fn get_exact_entry(&self, key: &[u8], tag: &mut Vec<u8>) -> Result<bool> {
        let inner = self.inner.read();
        if !inner.open {
            return Err(Error::DatabaseClosed);
        }
        match inner.entries.get(key) {
            Some(value) => {
                tag.clear();
                tag.extend_from_slice(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn cursor(&self) -> Option<Box<dyn TableCursor>> {
        if !self.is_open() {
            return None;
        }
        Some(Box::new(MemCursor {
            inner: Arc::clone(&self.inner),
            pos: CursorPos::BeforeFirst,
            tag: Vec::new(),
        }))
    }
}

#[derive(Debug, Clone)]
enum CursorPos {
    BeforeFirst,
    At(Vec<u8>),
    AfterEnd,
}

/// Cursor over a [`MemTable`].
///
/// Remembers its position as a key, so it stays valid (repositioning on
/// the nearest surviving entry) across table mutations.
struct MemCursor {
    inner: Arc<RwLock<MemTableInner>>,
    pos: CursorPos,
    tag: Vec<u8>,
}

impl TableCursor for MemCursor {
    fn find_entry(&mut self, key: &[u8]) -> bool {
        let inner = self.inner.read();
        if inner.entries.contains_key(key) {
            self.pos = CursorPos::At(key.to_vec());
            return true;
        }
        let below = inner
            .entries
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key)))
            .next_back();
        self.pos = match below {
            Some((k, _)) => CursorPos::At(k.clone()),
            None => CursorPos::BeforeFirst,
        };
        false
    }

    fn next(&mut self) -> bool {
        let inner = self.inner.read();
        let next = match &self.pos {
            CursorPos::BeforeFirst => inner.entries.iter().next(),
            CursorPos::At(key) => inner
                .entries
                .range::<[u8], _>((Bound::Excluded(key.as_slice()), Bound::Unbounded))
                .next(),
            CursorPos::AfterEnd => None,
        };
        let pos = match next {
            Some((k, _)) => CursorPos::At(k.clone()),
            None => CursorPos::AfterEnd,
        };
        drop(inner);
        self.pos = pos;
        !matches!(self.pos, CursorPos::AfterEnd)
    }

    fn after_end(&self) -> bool {
        matches!(self.pos, CursorPos::AfterEnd)
    }

    fn current_key(&self) -> &[u8] {
        match &self.pos {
            CursorPos::At(key) => key,
            _ => &[],
        }
    }

    fn read_tag(&mut self) -> &[u8] {
        let tag = match &self.pos {
            CursorPos::At(key) => self
                .inner
                .read()
                .entries
                .get(key.as_slice())
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        self.tag = tag;
        &self.tag
    }
}
