//! Per-document value storage
//!
//! [`ValueManager`] is the facade over the two backing tables. Edits
//! are buffered in memory (`add_value` / `remove_value`), point reads
//! consult the buffer before disk, and [`merge_changes`] folds the
//! buffer into the per-slot chunk storage through [`ValueUpdater`].
//! Document-level operations additionally maintain per-slot statistics
//! and the per-document slot set used by [`get_all_values`].
//!
//! [`merge_changes`]: ValueManager::merge_changes
//! [`get_all_values`]: ValueManager::get_all_values

pub mod chunk;
pub mod document;
pub mod keys;
pub mod slots;
pub mod stats;
pub mod updater;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

pub use chunk::ValueChunkReader;
pub use document::Document;
pub use stats::ValueStats;
pub use updater::ValueUpdater;

use crate::error::Error;
use crate::table::{Table, TableCursor};
use crate::values::keys::{docid_from_key, make_slots_key, make_valuechunk_key};
use crate::values::slots::{decode_slot_set, encode_slot_set};
use crate::values::stats::{read_value_stats, write_value_stats};
use crate::{BAD_SLOT, DocId, Result, SlotNo};

/// Facade over per-document value storage.
///
/// Holds non-owning handles to the postlist table (chunks and stats)
/// and the termlist table (per-document slot sets). Single-threaded
/// use: the interior locks exist only to keep the read API `&self`.
pub struct ValueManager {
    postlist: Arc<dyn Table>,
    termlist: Arc<dyn Table>,
    /// Pending edits: slot -> docid -> value, empty value = delete.
    changes: FxHashMap<SlotNo, BTreeMap<DocId, Vec<u8>>>,
    /// Encoded slot sets touched by the current document batch.
    slots: FxHashMap<DocId, Vec<u8>>,
    /// Most-recently-used stats, keyed by slot (BAD_SLOT = empty).
    mru_stats: Mutex<(SlotNo, ValueStats)>,
    /// Reusable cursor over the postlist table, created lazily.
    cursor: Mutex<Option<Box<dyn TableCursor>>>,
}

impl ValueManager {
    pub fn new(postlist: Arc<dyn Table>, termlist: Arc<dyn Table>) -> Self {
        Self {
            postlist,
            termlist,
            changes: FxHashMap::default(),
            slots: FxHashMap::default(),
            mru_stats: Mutex::new((BAD_SLOT, ValueStats::default())),
            cursor: Mutex::new(None),
        }
    }

    /// Buffer an insert or modification of one (docid, slot) value.
    pub fn add_value(&mut self, did: DocId, slot: SlotNo, value: &[u8]) {
        self.changes
            .entry(slot)
            .or_default()
            .insert(did, value.to_vec());
    }

    /// Buffer a deletion of one (docid, slot) value.
    pub fn remove_value(&mut self, did: DocId, slot: SlotNo) {
        self.changes.entry(slot).or_default().insert(did, Vec::new());
    }

    /// Whether any buffered edits await a merge.
    pub fn is_modified(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Look up the value of `did` in `slot`; empty means no value.
    ///
    /// Buffered edits win over stored chunks, so reads see the effect
    /// of edits that have not been merged yet.
    pub fn get_value(&self, did: DocId, slot: SlotNo) -> Result<Vec<u8>> {
        if let Some(edits) = self.changes.get(&slot)
            && let Some(value) = edits.get(&did)
        {
            return Ok(value.clone());
        }

        let mut chunk = Vec::new();
        let first_did = self.get_chunk_containing_did(slot, did, &mut chunk)?;
        if first_did == 0 {
            return Ok(Vec::new());
        }
        let mut reader = ValueChunkReader::new();
        reader.assign(chunk, first_did)?;
        reader.skip_to(did)?;
        if reader.at_end() || reader.docid() != did {
            return Ok(Vec::new());
        }
        Ok(reader.value().to_vec())
    }

    /// Find the chunk whose docid range covers `did`, filling `chunk`
    /// with its tag and returning its first docid (0 if none).
    fn get_chunk_containing_did(
        &self,
        slot: SlotNo,
        did: DocId,
        chunk: &mut Vec<u8>,
    ) -> Result<DocId> {
        let mut guard = self.cursor.lock();
        if guard.is_none() {
            *guard = self.postlist.cursor();
        }
        let Some(cursor) = guard.as_mut() else {
            return Ok(0);
        };

        let mut found_did = did;
        if !cursor.find_entry(&make_valuechunk_key(slot, did)) {
            // Not an exact hit: the chunk starting at or before `did`,
            // if any, is where the cursor landed.
            found_did = docid_from_key(slot, cursor.current_key())?;
            if found_did == 0 {
                return Ok(0);
            }
        }

        chunk.clear();
        chunk.extend_from_slice(cursor.read_tag());
        Ok(found_did)
    }

    /// Load stats for `slot` into `val_stats` if not already there,
    /// and return a mutable handle.
    fn stats_entry<'m>(
        &self,
        val_stats: &'m mut BTreeMap<SlotNo, ValueStats>,
        slot: SlotNo,
    ) -> Result<&'m mut ValueStats> {
        match val_stats.entry(slot) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let mut stats = ValueStats::default();
                read_value_stats(self.postlist.as_ref(), slot, &mut stats)?;
                Ok(e.insert(stats))
            }
        }
    }

    /// Buffer all values of a document and update `val_stats`.
    ///
    /// Returns the encoded slot-set entry for the caller to persist in
    /// the termlist table (empty if the document has no values or the
    /// termlist table is closed).
    pub fn add_document(
        &mut self,
        did: DocId,
        doc: &Document,
        val_stats: &mut BTreeMap<SlotNo, ValueStats>,
    ) -> Result<Vec<u8>> {
        if doc.value_count() == 0 {
            // The document's values may already have been recorded
            // earlier in this batch; mark them gone.
            if let Some(entry) = self.slots.get_mut(&did) {
                entry.clear();
            }
            return Ok(Vec::new());
        }

        let mut slotvec = Vec::with_capacity(doc.value_count());
        for (slot, value) in doc.slot_values() {
            debug_assert!(slotvec.last().is_none_or(|&prev| prev < slot));
            let stats = self.stats_entry(val_stats, slot)?;
            if stats.freq == 0 {
                stats.lower_bound = value.to_vec();
                stats.upper_bound = value.to_vec();
            } else {
                // Check the upper bound first: for common uses of
                // value slots (dates) values tend to grow over time.
                match value.cmp(stats.upper_bound.as_slice()) {
                    std::cmp::Ordering::Greater => stats.upper_bound = value.to_vec(),
                    std::cmp::Ordering::Equal => {}
                    std::cmp::Ordering::Less => {
                        if value < stats.lower_bound.as_slice() {
                            stats.lower_bound = value.to_vec();
                        }
                    }
                }
            }
            stats.freq += 1;

            self.add_value(did, slot, value);
            slotvec.push(slot);
        }

        if !self.termlist.is_open() {
            return Ok(Vec::new());
        }
        let blob = encode_slot_set(&slotvec);
        self.slots.insert(did, blob.clone());
        Ok(blob)
    }

    /// Buffer removal of all of a document's values and update
    /// `val_stats`. A document with no slot-set entry is a no-op.
    pub fn delete_document(
        &mut self,
        did: DocId,
        val_stats: &mut BTreeMap<SlotNo, ValueStats>,
    ) -> Result<()> {
        debug_assert!(self.termlist.is_open());
        let blob = match self.slots.remove(&did) {
            Some(prev) => {
                self.slots.insert(did, Vec::new());
                prev
            }
            None => {
                let mut b = Vec::new();
                if !self
                    .termlist
                    .get_exact_entry(&make_slots_key(did), &mut b)?
                {
                    // Document had neither terms nor values.
                    return Ok(());
                }
                self.slots.insert(did, Vec::new());
                b
            }
        };

        for slot in decode_slot_set(&blob)? {
            let stats = self.stats_entry(val_stats, slot)?;
            debug_assert!(stats.freq > 0);
            stats.freq -= 1;
            if stats.freq == 0 {
                stats.lower_bound.clear();
                stats.upper_bound.clear();
            }
            self.remove_value(did, slot);
        }
        Ok(())
    }

    /// Replace a document: delete the stored one, add the new one.
    ///
    /// When the replacing document carries the same docid its values
    /// may still be deferred against this very database, and the
    /// delete below would make them unreadable; force them out first.
    pub fn replace_document(
        &mut self,
        did: DocId,
        doc: &mut Document,
        val_stats: &mut BTreeMap<SlotNo, ValueStats>,
    ) -> Result<Vec<u8>> {
        if doc.docid() == did {
            doc.materialize_values();
        }
        self.delete_document(did, val_stats)?;
        self.add_document(did, doc, val_stats)
    }

    /// Fold every buffered edit into the chunk storage.
    pub fn merge_changes(&mut self) -> Result<()> {
        // The tables are about to change under the cached cursor.
        *self.cursor.lock() = None;
        let changes = std::mem::take(&mut self.changes);
        if changes.is_empty() {
            self.slots.clear();
            return Ok(());
        }
        debug!("merging value changes for {} slot(s)", changes.len());
        for (slot, edits) in changes {
            let mut updater = ValueUpdater::new(self.postlist.as_ref(), slot);
            for (did, value) in edits {
                updater.update(did, &value)?;
            }
            updater.finish()?;
        }
        self.slots.clear();
        Ok(())
    }

    /// Write a batch of per-slot statistics, draining `val_stats`.
    pub fn set_value_stats(&mut self, val_stats: &mut BTreeMap<SlotNo, ValueStats>) -> Result<()> {
        write_value_stats(self.postlist.as_ref(), val_stats)?;
        val_stats.clear();
        self.mru_stats.lock().0 = BAD_SLOT;
        Ok(())
    }

    fn with_cached_stats<R>(
        &self,
        slot: SlotNo,
        f: impl FnOnce(&ValueStats) -> R,
    ) -> Result<R> {
        let mut mru = self.mru_stats.lock();
        if mru.0 != slot {
            // Invalidate before the read: a failed read must not
            // leave stale stats marked valid.
            mru.0 = BAD_SLOT;
            read_value_stats(self.postlist.as_ref(), slot, &mut mru.1)?;
            mru.0 = slot;
        }
        Ok(f(&mru.1))
    }

    /// Number of documents with a value in `slot`.
    pub fn value_freq(&self, slot: SlotNo) -> Result<u32> {
        self.with_cached_stats(slot, |stats| stats.freq)
    }

    /// Lexicographic lower bound over the values stored in `slot`.
    pub fn value_lower_bound(&self, slot: SlotNo) -> Result<Vec<u8>> {
        self.with_cached_stats(slot, |stats| stats.lower_bound.clone())
    }

    /// Lexicographic upper bound over the values stored in `slot`.
    pub fn value_upper_bound(&self, slot: SlotNo) -> Result<Vec<u8>> {
        self.with_cached_stats(slot, |stats| stats.upper_bound.clone())
    }

    /// Enumerate all values of one document via its slot-set entry.
    pub fn get_all_values(&self, did: DocId) -> Result<BTreeMap<SlotNo, Vec<u8>>> {
        if !self.termlist.is_open() {
            return Err(if !self.postlist.is_open() {
                Error::DatabaseClosed
            } else {
                Error::FeatureUnavailable("database has no termlist".into())
            });
        }

        let mut out = BTreeMap::new();
        let mut blob = Vec::new();
        if !self
            .termlist
            .get_exact_entry(&make_slots_key(did), &mut blob)?
        {
            return Ok(out);
        }
        for slot in decode_slot_set(&blob)? {
            out.insert(slot, self.get_value(did, slot)?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for ValueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueManager")
            .field("pending_slots", &self.changes.len())
            .field("batch_docs", &self.slots.len())
            .finish()
    }
}
