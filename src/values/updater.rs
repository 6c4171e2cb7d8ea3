//! Per-slot chunk updater
//!
//! One updater folds a strictly docid-ascending stream of edits for a
//! single slot into that slot's existing chunks. It copies untouched
//! entries through, drops entries superseded by the edits, and writes
//! chunks back under their (possibly shifted) first-docid keys, forcing
//! a chunk boundary whenever the output tag reaches the size threshold.
//!
//! Finalization is explicit: [`ValueUpdater::finish`] drains whatever
//! remains of the chunk being read and writes the last tag. Dropping an
//! unfinished updater loses that trailing write, so `merge_changes`
//! always calls `finish` after the last edit of a slot.

use log::trace;

use crate::codec::{pack_string, pack_uint};
use crate::error::Error;
use crate::table::{Table, TableCursor};
use crate::values::chunk::ValueChunkReader;
use crate::values::keys::{docid_from_key, make_valuechunk_key};
use crate::{DocId, MAX_DOCID, Result, SlotNo};

/// Once a chunk tag reaches this many bytes a chunk boundary is forced.
pub const CHUNK_SIZE_THRESHOLD: usize = 2000;

/// Merges ascending (docid, value) edits for one slot into the table.
pub struct ValueUpdater<'a> {
    table: &'a dyn Table,
    slot: SlotNo,
    reader: ValueChunkReader,
    tag: Vec<u8>,
    prev_did: DocId,
    first_did: DocId,
    new_first_did: DocId,
    last_allowed_did: DocId,
}

impl<'a> ValueUpdater<'a> {
    pub fn new(table: &'a dyn Table, slot: SlotNo) -> Self {
        Self {
            table,
            slot,
            reader: ValueChunkReader::new(),
            tag: Vec::new(),
            prev_did: 0,
            first_did: 0,
            new_first_did: 0,
            last_allowed_did: 0,
        }
    }

    fn append_to_stream(&mut self, did: DocId, value: &[u8]) -> Result<()> {
        debug_assert!(did != 0);
        if self.tag.is_empty() {
            self.new_first_did = did;
        } else {
            debug_assert!(did > self.prev_did);
            pack_uint(&mut self.tag, u64::from(did - self.prev_did - 1));
        }
        self.prev_did = did;
        pack_string(&mut self.tag, value);
        if self.tag.len() >= CHUNK_SIZE_THRESHOLD {
            self.write_tag()?;
        }
        Ok(())
    }

    fn write_tag(&mut self) -> Result<()> {
        // If the first docid has changed, the old key must go.
        if self.first_did != 0 && self.new_first_did != self.first_did {
            self.table
                .del(&make_valuechunk_key(self.slot, self.first_did))?;
        }
        if !self.tag.is_empty() {
            trace!(
                "slot {}: writing chunk first_did={} ({} bytes)",
                self.slot,
                self.new_first_did,
                self.tag.len()
            );
            self.table
                .add(&make_valuechunk_key(self.slot, self.new_first_did), &self.tag)?;
        }
        self.first_did = 0;
        self.tag.clear();
        Ok(())
    }

    /// Copy the rest of the chunk being read into the output.
    fn drain_reader(&mut self) -> Result<()> {
        while !self.reader.at_end() {
            let did = self.reader.docid();
            let value = self.reader.value().to_vec();
            self.append_to_stream(did, &value)?;
            self.reader.next()?;
        }
        Ok(())
    }

    /// Apply one edit. `did` values must be strictly increasing across
    /// the updater's lifetime; an empty `value` deletes the entry.
    pub fn update(&mut self, did: DocId, value: &[u8]) -> Result<()> {
        if self.last_allowed_did != 0 && did > self.last_allowed_did {
            // This edit belongs to a later existing chunk. Copy the
            // rest of the current chunk through, write it out, and
            // drop into the seek below.
            while !self.reader.at_end() {
                debug_assert!(self.reader.docid() <= self.last_allowed_did);
                let rdid = self.reader.docid();
                let rvalue = self.reader.value().to_vec();
                self.append_to_stream(rdid, &rvalue)?;
                self.reader.next()?;
            }
            self.write_tag()?;
            self.last_allowed_did = 0;
        }
        if self.last_allowed_did == 0 {
            self.last_allowed_did = MAX_DOCID;
            debug_assert!(self.tag.is_empty());
            self.new_first_did = 0;

            let mut cursor = self.table.cursor().ok_or(Error::DatabaseClosed)?;
            if cursor.find_entry(&make_valuechunk_key(self.slot, did)) {
                // Exact match: the chunk starts at the edit's docid.
                self.first_did = did;
            } else {
                debug_assert!(!cursor.after_end());
                // A non-value-chunk key here means no preceding chunk.
                self.first_did = docid_from_key(self.slot, cursor.current_key())?;
            }

            if self.first_did != 0 {
                trace!("slot {}: opening chunk first_did={}", self.slot, self.first_did);
                let ctag = cursor.read_tag().to_vec();
                self.reader.assign(ctag, self.first_did)?;
            }

            // The open chunk may grow up to just below the next
            // chunk's first docid, or to the docid limit if none.
            if cursor.next() {
                let next_first_did = docid_from_key(self.slot, cursor.current_key())?;
                if next_first_did != 0 {
                    self.last_allowed_did = next_first_did - 1;
                }
                debug_assert!(self.last_allowed_did != 0);
                debug_assert!(self.last_allowed_did >= self.first_did);
            }
        }

        // Copy entries below the edit through, drop a superseded entry,
        // then append the new value unless the edit is a deletion.
        while !self.reader.at_end() && self.reader.docid() < did {
            let rdid = self.reader.docid();
            let rvalue = self.reader.value().to_vec();
            self.append_to_stream(rdid, &rvalue)?;
            self.reader.next()?;
        }
        if !self.reader.at_end() && self.reader.docid() == did {
            self.reader.next()?;
        }
        if !value.is_empty() {
            self.append_to_stream(did, value)?;
        }
        Ok(())
    }

    /// Drain the chunk being read and write the final tag. Must be
    /// called after the last edit; errors here are real write errors.
    pub fn finish(mut self) -> Result<()> {
        self.drain_reader()?;
        self.write_tag()
    }
}
