//! Key encodings for the postlist and termlist tables
//!
//! Three key families coexist in the postlist table: value chunks,
//! value stats, and whatever else the backend stores there. The two
//! reserved prefix bytes keep the families collision-free, and the
//! sort-preserving docid suffix makes an ascending scan over one
//! slot's chunk keys yield chunks in ascending docid order.

use crate::codec::{pack_uint, pack_uint_preserving_sort, unpack_uint, unpack_uint_preserving_sort};
use crate::error::Error;
use crate::{DocId, Result, SlotNo};

/// Prefix of every value-chunk key.
pub const VALUE_CHUNK_PREFIX: [u8; 2] = [0x00, 0xd8];

/// Prefix of every value-stats key. Sorts before all chunk keys.
pub const VALUE_STATS_PREFIX: [u8; 2] = [0x00, 0xd0];

/// Key of the value chunk for `slot` whose first docid is `did`.
pub fn make_valuechunk_key(slot: SlotNo, did: DocId) -> Vec<u8> {
    let mut key = VALUE_CHUNK_PREFIX.to_vec();
    pack_uint(&mut key, u64::from(slot));
    pack_uint_preserving_sort(&mut key, did);
    key
}

/// Key of the statistics entry for `slot`.
pub fn make_valuestats_key(slot: SlotNo) -> Vec<u8> {
    let mut key = VALUE_STATS_PREFIX.to_vec();
    pack_uint(&mut key, u64::from(slot));
    key
}

/// Termlist-table key of the per-document slot-set entry.
pub fn make_slots_key(did: DocId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    pack_uint_preserving_sort(&mut key, did);
    key
}

/// Extract the first docid from a candidate value-chunk key.
///
/// Returns 0 when `key` is not a value-chunk key for `slot` (wrong
/// prefix or a different slot). A key that carries the chunk prefix
/// and the right slot but a malformed docid suffix is corruption.
pub fn docid_from_key(slot: SlotNo, key: &[u8]) -> Result<DocId> {
    if key.len() < 2 || key[..2] != VALUE_CHUNK_PREFIX {
        return Ok(0);
    }
    let mut p = &key[2..];
    let found_slot =
        unpack_uint(&mut p).map_err(|_| Error::Corruption("bad value chunk key".into()))?;
    if found_slot != u64::from(slot) {
        return Ok(0);
    }
    let did = unpack_uint_preserving_sort(&mut p)
        .map_err(|_| Error::Corruption("bad value chunk key".into()))?;
    if !p.is_empty() {
        return Err(Error::Corruption("bad value chunk key".into()));
    }
    Ok(did)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_keys_sort_by_docid_within_slot() {
        let dids = [1u32, 2, 9, 255, 256, 1000, 1 << 16, 1 << 24];
        let keys: Vec<Vec<u8>> = dids.iter().map(|&d| make_valuechunk_key(7, d)).collect();
        for window in keys.windows(2) {
            assert!(window[0] < window[1]);
        }
    }

    #[test]
    fn test_slot_keyspaces_are_contiguous() {
        // Varint slot encodings are prefix-free, so no key of another
        // slot can fall between two keys of the same slot.
        let in_slot_low = make_valuechunk_key(200, 1);
        let in_slot_high = make_valuechunk_key(200, u32::MAX - 1);
        for other_slot in [0u32, 1, 199, 201, 300, 16384] {
            for did in [1u32, 1000, u32::MAX - 1] {
                let other = make_valuechunk_key(other_slot, did);
                assert!(other < in_slot_low || other > in_slot_high);
            }
        }
    }

    #[test]
    fn test_stats_keys_sort_before_chunk_keys() {
        assert!(make_valuestats_key(u32::MAX) < make_valuechunk_key(0, 1));
    }

    #[test]
    fn test_docid_from_key_roundtrip() {
        let key = make_valuechunk_key(42, 12345);
        assert_eq!(docid_from_key(42, &key).unwrap(), 12345);
    }

    #[test]
    fn test_docid_from_key_foreign_keys() {
        // Different slot, stats key, and arbitrary key all yield 0.
        let key = make_valuechunk_key(42, 12345);
        assert_eq!(docid_from_key(41, &key).unwrap(), 0);
        assert_eq!(docid_from_key(42, &make_valuestats_key(42)).unwrap(), 0);
        assert_eq!(docid_from_key(42, b"unrelated").unwrap(), 0);
        assert_eq!(docid_from_key(42, &[]).unwrap(), 0);
    }

    #[test]
    fn test_docid_from_key_corrupt_suffix() {
        let mut key = VALUE_CHUNK_PREFIX.to_vec();
        pack_uint(&mut key, 42);
        // Truncated docid suffix.
        key.push(4);
        key.push(0x01);
        assert!(docid_from_key(42, &key).is_err());

        // Trailing junk after a valid docid.
        let mut key = make_valuechunk_key(42, 7);
        key.push(0xff);
        assert!(docid_from_key(42, &key).is_err());
    }
}
