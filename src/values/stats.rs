//! Per-slot value statistics
//!
//! Each used slot has an entry `pack_uint(freq) ‖ pack_string(lower) ‖
//! upper` in the postlist table, where an empty trailing upper means
//! the bounds are equal (empty values are never stored, so a real
//! upper bound is never empty). Bounds widen on insert and are only
//! reset when the frequency drops to zero.

use std::collections::BTreeMap;

use crate::codec::{UnpackError, pack_string, pack_uint, unpack_string, unpack_uint};
use crate::error::Error;
use crate::table::Table;
use crate::values::keys::make_valuestats_key;
use crate::{Result, SlotNo};

/// Statistics for one value slot: document frequency and the
/// lexicographic envelope of the stored values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueStats {
    /// Number of documents with a value in this slot.
    pub freq: u32,
    /// Lexicographic lower bound over the stored values.
    pub lower_bound: Vec<u8>,
    /// Lexicographic upper bound over the stored values.
    pub upper_bound: Vec<u8>,
}

impl ValueStats {
    pub fn clear(&mut self) {
        self.freq = 0;
        self.lower_bound.clear();
        self.upper_bound.clear();
    }
}

/// Read the statistics entry for `slot` into `stats`; absent entries
/// leave `stats` cleared.
pub fn read_value_stats(table: &dyn Table, slot: SlotNo, stats: &mut ValueStats) -> Result<()> {
    let mut tag = Vec::new();
    if !table.get_exact_entry(&make_valuestats_key(slot), &mut tag)? {
        stats.clear();
        return Ok(());
    }

    let mut p = tag.as_slice();
    let freq = unpack_uint(&mut p).map_err(|e| match e {
        UnpackError::Truncated => Error::Corruption("incomplete stats item in value table".into()),
        UnpackError::Overflow => {
            Error::Range("frequency statistic in value table is too large".into())
        }
    })?;
    stats.freq = u32::try_from(freq)
        .map_err(|_| Error::Range("frequency statistic in value table is too large".into()))?;

    let lower = unpack_string(&mut p).map_err(|e| match e {
        UnpackError::Truncated => Error::Corruption("incomplete stats item in value table".into()),
        UnpackError::Overflow => Error::Range("lower bound in value table is too large".into()),
    })?;
    stats.lower_bound = lower.to_vec();
    stats.upper_bound = if p.is_empty() {
        stats.lower_bound.clone()
    } else {
        p.to_vec()
    };
    Ok(())
}

/// Write every entry of `val_stats` to the table. Slots whose
/// frequency dropped to zero have their entry deleted.
pub fn write_value_stats(table: &dyn Table, val_stats: &BTreeMap<SlotNo, ValueStats>) -> Result<()> {
    for (&slot, stats) in val_stats {
        let key = make_valuestats_key(slot);
        if stats.freq != 0 {
            let mut tag = Vec::new();
            pack_uint(&mut tag, u64::from(stats.freq));
            pack_string(&mut tag, &stats.lower_bound);
            // Empty values are never stored, so an empty trailing
            // upper bound unambiguously means "equal to lower".
            if stats.lower_bound != stats.upper_bound {
                tag.extend_from_slice(&stats.upper_bound);
            }
            table.add(&key, &tag)?;
        } else {
            table.del(&key)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::MemTable;

    fn stats(freq: u32, lower: &[u8], upper: &[u8]) -> ValueStats {
        ValueStats {
            freq,
            lower_bound: lower.to_vec(),
            upper_bound: upper.to_vec(),
        }
    }

    fn write_one(table: &MemTable, slot: SlotNo, s: ValueStats) {
        let mut batch = BTreeMap::new();
        batch.insert(slot, s);
        write_value_stats(table, &batch).unwrap();
    }

    #[test]
    fn test_roundtrip() {
        let table = MemTable::new();
        write_one(&table, 3, stats(17, b"apple", b"zebra"));

        let mut out = ValueStats::default();
        read_value_stats(&table, 3, &mut out).unwrap();
        assert_eq!(out, stats(17, b"apple", b"zebra"));
    }

    #[test]
    fn test_equal_bounds_stored_once() {
        let table = MemTable::new();
        write_one(&table, 3, stats(1, b"same", b"same"));

        // On disk the upper bound is elided.
        let mut tag = Vec::new();
        assert!(table.get_exact_entry(&make_valuestats_key(3), &mut tag).unwrap());
        let mut expected = Vec::new();
        pack_uint(&mut expected, 1);
        pack_string(&mut expected, b"same");
        assert_eq!(tag, expected);

        let mut out = ValueStats::default();
        read_value_stats(&table, 3, &mut out).unwrap();
        assert_eq!(out, stats(1, b"same", b"same"));
    }

    #[test]
    fn test_absent_clears() {
        let table = MemTable::new();
        let mut out = stats(5, b"a", b"b");
        read_value_stats(&table, 9, &mut out).unwrap();
        assert_eq!(out, ValueStats::default());
    }

    #[test]
    fn test_zero_freq_deletes_entry() {
        let table = MemTable::new();
        write_one(&table, 3, stats(2, b"a", b"b"));
        assert_eq!(table.len(), 1);
        write_one(&table, 3, stats(0, b"", b""));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_truncated_entry_is_corruption() {
        let table = MemTable::new();
        table.add(&make_valuestats_key(3), &[0x80]).unwrap();
        let mut out = ValueStats::default();
        assert!(matches!(
            read_value_stats(&table, 3, &mut out),
            Err(Error::Corruption(_))
        ));

        // Frequency present but the lower bound is cut short.
        let mut tag = Vec::new();
        pack_uint(&mut tag, 4);
        pack_uint(&mut tag, 100);
        tag.push(b'x');
        table.add(&make_valuestats_key(4), &tag).unwrap();
        assert!(matches!(
            read_value_stats(&table, 4, &mut out),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_oversized_freq_is_range_error() {
        let table = MemTable::new();
        // A frequency beyond u32.
        let mut tag = Vec::new();
        pack_uint(&mut tag, u64::from(u32::MAX) + 1);
        pack_string(&mut tag, b"a");
        table.add(&make_valuestats_key(3), &tag).unwrap();
        let mut out = ValueStats::default();
        assert!(matches!(
            read_value_stats(&table, 3, &mut out),
            Err(Error::Range(_))
        ));

        // A varint beyond u64 entirely.
        let mut tag = vec![0xff; 10];
        tag.push(0x01);
        table.add(&make_valuestats_key(4), &tag).unwrap();
        assert!(matches!(
            read_value_stats(&table, 4, &mut out),
            Err(Error::Range(_))
        ));
    }
}
