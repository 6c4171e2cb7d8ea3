//! Per-document slot-set encoding
//!
//! The termlist table records, per document, which value slots the
//! document populates. The entry is one header byte plus payload:
//!
//! ```text
//! header 0x00            no value slots
//! header & 0x80 == 0     7-slot bitmap: bit i set => slot i (legacy,
//!                        decode only)
//! header & 0x80 != 0     low 7 bits are the payload size (0 => a
//!                        pack_uint size follows); the payload is
//!                        pack_uint(last_slot) and, for more than one
//!                        slot, an interpolative stream of the rest
//! ```
//!
//! The interpolative payload encodes `first_slot` against `last_slot`,
//! then `count - 2` against the span, then the interior slots; a
//! payload that ends right after `last_slot` is the single-slot case.

use crate::codec::{BitReader, BitWriter, pack_uint, unpack_uint};
use crate::error::Error;
use crate::{Result, SlotNo};

/// Encode an ascending, non-empty slot set as a complete termlist
/// entry (header byte included).
pub fn encode_slot_set(slots: &[SlotNo]) -> Vec<u8> {
    debug_assert!(!slots.is_empty());
    debug_assert!(slots.windows(2).all(|w| w[0] < w[1]));

    let count = slots.len();
    let first_slot = slots[0];
    let last_slot = slots[count - 1];

    let mut payload = Vec::new();
    pack_uint(&mut payload, u64::from(last_slot));
    if count > 1 {
        let mut writer = BitWriter::new(payload);
        writer.encode(first_slot, last_slot);
        writer.encode((count - 2) as u32, last_slot - first_slot);
        writer.encode_interpolative(slots, 0, count - 1);
        payload = writer.freeze();
    }

    let mut out = Vec::with_capacity(payload.len() + 2);
    if payload.len() <= 0x7f {
        out.push(0x80 | payload.len() as u8);
    } else {
        out.push(0x80);
        pack_uint(&mut out, payload.len() as u64);
    }
    out.extend_from_slice(&payload);
    out
}

fn corrupt() -> Error {
    Error::Corruption("slots used data corrupt".into())
}

/// Decode a termlist slot-set entry into an ascending slot vector.
///
/// Accepts the empty entry, the legacy 7-slot bitmap, and the
/// interpolative form produced by [`encode_slot_set`].
pub fn decode_slot_set(data: &[u8]) -> Result<Vec<SlotNo>> {
    let Some(&header) = data.first() else {
        return Ok(Vec::new());
    };
    if header == 0 {
        return Ok(Vec::new());
    }

    if header & 0x80 == 0 {
        // 7-bit bitmap of slots 0..7.
        let mut slots = Vec::new();
        for slot in 0..7 {
            if header & (1 << slot) != 0 {
                slots.push(slot as SlotNo);
            }
        }
        return Ok(slots);
    }

    let mut p = &data[1..];
    let mut enc_size = u64::from(header & 0x7f);
    if enc_size == 0 {
        enc_size = unpack_uint(&mut p).map_err(|_| corrupt())?;
    }
    let enc_size = usize::try_from(enc_size).map_err(|_| corrupt())?;
    if enc_size > p.len() {
        return Err(corrupt());
    }
    let payload = &p[..enc_size];

    let mut q = payload;
    let last_slot = unpack_uint(&mut q).map_err(|_| corrupt())?;
    let last_slot = u32::try_from(last_slot).map_err(|_| corrupt())?;
    if q.is_empty() {
        return Ok(vec![last_slot]);
    }

    let mut reader = BitReader::new(q);
    let first_slot = reader.decode(last_slot).map_err(|_| corrupt())?;
    let slot_count = reader
        .decode(last_slot - first_slot)
        .map_err(|_| corrupt())? as usize
        + 2;
    reader.decode_interpolative(0, slot_count - 1, first_slot, last_slot);

    let mut slots = Vec::with_capacity(slot_count);
    slots.push(first_slot);
    for _ in 1..slot_count {
        slots.push(reader.decode_interpolative_next().map_err(|_| corrupt())?);
    }
    debug_assert_eq!(*slots.last().unwrap(), last_slot);
    Ok(slots)
}
