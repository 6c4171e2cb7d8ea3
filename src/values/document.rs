//! Document view consumed by the value manager
//!
//! The manager only needs three things from a document: its id, an
//! ascending iteration over (slot, value) pairs, and the ability to
//! force deferred values to be fetched before a replace rewrites the
//! storage they would be fetched from.

use std::collections::BTreeMap;

use crate::{DocId, SlotNo};

type FetchFn = Box<dyn FnOnce() -> BTreeMap<SlotNo, Vec<u8>> + Send>;

/// A document's value slots.
///
/// Values may be deferred behind a fetch closure (a document freshly
/// read from a database fetches its values lazily); iteration sees
/// nothing until [`materialize_values`](Self::materialize_values) runs.
pub struct Document {
    did: DocId,
    values: BTreeMap<SlotNo, Vec<u8>>,
    deferred: Option<FetchFn>,
}

impl Document {
    pub fn new(did: DocId) -> Self {
        Self {
            did,
            values: BTreeMap::new(),
            deferred: None,
        }
    }

    /// A document whose values are fetched on demand.
    pub fn with_deferred_values(
        did: DocId,
        fetch: impl FnOnce() -> BTreeMap<SlotNo, Vec<u8>> + Send + 'static,
    ) -> Self {
        Self {
            did,
            values: BTreeMap::new(),
            deferred: Some(Box::new(fetch)),
        }
    }

    pub fn docid(&self) -> DocId {
        self.did
    }

    /// Set the value for a slot. Setting an empty value removes it.
    pub fn set_value(&mut self, slot: SlotNo, value: &[u8]) {
        if value.is_empty() {
            self.values.remove(&slot);
        } else {
            self.values.insert(slot, value.to_vec());
        }
    }

    /// Run the deferred fetch, if any.
    pub fn materialize_values(&mut self) {
        if let Some(fetch) = self.deferred.take() {
            let mut fetched = fetch();
            fetched.retain(|_, v| !v.is_empty());
            self.values = fetched;
        }
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Iterate (slot, value) pairs in ascending slot order.
    pub fn slot_values(&self) -> impl Iterator<Item = (SlotNo, &[u8])> + '_ {
        self.values.iter().map(|(&slot, v)| (slot, v.as_slice()))
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("did", &self.did)
            .field("values", &self.values)
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_iterate_in_slot_order() {
        let mut doc = Document::new(1);
        doc.set_value(9, b"z");
        doc.set_value(3, b"x");
        doc.set_value(5, b"y");
        let slots: Vec<SlotNo> = doc.slot_values().map(|(s, _)| s).collect();
        assert_eq!(slots, vec![3, 5, 9]);
    }

    #[test]
    fn test_empty_value_removes_slot() {
        let mut doc = Document::new(1);
        doc.set_value(3, b"x");
        doc.set_value(3, b"");
        assert_eq!(doc.value_count(), 0);
    }

    #[test]
    fn test_deferred_values_need_materialize() {
        let mut doc = Document::with_deferred_values(1, || {
            let mut m = BTreeMap::new();
            m.insert(2, b"late".to_vec());
            m
        });
        assert_eq!(doc.value_count(), 0);
        doc.materialize_values();
        assert_eq!(doc.value_count(), 1);
        assert_eq!(doc.slot_values().next(), Some((2, &b"late"[..])));
    }
}
