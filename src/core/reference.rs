//! Cross-reference bookkeeping.
//!
//! A Reference is a typed edge from a source address to a target address.
//! The ReferenceTable is a multimap keyed by target, preserving insertion
//! order per key; a caller-supplied index reorders a target's list
//! without losing earlier entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::address::AddressValue;

/// How the source uses the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Function call
    Call,
    /// Control transfer (conditional or not)
    Jump,
    /// Memory read
    Read,
    /// Memory write
    Write,
    /// Untyped data reference
    Data,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &str {
        match self {
            ReferenceKind::Call => "call",
            ReferenceKind::Jump => "jump",
            ReferenceKind::Read => "read",
            ReferenceKind::Write => "write",
            ReferenceKind::Data => "data",
        }
    }
}

/// A typed edge from a source address to a target address.
///
/// Targets are recorded even when they cannot be verified against the
/// loaded address space (external or unresolved locations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Address the reference originates from
    pub from: AddressValue,
    /// Address being referenced
    pub to: AddressValue,
    /// Reference type
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn new(from: AddressValue, to: AddressValue, kind: ReferenceKind) -> Self {
        Reference { from, to, kind }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.kind.as_str())
    }
}

/// Multimap of references keyed by target address.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    by_target: BTreeMap<AddressValue, Vec<Reference>>,
    total: usize,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference to its target's list, or insert it at `index`.
    /// An out-of-range index clamps to the end of the list.
    pub fn insert(&mut self, reference: Reference, index: Option<usize>) {
        let entries = self.by_target.entry(reference.to).or_default();
        let at = index.unwrap_or(entries.len()).min(entries.len());
        entries.insert(at, reference);
        self.total += 1;
    }

    /// Whether an identical (source, target, type) triple is recorded.
    pub fn contains(&self, from: &AddressValue, to: &AddressValue, kind: ReferenceKind) -> bool {
        self.by_target
            .get(to)
            .is_some_and(|entries| entries.iter().any(|r| r.from == *from && r.kind == kind))
    }

    /// References to `target` in insertion (or caller-requested) order.
    pub fn references_to(&self, target: &AddressValue) -> &[Reference] {
        self.by_target
            .get(target)
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_referenced(&self, target: &AddressValue) -> bool {
        self.by_target.contains_key(target)
    }

    /// Referenced targets in address order.
    pub fn targets(&self) -> impl Iterator<Item = &AddressValue> {
        self.by_target.keys()
    }

    /// Total number of references across all targets.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(from: u32, to: u32) -> Reference {
        Reference::new(
            AddressValue::u32(from),
            AddressValue::u32(to),
            ReferenceKind::Call,
        )
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let mut table = ReferenceTable::new();
        table.insert(call(0x1000, 0x3000), None);
        table.insert(call(0x2000, 0x3000), None);

        let refs = table.references_to(&AddressValue::u32(0x3000));
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].from.value, 0x1000);
        assert_eq!(refs[1].from.value, 0x2000);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_explicit_index_reorders() {
        let mut table = ReferenceTable::new();
        table.insert(call(0x1000, 0x3000), None);
        table.insert(call(0x2000, 0x3000), Some(0));

        let refs = table.references_to(&AddressValue::u32(0x3000));
        assert_eq!(refs[0].from.value, 0x2000);
        assert_eq!(refs[1].from.value, 0x1000);

        // Out-of-range index clamps to append
        table.insert(call(0x4000, 0x3000), Some(99));
        let refs = table.references_to(&AddressValue::u32(0x3000));
        assert_eq!(refs[2].from.value, 0x4000);
    }

    #[test]
    fn test_contains_triple() {
        let mut table = ReferenceTable::new();
        table.insert(call(0x1000, 0x3000), None);

        assert!(table.contains(
            &AddressValue::u32(0x1000),
            &AddressValue::u32(0x3000),
            ReferenceKind::Call
        ));
        assert!(!table.contains(
            &AddressValue::u32(0x1000),
            &AddressValue::u32(0x3000),
            ReferenceKind::Read
        ));
        assert!(!table.contains(
            &AddressValue::u32(0x9999),
            &AddressValue::u32(0x3000),
            ReferenceKind::Call
        ));
    }

    #[test]
    fn test_missing_target_is_empty() {
        let table = ReferenceTable::new();
        assert!(table.references_to(&AddressValue::u32(0x3000)).is_empty());
        assert!(!table.is_referenced(&AddressValue::u32(0x3000)));
        assert!(table.is_empty());
    }
}
