//! Block type: the disjoint address-range units of the listing.
//!
//! Every byte the decoder has classified belongs to exactly one Block.
//! Blocks are kept in address-ascending order by the block index; the
//! total order below is the index's sort comparator.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::core::address::AddressValue;

/// Classification of a block's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// A decoded instruction
    Instruction,
    /// Classified data (e.g. a string)
    Data,
    /// Bytes not yet classified
    Unknown,
}

impl BlockKind {
    /// Tie-break rank for blocks sharing a start address:
    /// Instruction before Data before Unknown.
    fn rank(&self) -> u8 {
        match self {
            BlockKind::Instruction => 0,
            BlockKind::Data => 1,
            BlockKind::Unknown => 2,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Instruction => write!(f, "Instruction"),
            BlockKind::Data => write!(f, "Data"),
            BlockKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A disjoint address-range unit classified as instruction, data or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// First address covered (inclusive)
    pub start: AddressValue,
    /// Span in bytes
    pub size: u64,
    /// Contents classification
    pub kind: BlockKind,
}

impl Block {
    pub fn new(start: AddressValue, size: u64, kind: BlockKind) -> Self {
        Block { start, size, kind }
    }

    /// One past the last covered address value.
    pub fn end_value(&self) -> u64 {
        self.start.value + self.size
    }

    /// One past the last covered address.
    pub fn end_address(&self) -> AddressValue {
        AddressValue::truncated(self.end_value(), self.start.bits)
    }

    /// Whether `address` falls within the block's span.
    pub fn contains(&self, address: &AddressValue) -> bool {
        address.value >= self.start.value && address.value < self.end_value()
    }

    /// Whether two blocks' spans intersect.
    pub fn overlaps(&self, other: &Block) -> bool {
        self.start.value < other.end_value() && other.start.value < self.end_value()
    }

    pub fn is_instruction(&self) -> bool {
        self.kind == BlockKind::Instruction
    }
}

impl Ord for Block {
    /// Address-ascending; equal starts fall back to kind rank, then size,
    /// so duplicate-address blocks sort deterministically instead of
    /// reordering unpredictably.
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.kind.rank().cmp(&other.kind.rank()))
            .then_with(|| self.size.cmp(&other.size))
    }
}

impl PartialOrd for Block {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}..{:x})", self.kind, self.start, self.end_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span() {
        let block = Block::new(AddressValue::u32(0x1000), 4, BlockKind::Instruction);
        assert_eq!(block.end_value(), 0x1004);
        assert!(block.contains(&AddressValue::u32(0x1003)));
        assert!(!block.contains(&AddressValue::u32(0x1004)));
    }

    #[test]
    fn test_overlaps() {
        let a = Block::new(AddressValue::u32(0x1000), 4, BlockKind::Instruction);
        let b = Block::new(AddressValue::u32(0x1004), 4, BlockKind::Instruction);
        let c = Block::new(AddressValue::u32(0x1002), 4, BlockKind::Data);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_sort_order() {
        let mut blocks = [
            Block::new(AddressValue::u32(0x1008), 4, BlockKind::Instruction),
            Block::new(AddressValue::u32(0x1000), 4, BlockKind::Unknown),
            Block::new(AddressValue::u32(0x1000), 4, BlockKind::Instruction),
            Block::new(AddressValue::u32(0x1004), 4, BlockKind::Data),
        ];
        blocks.sort();
        assert_eq!(blocks[0].kind, BlockKind::Instruction);
        assert_eq!(blocks[0].start.value, 0x1000);
        assert_eq!(blocks[1].kind, BlockKind::Unknown);
        assert_eq!(blocks[2].start.value, 0x1004);
        assert_eq!(blocks[3].start.value, 0x1008);
    }
}
