//! Segment type for named, typed address ranges.
//!
//! A Segment maps a region of the virtual address space back to offsets
//! in the backing store. Segments are created once during format loading
//! and are immutable thereafter; their ranges must not overlap.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::AddressValue;
use crate::error::{Result, ScathaError};

/// Classification of a segment's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Executable code
    Code,
    /// Initialized data
    Data,
    /// Uninitialized data (no backing bytes)
    Bss,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Code => write!(f, "Code"),
            SegmentKind::Data => write!(f, "Data"),
            SegmentKind::Bss => write!(f, "Bss"),
        }
    }
}

/// A named, typed address range mapping virtual addresses to file offsets.
///
/// `[start, start + size)` is the valid region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Human-readable name (e.g. "CODE", ".text")
    pub name: String,
    /// Contents classification
    pub kind: SegmentKind,
    /// First valid address (inclusive)
    pub start: AddressValue,
    /// Size of the region in bytes
    pub size: u64,
    /// Offset in the backing store where the segment's bytes begin
    pub base_offset: u64,
}

impl Segment {
    /// Create a new Segment.
    ///
    /// # Errors
    /// Returns an error if the size is zero or the range would extend
    /// past the address width.
    pub fn new(
        name: impl Into<String>,
        kind: SegmentKind,
        start: AddressValue,
        size: u64,
        base_offset: u64,
    ) -> Result<Self> {
        if size == 0 {
            return Err(ScathaError::InvalidInput("segment size cannot be 0".to_string()));
        }

        let end = start.value.checked_add(size).ok_or_else(|| {
            ScathaError::InvalidRange(format!(
                "segment at {} with size {:#x} overflows",
                start, size
            ))
        })?;
        if end > start.mask().wrapping_add(1) && start.bits < 64 {
            return Err(ScathaError::InvalidRange(format!(
                "segment at {} with size {:#x} exceeds {}-bit address space",
                start, size, start.bits
            )));
        }

        Ok(Segment {
            name: name.into(),
            kind,
            start,
            size,
            base_offset,
        })
    }

    /// One past the last valid address value.
    pub fn end_value(&self) -> u64 {
        self.start.value + self.size
    }

    /// One past the last valid address.
    pub fn end_address(&self) -> AddressValue {
        AddressValue::truncated(self.end_value(), self.start.bits)
    }

    /// Whether `address` falls within the valid region.
    pub fn contains(&self, address: &AddressValue) -> bool {
        address.value >= self.start.value && address.value < self.end_value()
    }

    /// Whether two segments' regions intersect.
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.start.value < other.end_value() && other.start.value < self.end_value()
    }

    /// Translate a contained virtual address to a backing-store offset.
    pub fn file_offset(&self, address: &AddressValue) -> Option<u64> {
        if !self.contains(address) {
            return None;
        }
        Some(self.base_offset + (address.value - self.start.value))
    }

    pub fn is_code(&self) -> bool {
        self.kind == SegmentKind::Code
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' [{}..{:x})",
            self.kind,
            self.name,
            self.start,
            self.end_value()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_segment() -> Segment {
        Segment::new(
            "CODE",
            SegmentKind::Code,
            AddressValue::u32(0x1000),
            0x1000,
            0x200,
        )
        .unwrap()
    }

    #[test]
    fn test_creation() {
        let seg = code_segment();
        assert_eq!(seg.name, "CODE");
        assert!(seg.is_code());
        assert_eq!(seg.end_value(), 0x2000);
    }

    #[test]
    fn test_zero_size_rejected() {
        let result = Segment::new("X", SegmentKind::Data, AddressValue::u32(0x1000), 0, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_width_overflow_rejected() {
        let result = Segment::new("X", SegmentKind::Data, AddressValue::u16(0xF000), 0x2000, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_contains() {
        let seg = code_segment();
        assert!(seg.contains(&AddressValue::u32(0x1000)));
        assert!(seg.contains(&AddressValue::u32(0x1FFF)));
        assert!(!seg.contains(&AddressValue::u32(0x2000)));
        assert!(!seg.contains(&AddressValue::u32(0xFFF)));
    }

    #[test]
    fn test_overlaps() {
        let seg = code_segment();
        let adjacent = Segment::new(
            "DATA",
            SegmentKind::Data,
            AddressValue::u32(0x2000),
            0x100,
            0x1200,
        )
        .unwrap();
        let inside = Segment::new(
            "B",
            SegmentKind::Code,
            AddressValue::u32(0x1050),
            0x100,
            0,
        )
        .unwrap();
        assert!(!seg.overlaps(&adjacent));
        assert!(seg.overlaps(&inside));
        assert!(inside.overlaps(&seg));
    }

    #[test]
    fn test_file_offset() {
        let seg = code_segment();
        assert_eq!(seg.file_offset(&AddressValue::u32(0x1000)), Some(0x200));
        assert_eq!(seg.file_offset(&AddressValue::u32(0x1500)), Some(0x700));
        assert_eq!(seg.file_offset(&AddressValue::u32(0x2000)), None);
    }
}
