//! Address value type for the listing engine.
//!
//! This module provides the AddressValue type that keys every lookup in
//! the listing: blocks, segments, functions, instructions, symbols and
//! references are all indexed by it. An AddressValue carries a numeric
//! value together with its bit width and display radix, but ordering,
//! equality and hashing are defined purely by the numeric value so that
//! the same location compares equal regardless of how it is rendered.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Result, ScathaError};

/// Display radix for an address or immediate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Radix {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn base(&self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }
}

/// A variable-width numeric value used as the address key type.
///
/// The width and radix are carried for rendering and serialization only;
/// two values with the same numeric value are the same address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddressValue {
    /// The numeric value
    pub value: u64,
    /// Bit width (8, 16, 32, or 64)
    pub bits: u8,
    /// Display radix
    pub radix: Radix,
}

impl AddressValue {
    /// Create a new AddressValue.
    ///
    /// # Errors
    /// Returns an error if bits is not 8, 16, 32, or 64, or if the value
    /// does not fit in the declared width.
    pub fn new(value: u64, bits: u8, radix: Radix) -> Result<Self> {
        if !Self::valid_bits(bits) {
            return Err(ScathaError::InvalidInput(format!(
                "bits must be 8, 16, 32, or 64, got {}",
                bits
            )));
        }

        if value > Self::mask_for(bits) {
            return Err(ScathaError::InvalidInput(format!(
                "value {:#x} exceeds maximum for {}-bit address",
                value, bits
            )));
        }

        Ok(AddressValue { value, bits, radix })
    }

    /// Create a value truncated to the given width.
    ///
    /// Unlike `new`, out-of-range values are masked rather than rejected;
    /// an unsupported width falls back to 64 bits.
    pub fn truncated(value: u64, bits: u8) -> Self {
        let bits = if Self::valid_bits(bits) { bits } else { 64 };
        AddressValue {
            value: value & Self::mask_for(bits),
            bits,
            radix: Radix::Hexadecimal,
        }
    }

    /// 8-bit hexadecimal value.
    pub fn u8(value: u8) -> Self {
        AddressValue {
            value: value as u64,
            bits: 8,
            radix: Radix::Hexadecimal,
        }
    }

    /// 16-bit hexadecimal value.
    pub fn u16(value: u16) -> Self {
        AddressValue {
            value: value as u64,
            bits: 16,
            radix: Radix::Hexadecimal,
        }
    }

    /// 32-bit hexadecimal value.
    pub fn u32(value: u32) -> Self {
        AddressValue {
            value: value as u64,
            bits: 32,
            radix: Radix::Hexadecimal,
        }
    }

    /// 64-bit hexadecimal value.
    pub fn u64(value: u64) -> Self {
        AddressValue {
            value,
            bits: 64,
            radix: Radix::Hexadecimal,
        }
    }

    /// Same value rendered in a different radix.
    pub fn with_radix(mut self, radix: Radix) -> Self {
        self.radix = radix;
        self
    }

    fn valid_bits(bits: u8) -> bool {
        matches!(bits, 8 | 16 | 32 | 64)
    }

    fn mask_for(bits: u8) -> u64 {
        match bits {
            8 => 0xFF,
            16 => 0xFFFF,
            32 => 0xFFFF_FFFF,
            _ => u64::MAX,
        }
    }

    /// Maximum value representable at this width.
    pub fn mask(&self) -> u64 {
        Self::mask_for(self.bits)
    }

    /// Add an offset, rejecting overflow past the declared width.
    pub fn add(&self, offset: u64) -> Result<Self> {
        let value = self
            .value
            .checked_add(offset)
            .filter(|v| *v <= self.mask())
            .ok_or_else(|| {
                ScathaError::InvalidInput(format!(
                    "{:#x} + {:#x} overflows a {}-bit address",
                    self.value, offset, self.bits
                ))
            })?;

        Ok(AddressValue { value, ..*self })
    }

    /// Subtract an offset, rejecting underflow.
    pub fn sub(&self, offset: u64) -> Result<Self> {
        let value = self.value.checked_sub(offset).ok_or_else(|| {
            ScathaError::InvalidInput(format!(
                "{:#x} - {:#x} underflows",
                self.value, offset
            ))
        })?;

        Ok(AddressValue { value, ..*self })
    }

    /// Distance from `other` to `self`, when non-negative.
    pub fn offset_from(&self, other: &AddressValue) -> Option<u64> {
        self.value.checked_sub(other.value)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ScathaError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| ScathaError::Serialization(e.to_string()))
    }

    /// Serialize to binary format.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ScathaError::Serialization(e.to_string()))
    }

    /// Deserialize from binary format.
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| ScathaError::Serialization(e.to_string()))
    }
}

impl fmt::Display for AddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.radix {
            // Addresses render zero-padded to their nibble width, listing style
            Radix::Hexadecimal => {
                write!(f, "{:0width$x}", self.value, width = (self.bits / 4) as usize)
            }
            Radix::Decimal => write!(f, "{}", self.value),
            Radix::Octal => write!(f, "{:o}", self.value),
            Radix::Binary => write!(f, "{:b}", self.value),
        }
    }
}

impl PartialEq for AddressValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for AddressValue {}

impl Hash for AddressValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Ord for AddressValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl PartialOrd for AddressValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
