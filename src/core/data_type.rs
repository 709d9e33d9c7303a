//! Opcode width/category enum.
//!
//! DataType describes the width and signedness of a decoded value: the
//! opcode type of an instruction, the size class of an operand, or the
//! width of listing-created addresses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ScathaError};

/// Width and signedness of a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
}

impl DataType {
    /// Width in bits.
    pub fn bits(&self) -> u8 {
        match self {
            DataType::UInt8 | DataType::Int8 => 8,
            DataType::UInt16 | DataType::Int16 => 16,
            DataType::UInt32 | DataType::Int32 => 32,
            DataType::UInt64 | DataType::Int64 => 64,
        }
    }

    /// Width in bytes.
    pub fn bytes(&self) -> u64 {
        (self.bits() / 8) as u64
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    /// Maximum unsigned value representable at this width.
    pub fn max_value(&self) -> u64 {
        match self.bits() {
            8 => 0xFF,
            16 => 0xFFFF,
            32 => 0xFFFF_FFFF,
            _ => u64::MAX,
        }
    }

    /// Type for a given width and signedness.
    pub fn from_bits(bits: u8, signed: bool) -> Result<Self> {
        match (bits, signed) {
            (8, false) => Ok(DataType::UInt8),
            (16, false) => Ok(DataType::UInt16),
            (32, false) => Ok(DataType::UInt32),
            (64, false) => Ok(DataType::UInt64),
            (8, true) => Ok(DataType::Int8),
            (16, true) => Ok(DataType::Int16),
            (32, true) => Ok(DataType::Int32),
            (64, true) => Ok(DataType::Int64),
            _ => Err(ScathaError::InvalidInput(format!(
                "no data type with width {} bits",
                bits
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::UInt8 => write!(f, "u8"),
            DataType::UInt16 => write!(f, "u16"),
            DataType::UInt32 => write!(f, "u32"),
            DataType::UInt64 => write!(f, "u64"),
            DataType::Int8 => write!(f, "i8"),
            DataType::Int16 => write!(f, "i16"),
            DataType::Int32 => write!(f, "i32"),
            DataType::Int64 => write!(f, "i64"),
        }
    }
}
