//! Instruction and Operand types for decoded instructions.
//!
//! An Instruction is the refinement of an Instruction block: exactly one
//! exists per decoded address. Decoders create one through the listing,
//! then populate its mnemonic, category and operands. The span is owned
//! by the listing so that the instruction and its block never disagree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::AddressValue;
use crate::core::block::{Block, BlockKind};
use crate::core::data_type::DataType;

/// Semantic category of a decoded instruction, driving reference typing
/// and function-bounds computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionCategory {
    /// Not yet classified by the decoder
    Undefined,
    Call,
    /// Unconditional jump (no fallthrough)
    Jump,
    ConditionalJump,
    /// Function return (no fallthrough)
    Return,
    Load,
    Store,
    Move,
    Arithmetic,
    Logical,
    Compare,
    Nop,
    /// Synthesized by block-range replacement
    Pseudo,
    /// Failed to decode
    Invalid,
}

impl InstructionCategory {
    pub fn is_control_transfer(&self) -> bool {
        matches!(
            self,
            InstructionCategory::Call
                | InstructionCategory::Jump
                | InstructionCategory::ConditionalJump
                | InstructionCategory::Return
        )
    }

    /// Whether execution never falls through to the next address.
    pub fn is_terminator(&self) -> bool {
        matches!(self, InstructionCategory::Jump | InstructionCategory::Return)
    }
}

/// How an instruction uses an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn is_read(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// Types of operands that can appear in instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    /// Register operand; never resolves to an address
    Register,
    /// Immediate value, possibly a memory address
    Immediate,
    /// Direct memory reference
    Memory,
    /// PC-relative target, stored already resolved to an absolute value
    Relative,
    /// Stack/register-relative pseudo-address, not a real memory location
    StackRelative,
}

/// A decoded component of an instruction.
///
/// An operand resolves to zero or one address: Immediate, Memory and
/// Relative operands may point into the address space, Register operands
/// never do, and StackRelative operands carry a pseudo-address that is
/// tracked as a variable instead of a memory reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    /// Operand type
    pub kind: OperandKind,
    /// Decoded numeric value (register number, immediate, displacement)
    pub value: i64,
    /// Size class of the operand
    pub size: DataType,
    /// Access type
    pub access: Access,
    /// Fallback string representation
    pub text: String,
}

impl Operand {
    /// Register operand.
    pub fn register(name: impl Into<String>, size: DataType, access: Access) -> Self {
        Self {
            kind: OperandKind::Register,
            value: 0,
            size,
            access,
            text: name.into(),
        }
    }

    /// Immediate operand.
    pub fn immediate(value: i64, size: DataType) -> Self {
        Self {
            kind: OperandKind::Immediate,
            value,
            size,
            access: Access::Read,
            text: format!("{:#x}", value),
        }
    }

    /// Direct memory operand.
    pub fn memory(address: u64, size: DataType, access: Access) -> Self {
        Self {
            kind: OperandKind::Memory,
            value: address as i64,
            size,
            access,
            text: format!("[{:#x}]", address),
        }
    }

    /// PC-relative operand, with the target already resolved by the decoder.
    pub fn relative(target: u64, size: DataType) -> Self {
        Self {
            kind: OperandKind::Relative,
            value: target as i64,
            size,
            access: Access::Read,
            text: format!("{:#x}", target),
        }
    }

    /// Stack-relative pseudo-address operand.
    pub fn stack_relative(offset: i64, size: DataType, access: Access) -> Self {
        let text = if offset >= 0 {
            format!("[sp+{:#x}]", offset)
        } else {
            format!("[sp-{:#x}]", -offset)
        };
        Self {
            kind: OperandKind::StackRelative,
            value: offset,
            size,
            access,
            text,
        }
    }

    /// The address this operand resolves to, if any.
    ///
    /// Pseudo-addresses (stack-relative) and registers resolve to none.
    pub fn target_address(&self, bits: u8) -> Option<AddressValue> {
        match self.kind {
            OperandKind::Immediate | OperandKind::Memory | OperandKind::Relative => {
                if self.value < 0 {
                    return None;
                }
                Some(AddressValue::truncated(self.value as u64, bits))
            }
            OperandKind::Register | OperandKind::StackRelative => None,
        }
    }

    /// Whether the operand carries a stack/register-relative pseudo-address.
    pub fn is_pseudo_address(&self) -> bool {
        self.kind == OperandKind::StackRelative
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Decoded instruction at a specific address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Address where this instruction is located
    pub address: AddressValue,
    /// Opcode width class
    pub opcode_type: DataType,
    /// Semantic category
    pub category: InstructionCategory,
    /// Instruction mnemonic (e.g. "mov", "call")
    pub mnemonic: String,
    /// Decoded operands
    pub operands: Vec<Operand>,
    /// Span in bytes; kept in sync with the instruction's block by the
    /// listing, which is why it is not directly writable
    size: u64,
    valid: bool,
}

impl Instruction {
    /// A freshly registered, not-yet-classified instruction.
    pub(crate) fn undefined(address: AddressValue, opcode_type: DataType) -> Self {
        Instruction {
            address,
            opcode_type,
            category: InstructionCategory::Undefined,
            mnemonic: String::new(),
            operands: Vec::new(),
            size: opcode_type.bytes(),
            valid: true,
        }
    }

    /// A synthesized instruction spanning a replaced block range.
    pub(crate) fn pseudo(
        address: AddressValue,
        size: u64,
        mnemonic: impl Into<String>,
        category: InstructionCategory,
        opcode_type: DataType,
    ) -> Self {
        Instruction {
            address,
            opcode_type,
            category,
            mnemonic: mnemonic.into(),
            operands: Vec::new(),
            size,
            valid: true,
        }
    }

    /// Span in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn set_mnemonic(&mut self, mnemonic: impl Into<String>) {
        self.mnemonic = mnemonic.into();
    }

    pub fn set_category(&mut self, category: InstructionCategory) {
        self.category = category;
    }

    pub fn push_operand(&mut self, operand: Operand) {
        self.operands.push(operand);
    }

    /// Whether the instruction decoded successfully.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn mark_invalid(&mut self) {
        self.valid = false;
        self.category = InstructionCategory::Invalid;
    }

    /// The block covering this instruction's span.
    pub fn block(&self) -> Block {
        Block::new(self.address, self.size, BlockKind::Instruction)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.mnemonic)
    }
}
