//! The listing: the in-memory representation of a decoded binary.
//!
//! A [`Listing`] aggregates everything analysis discovers about a binary:
//! segments, the address-sorted block sequence, decoded instructions,
//! functions with computed bounds, symbols, constants and
//! cross-references. It is built incrementally by decode passes and
//! queried by formatting and scripting layers.
//!
//! The listing owns every entity it creates; the byte-storage backing is
//! borrowed and must outlive it. All operations are synchronous and
//! single-threaded.

pub mod block_index;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use tracing::{debug, warn};

use crate::analysis::operands::reference_kind;
use crate::analysis::strings::{printable_run, MAX_STRING_SCAN};
use crate::core::address::{AddressValue, Radix};
use crate::core::block::{Block, BlockKind};
use crate::core::data_type::DataType;
use crate::core::function::{Function, FunctionKind};
use crate::core::instruction::{Instruction, InstructionCategory};
use crate::core::reference::{Reference, ReferenceKind, ReferenceTable};
use crate::core::segment::{Segment, SegmentKind};
use crate::core::symbol::{ConstantTable, SymbolKind, SymbolTable};
use crate::error::{Result, ScathaError};
use crate::memory::ByteSource;

pub use block_index::BlockIndex;

/// The decoded representation of a binary.
pub struct Listing<'d> {
    data: &'d dyn ByteSource,
    address_bits: u8,
    blocks: BlockIndex,
    segments: BTreeMap<AddressValue, Segment>,
    functions: BTreeMap<AddressValue, Function>,
    instructions: BTreeMap<AddressValue, Instruction>,
    entry_points: Vec<AddressValue>,
    strings: BTreeSet<AddressValue>,
    variables: BTreeSet<AddressValue>,
    references: ReferenceTable,
    symbols: SymbolTable,
    constants: ConstantTable,
}

impl<'d> Listing<'d> {
    /// Create an empty listing over `data`.
    ///
    /// `address_bits` sets the width of every address the listing
    /// creates (8, 16, 32 or 64).
    pub fn new(data: &'d dyn ByteSource, address_bits: u8) -> Result<Self> {
        // Reuse the width validation of the address constructor
        AddressValue::new(0, address_bits, Radix::Hexadecimal)?;

        Ok(Listing {
            data,
            address_bits,
            blocks: BlockIndex::new(),
            segments: BTreeMap::new(),
            functions: BTreeMap::new(),
            instructions: BTreeMap::new(),
            entry_points: Vec::new(),
            strings: BTreeSet::new(),
            variables: BTreeSet::new(),
            references: ReferenceTable::new(),
            symbols: SymbolTable::new(),
            constants: ConstantTable::new(),
        })
    }

    /// Width of listing-created addresses.
    pub fn address_bits(&self) -> u8 {
        self.address_bits
    }

    /// Change the width of listing-created addresses. Existing entries
    /// keep the width they were created with.
    pub fn set_address_bits(&mut self, bits: u8) -> Result<()> {
        AddressValue::new(0, bits, Radix::Hexadecimal)?;
        self.address_bits = bits;
        Ok(())
    }

    /// An address at the listing's width.
    pub fn make_address(&self, value: u64) -> AddressValue {
        AddressValue::truncated(value, self.address_bits)
    }

    /// Total size of the backing store.
    pub fn length(&self) -> u64 {
        self.data.len()
    }

    /// The backing store.
    pub fn data(&self) -> &dyn ByteSource {
        self.data
    }

    /// Read bytes at a virtual address through the segment mapping,
    /// clamped to the containing segment. Returns none outside any
    /// segment or past the backing store.
    pub fn read_bytes(&self, address: AddressValue, len: usize) -> Option<Vec<u8>> {
        let segment = self.find_segment(&address)?;
        let offset = segment.file_offset(&address)?;
        let available = segment.end_value() - address.value;
        let len = len.min(usize::try_from(available).unwrap_or(usize::MAX));
        self.data.read(offset, len).ok()
    }

    // ------------------------------------------------------------------
    // Segments
    // ------------------------------------------------------------------

    /// Register a new segment.
    ///
    /// # Errors
    /// Returns `RangeConflict` if the range overlaps an existing
    /// segment (duplicate starts included); the listing is unchanged.
    pub fn create_segment(
        &mut self,
        name: impl Into<String>,
        kind: SegmentKind,
        start: AddressValue,
        size: u64,
        base_offset: u64,
    ) -> Result<&Segment> {
        let segment = Segment::new(name, kind, start, size, base_offset)?;

        // Only the nearest segment on each side can overlap a disjoint set
        let below = self
            .segments
            .range(..=start)
            .next_back()
            .map(|(_, s)| s)
            .filter(|s| s.overlaps(&segment));
        let above = self
            .segments
            .range((Bound::Excluded(start), Bound::Unbounded))
            .next()
            .map(|(_, s)| s)
            .filter(|s| s.overlaps(&segment));

        if let Some(existing) = below.or(above) {
            warn!(requested = %segment, existing = %existing, "segment overlap rejected");
            return Err(ScathaError::RangeConflict {
                requested: segment.to_string(),
                existing: existing.to_string(),
            });
        }

        debug!(segment = %segment, "segment registered");
        Ok(self.segments.entry(start).or_insert(segment))
    }

    /// The segment whose range contains `address`, or none.
    pub fn find_segment(&self, address: &AddressValue) -> Option<&Segment> {
        self.segments
            .range(..=*address)
            .next_back()
            .map(|(_, s)| s)
            .filter(|s| s.contains(address))
    }

    /// The segment containing `block`'s start, or none.
    pub fn find_segment_for_block(&self, block: &Block) -> Option<&Segment> {
        self.find_segment(&block.start)
    }

    /// Segments in address order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    /// Register a function entry point. A missing name defaults to
    /// `sub_<address>`; the name is also bound as a Function symbol.
    ///
    /// # Errors
    /// Returns `DuplicateDefinition` if a function already exists at
    /// `address` or the name is already bound; the listing is unchanged.
    pub fn create_function(
        &mut self,
        name: Option<String>,
        kind: FunctionKind,
        address: AddressValue,
    ) -> Result<&Function> {
        if self.functions.contains_key(&address) {
            return Err(ScathaError::DuplicateDefinition(format!(
                "function already registered at {}",
                address
            )));
        }

        let name = name.unwrap_or_else(|| format!("sub_{:x}", address.value));
        self.symbols
            .define(address, name.clone(), SymbolKind::Function)?;

        self.entry_points.push(address);
        debug!(function = %name, %address, "function registered");
        Ok(self
            .functions
            .entry(address)
            .or_insert(Function::new(name, kind, address)))
    }

    /// The function whose computed span contains `address`, or none.
    pub fn find_function(&self, address: &AddressValue) -> Option<&Function> {
        self.functions
            .range(..=*address)
            .next_back()
            .map(|(_, f)| f)
            .filter(|f| f.contains(address))
    }

    /// The function owning `block`, or none.
    pub fn find_function_for_block(&self, block: &Block) -> Option<&Function> {
        self.find_function(&block.start)
    }

    /// Functions in address order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Entry points in creation order.
    pub fn entry_points(&self) -> &[AddressValue] {
        &self.entry_points
    }

    // ------------------------------------------------------------------
    // Instructions and blocks
    // ------------------------------------------------------------------

    /// Register an instruction at `address`, or return the existing one.
    ///
    /// Creation is idempotent by address: a second call does not
    /// re-decode or reset the instruction. A fresh instruction starts
    /// unclassified, spanning `opcode_type.bytes()` bytes, with its
    /// Instruction block registered in the block index.
    pub fn create_instruction(
        &mut self,
        address: AddressValue,
        opcode_type: DataType,
    ) -> &mut Instruction {
        match self.instructions.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let instruction = Instruction::undefined(address, opcode_type);
                self.blocks.push(instruction.block());
                entry.insert(instruction)
            }
        }
    }

    /// The instruction at exactly `address`, or none.
    pub fn find_instruction(&self, address: &AddressValue) -> Option<&Instruction> {
        self.instructions.get(address)
    }

    /// Mutable access for decoders populating mnemonic, category and
    /// operands. The span is not reachable this way; see
    /// [`Listing::set_instruction_size`].
    pub fn find_instruction_mut(&mut self, address: &AddressValue) -> Option<&mut Instruction> {
        self.instructions.get_mut(address)
    }

    /// Whether an instruction has been decoded at `address`.
    pub fn is_decoded(&self, address: &AddressValue) -> bool {
        self.instructions.contains_key(address)
    }

    /// Instructions in address order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.values()
    }

    /// Change an instruction's span, updating its block in step.
    ///
    /// # Errors
    /// Returns `NotFound` if no instruction exists at `address`.
    pub fn set_instruction_size(&mut self, address: AddressValue, size: u64) -> Result<()> {
        let instruction = self
            .instructions
            .get_mut(&address)
            .ok_or_else(|| ScathaError::NotFound(format!("no instruction at {}", address)))?;

        let old_block = instruction.block();
        if !self.blocks.resize(&old_block, size) {
            return Err(ScathaError::NotFound(format!(
                "no instruction block at {}",
                address
            )));
        }
        instruction.set_size(size);
        Ok(())
    }

    /// Absorb a decode failure: the instruction at `address` is marked
    /// invalid and kept, routed to fallback formatting instead of
    /// aborting the surrounding pass.
    ///
    /// # Errors
    /// Returns `NotFound` if no instruction exists at `address`.
    pub fn fail_instruction(&mut self, address: AddressValue, message: &str) -> Result<()> {
        let instruction = self
            .instructions
            .get_mut(&address)
            .ok_or_else(|| ScathaError::NotFound(format!("no instruction at {}", address)))?;

        instruction.mark_invalid();
        warn!(%address, message, "decode failure absorbed");
        Ok(())
    }

    /// Register a data or unknown block.
    ///
    /// # Errors
    /// Returns `RangeConflict` if another block already covers an
    /// endpoint of the range; the listing is unchanged.
    pub fn create_block(
        &mut self,
        start: AddressValue,
        size: u64,
        kind: BlockKind,
    ) -> Result<Block> {
        if size == 0 {
            return Err(ScathaError::InvalidInput(
                "block size cannot be 0".to_string(),
            ));
        }

        let block = Block::new(start, size, kind);
        let last = AddressValue::truncated(block.end_value() - 1, start.bits);
        let conflict = self
            .blocks
            .find(&start)
            .copied()
            .or_else(|| self.blocks.find(&last).copied());
        if let Some(existing) = conflict {
            return Err(ScathaError::RangeConflict {
                requested: block.to_string(),
                existing: existing.to_string(),
            });
        }

        self.blocks.push(block);
        Ok(block)
    }

    /// The block covering `address`, or none.
    pub fn find_block(&mut self, address: &AddressValue) -> Option<&Block> {
        self.blocks.find(address)
    }

    /// Position of the block covering `address` in the sorted sequence.
    pub fn index_of(&mut self, address: &AddressValue, kind: Option<BlockKind>) -> Option<usize> {
        self.blocks.index_of(address, kind)
    }

    /// The sorted block sequence.
    pub fn blocks(&mut self) -> &[Block] {
        self.blocks.as_slice()
    }

    // ------------------------------------------------------------------
    // References, symbols, constants
    // ------------------------------------------------------------------

    /// Record a reference from `from` to `to`. With no index the
    /// reference appends to the target's list; an explicit index
    /// inserts at that position.
    pub fn create_reference(
        &mut self,
        from: AddressValue,
        to: AddressValue,
        kind: ReferenceKind,
        insert_index: Option<usize>,
    ) {
        self.references.insert(Reference::new(from, to, kind), insert_index);
    }

    pub fn reference_table(&self) -> &ReferenceTable {
        &self.references
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Mutable symbol table, for plugins naming locations directly.
    pub fn symbol_table_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn constant_table(&self) -> &ConstantTable {
        &self.constants
    }

    pub fn constant_table_mut(&mut self) -> &mut ConstantTable {
        &mut self.constants
    }

    /// Addresses flagged as string symbols by operand analysis.
    pub fn strings(&self) -> &BTreeSet<AddressValue> {
        &self.strings
    }

    /// Stack/register-relative pseudo-addresses collected by operand
    /// analysis.
    pub fn variables(&self) -> &BTreeSet<AddressValue> {
        &self.variables
    }

    // ------------------------------------------------------------------
    // Whole-listing passes
    // ------------------------------------------------------------------

    /// Walk every operand of every instruction, populating the
    /// reference table, the variable set and string symbols.
    ///
    /// The pass is idempotent: re-running it without intervening decode
    /// changes creates no duplicate references.
    pub fn analyze_operands(&mut self) {
        let addresses: Vec<AddressValue> = self.instructions.keys().copied().collect();
        let mut new_references = 0usize;
        let mut new_strings = 0usize;

        for address in addresses {
            let Some(instruction) = self.instructions.get(&address) else {
                continue;
            };
            let category = instruction.category;
            let operands = instruction.operands.clone();

            for operand in operands {
                if operand.is_pseudo_address() {
                    self.variables
                        .insert(AddressValue::truncated(operand.value as u64, self.address_bits));
                    continue;
                }

                let Some(target) = operand.target_address(self.address_bits) else {
                    continue;
                };
                if self.find_segment(&target).is_none() {
                    continue;
                }

                let kind = reference_kind(category, operand.access);
                if !self.references.contains(&address, &target, kind) {
                    self.references
                        .insert(Reference::new(address, target, kind), None);
                    new_references += 1;
                }

                if self.flag_string(target) {
                    new_strings += 1;
                }
            }
        }

        debug!(
            new_references,
            new_strings,
            variables = self.variables.len(),
            "operand analysis complete"
        );
    }

    /// Flag `target` as a string symbol if it heads a printable run.
    /// Returns whether a new flag was set.
    fn flag_string(&mut self, target: AddressValue) -> bool {
        if self.strings.contains(&target) {
            return false;
        }
        let Some(window) = self.read_bytes(target, MAX_STRING_SCAN) else {
            return false;
        };
        if printable_run(&window).is_none() {
            return false;
        }

        self.strings.insert(target);
        if !self.symbols.contains(&target) {
            let name = format!("str_{:x}", target.value);
            if let Err(err) = self.symbols.define(target, name, SymbolKind::StringData) {
                debug!(%target, error = %err, "string symbol name skipped");
            }
        }
        true
    }

    /// Compute every function's end address from contiguous block
    /// ownership.
    ///
    /// Entry points are processed in address order; each function claims
    /// forward through consecutive blocks of the sorted sequence until a
    /// block owned by an earlier function, a terminator with no
    /// fallthrough (claimed inclusively), or the next entry point.
    /// Ownership ends up disjoint, and re-running recomputes from
    /// scratch.
    pub fn calc_function_bounds(&mut self) {
        self.blocks.ensure_sorted();
        let entries: Vec<AddressValue> = self.functions.keys().copied().collect();
        let entry_set: BTreeSet<AddressValue> = entries.iter().copied().collect();

        // Claims only ever extend forward, so one frontier tracks them
        let mut claimed_end = 0u64;

        for entry in entries {
            let Some(start_idx) = self.blocks.index_of(&entry, None) else {
                debug!(%entry, "no block at entry point, bounds skipped");
                continue;
            };

            let mut end_value = entry.value;
            let mut idx = start_idx;
            while let Some(block) = self.blocks.get(idx) {
                if block.start.value < claimed_end {
                    break;
                }
                if idx > start_idx && entry_set.contains(&block.start) {
                    break;
                }

                end_value = block.end_value();

                let terminates = block.is_instruction()
                    && self
                        .instructions
                        .get(&block.start)
                        .map_or(false, |i| i.category.is_terminator());
                if terminates {
                    break;
                }
                idx += 1;
            }

            claimed_end = end_value;
            let end = AddressValue::truncated(end_value, self.address_bits);
            if let Some(function) = self.functions.get_mut(&entry) {
                function.set_end(end);
                debug!(function = %function.name, %entry, %end, "function bounds computed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Block-range replacement
    // ------------------------------------------------------------------

    /// Replace the contiguous block range `[b1, b2]` with one
    /// synthesized instruction spanning exactly the union of the
    /// removed spans.
    ///
    /// The removed blocks' instructions are dropped from the
    /// instruction store; the new instruction is inserted at the
    /// vacated position. `opcode_type` defaults to the listing's
    /// address width.
    ///
    /// # Errors
    /// Returns `InvalidRange` if either endpoint has no block, the
    /// range is reversed, or the covered blocks are not gap-free. On
    /// error nothing is removed.
    pub fn replace_instructions(
        &mut self,
        b1: AddressValue,
        b2: AddressValue,
        mnemonic: &str,
        category: InstructionCategory,
        opcode_type: Option<DataType>,
    ) -> Result<&Instruction> {
        if b2 < b1 {
            return Err(ScathaError::InvalidRange(format!(
                "range reversed: {} precedes {}",
                b2, b1
            )));
        }

        let first = self
            .blocks
            .index_of(&b1, None)
            .ok_or_else(|| ScathaError::InvalidRange(format!("no block at {}", b1)))?;
        let last = self
            .blocks
            .index_of(&b2, None)
            .ok_or_else(|| ScathaError::InvalidRange(format!("no block at {}", b2)))?;
        if last < first {
            return Err(ScathaError::InvalidRange(format!(
                "block at {} precedes block at {}",
                b2, b1
            )));
        }

        // Validate contiguity before touching anything
        for idx in first..last {
            let (Some(current), Some(next)) = (self.blocks.get(idx), self.blocks.get(idx + 1))
            else {
                return Err(ScathaError::InvalidRange("range out of bounds".to_string()));
            };
            if current.end_value() != next.start.value {
                return Err(ScathaError::InvalidRange(format!(
                    "gap between {:x} and {}",
                    current.end_value(),
                    next.start
                )));
            }
        }

        let span_start = self
            .blocks
            .get(first)
            .map(|b| b.start)
            .ok_or_else(|| ScathaError::InvalidRange("range out of bounds".to_string()))?;
        let span_end = self
            .blocks
            .get(last)
            .map(|b| b.end_value())
            .ok_or_else(|| ScathaError::InvalidRange("range out of bounds".to_string()))?;

        // Commit
        let removed = self.blocks.remove_range(first, last);
        for block in &removed {
            if block.is_instruction() {
                self.instructions.remove(&block.start);
            }
        }

        let opcode_type = match opcode_type {
            Some(t) => t,
            None => DataType::from_bits(self.address_bits, false)?,
        };
        let size = span_end - span_start.value;
        let instruction =
            Instruction::pseudo(span_start, size, mnemonic, category, opcode_type);
        self.blocks.insert_at(first, instruction.block());

        debug!(
            start = %span_start,
            size,
            replaced = removed.len(),
            mnemonic,
            "block range replaced"
        );

        match self.instructions.entry(span_start) {
            Entry::Occupied(mut entry) => {
                entry.insert(instruction);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(instruction)),
        }
    }

    // ------------------------------------------------------------------
    // Iteration primitives
    // ------------------------------------------------------------------

    /// First block in address order.
    pub fn first_block(&mut self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Last block in address order.
    pub fn last_block(&mut self) -> Option<&Block> {
        self.blocks.last()
    }

    /// The block following `block` in address order, or none at the end.
    pub fn next_block(&mut self, block: &Block) -> Option<&Block> {
        let idx = self.blocks.index_of_block(block)?;
        self.blocks.get(idx + 1)
    }

    /// Whether a block follows `block` in address order.
    pub fn has_next_block(&mut self, block: &Block) -> bool {
        self.blocks
            .index_of_block(block)
            .map_or(false, |idx| idx + 1 < self.blocks.len())
    }

    /// First function in address order.
    pub fn first_function(&self) -> Option<&Function> {
        self.functions.values().next()
    }

    /// Last function in address order.
    pub fn last_function(&self) -> Option<&Function> {
        self.functions.values().next_back()
    }

    /// The function following `function` in address order, or none.
    pub fn next_function(&self, function: &Function) -> Option<&Function> {
        self.functions
            .range((Bound::Excluded(function.start), Bound::Unbounded))
            .next()
            .map(|(_, f)| f)
    }

    /// The first instruction of `function`: the lowest-addressed
    /// instruction at or past its entry, bounded by the computed end
    /// when one exists.
    pub fn first_instruction(&self, function: &Function) -> Option<&Instruction> {
        let (_, instruction) = self.instructions.range(function.start..).next()?;
        match function.end {
            Some(end) if instruction.address >= end => None,
            _ => Some(instruction),
        }
    }

    /// The instruction following `instruction` in address order, or
    /// none at the end.
    pub fn next_instruction(&self, instruction: &Instruction) -> Option<&Instruction> {
        self.instructions
            .range((Bound::Excluded(instruction.address), Bound::Unbounded))
            .next()
            .map(|(_, i)| i)
    }
}
