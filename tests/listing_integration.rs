//! Integration tests for the listing engine: segment registration,
//! incremental decode, operand analysis and function bounds.

use scatha::core::address::AddressValue;
use scatha::core::block::BlockKind;
use scatha::core::data_type::DataType;
use scatha::core::function::FunctionKind;
use scatha::core::instruction::{Access, InstructionCategory, Operand};
use scatha::core::reference::ReferenceKind;
use scatha::core::segment::SegmentKind;
use scatha::memory::SliceSource;
use scatha::{Listing, ScathaError};

/// Backing bytes: 0x1000 bytes of code image with a string at file
/// offset 0x600 (virtual 0x1600 under the CODE segment below).
fn image() -> Vec<u8> {
    let mut data = vec![0u8; 0x1000];
    data[0x600..0x60D].copy_from_slice(b"hello world!\0");
    data
}

fn code_listing<'d>(source: &'d SliceSource<'d>) -> Listing<'d> {
    let mut listing = Listing::new(source, 32).unwrap();
    listing
        .create_segment(
            "CODE",
            SegmentKind::Code,
            AddressValue::u32(0x1000),
            0x1000,
            0,
        )
        .unwrap();
    listing
}

#[test]
fn created_entities_are_found_again() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    listing
        .create_function(
            Some("main".to_string()),
            FunctionKind::EntryPoint,
            AddressValue::u32(0x1000),
        )
        .unwrap();
    listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);

    let segment = listing.find_segment(&AddressValue::u32(0x1234)).unwrap();
    assert_eq!(segment.name, "CODE");

    let function = listing.find_function(&AddressValue::u32(0x1000)).unwrap();
    assert_eq!(function.name, "main");

    let instruction = listing.find_instruction(&AddressValue::u32(0x1000)).unwrap();
    assert_eq!(instruction.address, AddressValue::u32(0x1000));

    let block = listing.find_block(&AddressValue::u32(0x1002)).unwrap();
    assert_eq!(block.start, AddressValue::u32(0x1000));
    assert_eq!(listing.length(), 0x1000);
}

#[test]
fn overlapping_segment_is_rejected_and_state_kept() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = Listing::new(&source, 32).unwrap();

    listing
        .create_segment("A", SegmentKind::Code, AddressValue::u32(0x1000), 0x100, 0)
        .unwrap();
    let err = listing.create_segment("B", SegmentKind::Code, AddressValue::u32(0x1050), 0x100, 0);

    assert!(matches!(err, Err(ScathaError::RangeConflict { .. })));
    let names: Vec<&str> = listing.segments().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["A"]);

    // An adjacent, non-overlapping range is fine
    listing
        .create_segment("C", SegmentKind::Data, AddressValue::u32(0x1100), 0x100, 0x100)
        .unwrap();
    assert_eq!(listing.segments().count(), 2);
}

#[test]
fn find_block_agrees_with_linear_scan_after_out_of_order_decode() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    // Decode visits addresses out of order
    for start in [0x1010u32, 0x1000, 0x1008, 0x1004, 0x100C] {
        listing.create_instruction(AddressValue::u32(start), DataType::UInt32);
    }

    let blocks: Vec<_> = listing.blocks().to_vec();
    for probe in 0x0FF0u32..0x1020 {
        let addr = AddressValue::u32(probe);
        let linear = blocks.iter().find(|b| b.contains(&addr)).copied();
        assert_eq!(listing.find_block(&addr).copied(), linear, "probe {:#x}", probe);
    }
}

#[test]
fn block_set_is_disjoint_and_sorted_after_decode() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    for start in [0x1020u32, 0x1000, 0x1010, 0x1008, 0x1004, 0x1018, 0x101C] {
        listing.create_instruction(AddressValue::u32(start), DataType::UInt32);
    }
    listing
        .create_block(AddressValue::u32(0x1600), 0x10, BlockKind::Data)
        .unwrap();

    let blocks = listing.blocks();
    for pair in blocks.windows(2) {
        assert!(pair[0].start < pair[1].start, "sorted: {} < {}", pair[0], pair[1]);
        assert!(
            pair[0].end_value() <= pair[1].start.value,
            "disjoint: {} then {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn analyze_operands_builds_call_graph_and_bounds_follow() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    // 0x1000: call 0x1500; 0x1004: ret; 0x1500: ret
    let instr = listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);
    instr.set_mnemonic("call");
    instr.set_category(InstructionCategory::Call);
    instr.push_operand(Operand::relative(0x1500, DataType::UInt32));

    let instr = listing.create_instruction(AddressValue::u32(0x1004), DataType::UInt32);
    instr.set_mnemonic("ret");
    instr.set_category(InstructionCategory::Return);

    let instr = listing.create_instruction(AddressValue::u32(0x1500), DataType::UInt32);
    instr.set_mnemonic("ret");
    instr.set_category(InstructionCategory::Return);

    listing.analyze_operands();

    let refs = listing.reference_table().references_to(&AddressValue::u32(0x1500));
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].from, AddressValue::u32(0x1000));
    assert_eq!(refs[0].kind, ReferenceKind::Call);

    // Function over the whole image: bounds must reach past the callee
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1000))
        .unwrap();
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1500))
        .unwrap();
    listing.calc_function_bounds();

    let main = listing.find_function(&AddressValue::u32(0x1000)).unwrap();
    assert_eq!(main.end.unwrap(), AddressValue::u32(0x1008));

    let callee = listing.find_function(&AddressValue::u32(0x1500)).unwrap();
    assert!(callee.end.unwrap() >= AddressValue::u32(0x1500));
}

#[test]
fn single_function_bounds_reach_gapped_callee_block() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    // Only two decoded instructions, far apart; no terminators. The
    // walk consumes consecutive blocks of the index, so the lone
    // function's end lands past the callee.
    let instr = listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);
    instr.set_mnemonic("call");
    instr.set_category(InstructionCategory::Call);
    instr.push_operand(Operand::relative(0x1500, DataType::UInt32));
    listing.create_instruction(AddressValue::u32(0x1500), DataType::UInt32);

    listing.analyze_operands();
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1000))
        .unwrap();
    listing.calc_function_bounds();

    let function = listing.find_function(&AddressValue::u32(0x1000)).unwrap();
    assert!(function.end.unwrap() >= AddressValue::u32(0x1500));
}

#[test]
fn analyze_operands_is_idempotent() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    let instr = listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);
    instr.set_mnemonic("call");
    instr.set_category(InstructionCategory::Call);
    instr.push_operand(Operand::relative(0x1500, DataType::UInt32));

    listing.analyze_operands();
    listing.analyze_operands();

    assert_eq!(
        listing.reference_table().references_to(&AddressValue::u32(0x1500)).len(),
        1
    );
}

#[test]
fn analyze_operands_flags_strings() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    // load r0, [0x1600] where 0x1600 holds "hello world!\0"
    let instr = listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);
    instr.set_mnemonic("load");
    instr.set_category(InstructionCategory::Load);
    instr.push_operand(Operand::register("r0", DataType::UInt32, Access::Write));
    instr.push_operand(Operand::memory(0x1600, DataType::UInt32, Access::Read));

    listing.analyze_operands();

    assert!(listing.strings().contains(&AddressValue::u32(0x1600)));
    let symbol = listing.symbol_table().get(&AddressValue::u32(0x1600)).unwrap();
    assert_eq!(symbol.name, "str_1600");

    let refs = listing.reference_table().references_to(&AddressValue::u32(0x1600));
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].kind, ReferenceKind::Read);
}

#[test]
fn out_of_segment_targets_create_no_reference() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    let instr = listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);
    instr.set_mnemonic("jmp");
    instr.set_category(InstructionCategory::Jump);
    instr.push_operand(Operand::relative(0x9000, DataType::UInt32));

    listing.analyze_operands();
    assert!(listing.reference_table().is_empty());
}

#[test]
fn function_bounds_stop_at_terminator_and_claims_stay_disjoint() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    // f1: 0x1000 mov, 0x1004 jmp (terminator); then unowned filler;
    // f2 entry at 0x1010
    for (start, mnemonic, category) in [
        (0x1000u32, "mov", InstructionCategory::Move),
        (0x1004, "jmp", InstructionCategory::Jump),
        (0x1008, "nop", InstructionCategory::Nop),
        (0x100C, "nop", InstructionCategory::Nop),
        (0x1010, "ret", InstructionCategory::Return),
    ] {
        let instr = listing.create_instruction(AddressValue::u32(start), DataType::UInt32);
        instr.set_mnemonic(mnemonic);
        instr.set_category(category);
    }

    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1000))
        .unwrap();
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1010))
        .unwrap();
    listing.calc_function_bounds();

    let f1 = listing.find_function(&AddressValue::u32(0x1000)).unwrap().clone();
    let f2 = listing.find_function(&AddressValue::u32(0x1010)).unwrap().clone();

    // Terminator block claimed inclusively, then the walk stops
    assert_eq!(f1.end.unwrap(), AddressValue::u32(0x1008));
    assert_eq!(f2.end.unwrap(), AddressValue::u32(0x1014));

    // No block is owned by two functions
    let blocks: Vec<_> = listing.blocks().to_vec();
    for block in &blocks {
        let owners = [&f1, &f2]
            .iter()
            .filter(|f| f.contains(&block.start))
            .count();
        assert!(owners <= 1, "block {} claimed {} times", block, owners);
    }
}

#[test]
fn function_bounds_stop_at_next_entry_point() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    // Straight-line code with an entry point in the middle
    for start in [0x1000u32, 0x1004, 0x1008, 0x100C] {
        let instr = listing.create_instruction(AddressValue::u32(start), DataType::UInt32);
        instr.set_mnemonic("nop");
        instr.set_category(InstructionCategory::Nop);
    }
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1000))
        .unwrap();
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1008))
        .unwrap();
    listing.calc_function_bounds();

    let f1 = listing.find_function(&AddressValue::u32(0x1000)).unwrap();
    assert_eq!(f1.end.unwrap(), AddressValue::u32(0x1008));
    let f2 = listing.find_function(&AddressValue::u32(0x1008)).unwrap();
    assert_eq!(f2.end.unwrap(), AddressValue::u32(0x1010));
}

#[test]
fn iteration_primitives_walk_sorted_order() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    for start in [0x1008u32, 0x1000, 0x1004] {
        let instr = listing.create_instruction(AddressValue::u32(start), DataType::UInt32);
        instr.set_mnemonic("nop");
        instr.set_category(InstructionCategory::Nop);
    }
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1000))
        .unwrap();
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1008))
        .unwrap();
    listing.calc_function_bounds();

    // Blocks walk in address order and exhaust to none
    let mut block = *listing.first_block().unwrap();
    let mut starts = vec![block.start.value];
    while let Some(next) = listing.next_block(&block).copied() {
        starts.push(next.start.value);
        block = next;
    }
    assert_eq!(starts, vec![0x1000, 0x1004, 0x1008]);
    assert!(!listing.has_next_block(&block));
    assert_eq!(listing.last_block().unwrap().start.value, 0x1008);

    // Functions likewise
    let first = listing.first_function().unwrap().clone();
    assert_eq!(first.start.value, 0x1000);
    let second = listing.next_function(&first).unwrap().clone();
    assert_eq!(second.start.value, 0x1008);
    assert!(listing.next_function(&second).is_none());

    // Instructions of the first function stay inside its bounds
    let instr = listing.first_instruction(&first).unwrap().clone();
    assert_eq!(instr.address.value, 0x1000);
    let instr = listing.next_instruction(&instr).unwrap().clone();
    assert_eq!(instr.address.value, 0x1004);
    assert!(listing.first_instruction(&second).is_some());
}

#[test]
fn caller_controlled_reference_order_and_lookups() {
    let data = image();
    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);

    listing.create_reference(
        AddressValue::u32(0x1000),
        AddressValue::u32(0x1500),
        ReferenceKind::Call,
        None,
    );
    listing.create_reference(
        AddressValue::u32(0x1100),
        AddressValue::u32(0x1500),
        ReferenceKind::Call,
        None,
    );
    // Promote the later caller to the front of the target's list
    listing.create_reference(
        AddressValue::u32(0x1200),
        AddressValue::u32(0x1500),
        ReferenceKind::Jump,
        Some(0),
    );

    let refs = listing.reference_table().references_to(&AddressValue::u32(0x1500));
    let sources: Vec<u64> = refs.iter().map(|r| r.from.value).collect();
    assert_eq!(sources, vec![0x1200, 0x1000, 0x1100]);

    // Constants are plain unique-key bindings
    listing
        .constant_table_mut()
        .define("PAGE_SIZE", AddressValue::u32(0x1000))
        .unwrap();
    assert!(listing
        .constant_table_mut()
        .define("PAGE_SIZE", AddressValue::u32(0x2000))
        .is_err());
    assert_eq!(
        listing.constant_table().get("PAGE_SIZE").unwrap().value.value,
        0x1000
    );

    // Block-based finders agree with the address-based ones
    listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);
    listing
        .create_function(None, FunctionKind::Normal, AddressValue::u32(0x1000))
        .unwrap();
    listing.calc_function_bounds();

    let block = *listing.find_block(&AddressValue::u32(0x1000)).unwrap();
    assert_eq!(listing.find_segment_for_block(&block).unwrap().name, "CODE");
    assert_eq!(
        listing.find_function_for_block(&block).unwrap().start,
        AddressValue::u32(0x1000)
    );
}

#[test]
fn listing_over_file_backed_bytes() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image()).unwrap();
    let data = std::fs::read(file.path()).unwrap();

    let source = SliceSource::new(&data);
    let mut listing = code_listing(&source);
    let instr = listing.create_instruction(AddressValue::u32(0x1000), DataType::UInt32);
    instr.set_mnemonic("load");
    instr.set_category(InstructionCategory::Load);
    instr.push_operand(Operand::memory(0x1600, DataType::UInt32, Access::Read));

    listing.analyze_operands();
    assert!(listing.strings().contains(&AddressValue::u32(0x1600)));
}
