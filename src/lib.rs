//! Scatha: a disassembler listing engine.
//!
//! The listing is the in-memory representation of a binary's decoded
//! structure: address-sorted blocks, functions, instructions, segments,
//! symbols, constants and cross-references, built incrementally during
//! analysis and queried by formatting and scripting layers.
//!
//! Decoding itself (architecture opcode tables) is not part of this
//! crate: decoders register what they find through
//! [`listing::Listing`]'s creation operations, and the analysis passes
//! ([`listing::Listing::analyze_operands`],
//! [`listing::Listing::calc_function_bounds`]) resolve the result into
//! a typed reference graph with computed function boundaries.

/// Helpers for the whole-listing analysis passes
pub mod analysis;
/// Core value types
pub mod core;
/// Error types
pub mod error;
/// Instruction rendering
pub mod format;
/// The listing engine
pub mod listing;
/// Logging and tracing setup
pub mod logging;
/// Byte-storage backing interface
pub mod memory;

pub use error::{Result, ScathaError};
pub use listing::Listing;
