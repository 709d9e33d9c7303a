//! Error types for the Scatha listing engine.
//!
//! This module provides structured error handling using thiserror. Lookup
//! misses are not errors: every `find_*` operation returns an `Option`.
//! The variants here cover the failures that mutating operations can
//! report; a failed operation leaves the listing unchanged.

use thiserror::Error;

use crate::core::address::AddressValue;
use crate::memory::MemoryError;

/// Main error type for Scatha operations.
#[derive(Debug, Error)]
pub enum ScathaError {
    /// A new segment or block range overlaps an existing one
    #[error("range conflict: {requested} overlaps existing {existing}")]
    RangeConflict { requested: String, existing: String },

    /// Malformed range arguments (reversed, absent, or non-contiguous)
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Symbol, constant, function or other unique-key redefinition
    #[error("duplicate definition: {0}")]
    DuplicateDefinition(String),

    /// A block could not be interpreted as a valid instruction
    #[error("decode failure at {address}: {message}")]
    DecodeFailure {
        address: AddressValue,
        message: String,
    },

    /// A mutating operation addressed an entity that does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid constructor or operation arguments
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Byte-storage backing errors
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Scatha operations
pub type Result<T> = std::result::Result<T, ScathaError>;
