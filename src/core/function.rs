//! Function type: entry points with computed block ownership.
//!
//! A Function is registered at its entry address; its end is not known
//! until the listing computes bounds from contiguous block ownership.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::AddressValue;

/// Kind of function in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Normal function discovered by analysis
    Normal,
    /// A format-declared program entry point
    EntryPoint,
    /// Imported from another module
    Import,
    /// Thunk jumping to another function
    Thunk,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Normal => write!(f, "Normal"),
            FunctionKind::EntryPoint => write!(f, "EntryPoint"),
            FunctionKind::Import => write!(f, "Import"),
            FunctionKind::Thunk => write!(f, "Thunk"),
        }
    }
}

/// An entry point and the span of blocks it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Function kind
    pub kind: FunctionKind,
    /// Entry point address
    pub start: AddressValue,
    /// One past the last owned address; None until bounds are computed
    pub end: Option<AddressValue>,
}

impl Function {
    pub fn new(name: impl Into<String>, kind: FunctionKind, start: AddressValue) -> Self {
        Function {
            name: name.into(),
            kind,
            start,
            end: None,
        }
    }

    pub(crate) fn set_end(&mut self, end: AddressValue) {
        self.end = Some(end);
    }

    /// Whether `address` falls within the function's computed span.
    /// Before bounds are computed only the entry address matches.
    pub fn contains(&self, address: &AddressValue) -> bool {
        match self.end {
            Some(end) => address.value >= self.start.value && address.value < end.value,
            None => *address == self.start,
        }
    }

    /// Span in bytes once bounds are computed.
    pub fn size(&self) -> Option<u64> {
        self.end.map(|end| end.value - self.start.value)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} '{}' [{}..{})", self.kind, self.name, self.start, end),
            None => write!(f, "{} '{}' at {}", self.kind, self.name, self.start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_contains_only_entry() {
        let func = Function::new("main", FunctionKind::EntryPoint, AddressValue::u32(0x1000));
        assert!(func.contains(&AddressValue::u32(0x1000)));
        assert!(!func.contains(&AddressValue::u32(0x1004)));
        assert_eq!(func.size(), None);
    }

    #[test]
    fn test_bounded_contains_span() {
        let mut func = Function::new("main", FunctionKind::Normal, AddressValue::u32(0x1000));
        func.set_end(AddressValue::u32(0x1020));
        assert!(func.contains(&AddressValue::u32(0x101F)));
        assert!(!func.contains(&AddressValue::u32(0x1020)));
        assert_eq!(func.size(), Some(0x20));
    }
}
