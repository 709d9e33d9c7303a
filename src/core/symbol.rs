//! Symbol and constant bookkeeping.
//!
//! Symbols bind names to addresses; constants bind names to values. Both
//! tables are unique-key maps: redefining an existing key is a reported
//! conflict, never a silent overwrite. Iteration is address order for
//! symbols and name order for constants.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::core::address::AddressValue;
use crate::error::{Result, ScathaError};

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Function entry point
    Function,
    /// Start of a printable string run
    StringData,
    /// Other data location
    Data,
    /// Stack/register-relative variable
    Variable,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => write!(f, "Function"),
            SymbolKind::StringData => write!(f, "StringData"),
            SymbolKind::Data => write!(f, "Data"),
            SymbolKind::Variable => write!(f, "Variable"),
        }
    }
}

/// A name bound to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub address: AddressValue,
    pub kind: SymbolKind,
}

/// Unique name ↔ address map with address-ordered iteration.
#[derive(Debug, Default)]
pub struct SymbolTable {
    by_address: BTreeMap<AddressValue, Symbol>,
    names: HashMap<String, AddressValue>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `address`.
    ///
    /// # Errors
    /// Returns `DuplicateDefinition` if the address is already named or
    /// the name is already bound elsewhere; the table is unchanged.
    pub fn define(
        &mut self,
        address: AddressValue,
        name: impl Into<String>,
        kind: SymbolKind,
    ) -> Result<&Symbol> {
        let name = name.into();
        if let Some(existing) = self.by_address.get(&address) {
            return Err(ScathaError::DuplicateDefinition(format!(
                "address {} is already named '{}'",
                address, existing.name
            )));
        }
        if let Some(bound) = self.names.get(&name) {
            return Err(ScathaError::DuplicateDefinition(format!(
                "symbol '{}' is already bound to {}",
                name, bound
            )));
        }

        self.names.insert(name.clone(), address);
        Ok(self
            .by_address
            .entry(address)
            .or_insert(Symbol { name, address, kind }))
    }

    pub fn get(&self, address: &AddressValue) -> Option<&Symbol> {
        self.by_address.get(address)
    }

    pub fn by_name(&self, name: &str) -> Option<&Symbol> {
        self.names.get(name).and_then(|addr| self.by_address.get(addr))
    }

    pub fn contains(&self, address: &AddressValue) -> bool {
        self.by_address.contains_key(address)
    }

    /// Symbols in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.by_address.values()
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// A name bound to a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: AddressValue,
}

/// Unique name → value map with name-ordered iteration.
#[derive(Debug, Default)]
pub struct ConstantTable {
    by_name: BTreeMap<String, Constant>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`.
    ///
    /// # Errors
    /// Returns `DuplicateDefinition` if the name already exists.
    pub fn define(&mut self, name: impl Into<String>, value: AddressValue) -> Result<&Constant> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ScathaError::DuplicateDefinition(format!(
                "constant '{}' is already defined",
                name
            )));
        }

        Ok(self
            .by_name
            .entry(name.clone())
            .or_insert(Constant { name, value }))
    }

    pub fn get(&self, name: &str) -> Option<&Constant> {
        self.by_name.get(name)
    }

    /// Constants in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
