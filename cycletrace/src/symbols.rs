//! Append-only symbol table with address-to-index interning.
//!
//! Lookup is a linear scan over a bounded table; insertion order is
//! also presentation order, which is what keeps the DOT output
//! deterministic.

use log::error;
use thiserror::Error;

use crate::resolver::NameResolver;

/// Bounded function capacity; running out is fatal for the run.
pub const MAX_FUNCTIONS: usize = 400;

/// Resolver output is truncated to this many characters.
pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Error)]
#[error("symbol table full ({MAX_FUNCTIONS} functions); cannot add address {0:#010x}")]
pub struct TableFull(pub u32);

#[derive(Clone, Debug)]
pub struct Symbol {
    pub address: u32,
    pub name: String,
    pub total_calls: u32,
    pub total_cycles: u64,
}

pub struct SymbolTable {
    entries: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_FUNCTIONS),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> &Symbol {
        &self.entries[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter()
    }

    pub fn lookup(&self, address: u32) -> Option<usize> {
        self.entries.iter().position(|s| s.address == address)
    }

    /// Intern `address` on a function entry: bump the call count of an
    /// existing symbol, or append a new one and resolve its name
    /// exactly once.
    pub fn record_call(
        &mut self,
        address: u32,
        resolver: &mut dyn NameResolver,
    ) -> Result<usize, TableFull> {
        if let Some(index) = self.lookup(address) {
            self.entries[index].total_calls += 1;
            return Ok(index);
        }
        if self.entries.len() == MAX_FUNCTIONS {
            return Err(TableFull(address));
        }

        let name = match resolver.resolve(address) {
            Some(name) => name.chars().take(MAX_NAME_LEN).collect(),
            None => {
                error!("failed to translate address {address:#010x} to a function name");
                String::new()
            }
        };
        self.entries.push(Symbol {
            address,
            name,
            total_calls: 1,
            total_cycles: 0,
        });
        Ok(self.entries.len() - 1)
    }

    pub fn add_cycles(&mut self, index: usize, cycles: u64) {
        self.entries[index].total_cycles += cycles;
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(address: u32) -> Option<String> {
        Some(format!("fn_{address:x}"))
    }

    #[test]
    fn interning_counts_calls_and_resolves_once() {
        let mut table = SymbolTable::new();
        let mut resolutions = 0;
        let mut resolver = |address: u32| {
            resolutions += 1;
            named(address)
        };

        let a = table.record_call(0x8C01_0000, &mut resolver).unwrap();
        let b = table.record_call(0x8C02_0000, &mut resolver).unwrap();
        let a_again = table.record_call(0x8C01_0000, &mut resolver).unwrap();

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(resolutions, 2);
        assert_eq!(table.get(a).total_calls, 2);
        assert_eq!(table.get(a).name, "fn_8c010000");
    }

    #[test]
    fn resolver_failure_keeps_an_empty_name() {
        let mut table = SymbolTable::new();
        let mut resolver = |_| None;
        let index = table.record_call(0x8C01_0000, &mut resolver).unwrap();
        assert_eq!(table.get(index).name, "");
        assert_eq!(table.get(index).total_calls, 1);
    }

    #[test]
    fn long_names_are_truncated() {
        let mut table = SymbolTable::new();
        let mut resolver = |_| Some("x".repeat(80));
        let index = table.record_call(0x8C01_0000, &mut resolver).unwrap();
        assert_eq!(table.get(index).name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn table_overflow_is_fatal() {
        let mut table = SymbolTable::new();
        let mut resolver = |_| Some("f".to_string());
        for i in 0..MAX_FUNCTIONS {
            table
                .record_call(0x8C00_0000 + (i as u32) * 4, &mut resolver)
                .unwrap();
        }
        let err = table.record_call(0x8CFF_0000, &mut resolver).unwrap_err();
        assert_eq!(err.0, 0x8CFF_0000);
    }
}
