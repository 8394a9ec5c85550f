use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Named variable bound to a slot in the data segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: SmolStr,
    pub slot: u32,
}

/// Session wide mapping of variable names to data segment slots.
///
/// Slots are allocated in increasing order as names are first
/// assigned, and are never removed or reused.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<SmolStr, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn find(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).map(|symbol| symbol.slot)
    }

    /// Allocate the next slot for the given name.
    ///
    /// If the name is already bound, its existing slot is returned.
    pub fn create(&mut self, name: &str) -> u32 {
        if let Some(slot) = self.find(name) {
            return slot;
        }

        let slot = self.symbols.len() as u32;
        let name = SmolStr::from(name);
        self.symbols.insert(name.clone(), Symbol { name, slot });
        slot
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Number of allocated slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        let mut symbols: Vec<&Symbol> = self.symbols.values().collect();
        symbols.sort_by_key(|symbol| symbol.slot);
        symbols.into_iter()
    }
}
