use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Free,
    Builtin,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Tracks name → slot bindings for one compilation scope. Nested function
/// bodies get their own table whose `outer` points at the enclosing one;
/// `resolve` walks outward and promotes captured locals to `Free`.
#[derive(Debug)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    outer: Option<Box<SymbolTable>>,
    pub num_definitions: usize,
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            store: HashMap::new(),
            outer: None,
            num_definitions: 0,
            free_symbols: Vec::new(),
        }
    }

    pub fn enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            store: HashMap::new(),
            outer: Some(Box::new(outer)),
            num_definitions: 0,
            free_symbols: Vec::new(),
        }
    }

    /// Unwraps one level of nesting, handing the parent table back to the
    /// caller so it can resume as the current scope.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|b| *b)
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_some() { SymbolScope::Local } else { SymbolScope::Global };
        let symbol = Symbol { name: name.to_string(), scope, index: self.num_definitions };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: SymbolScope::Builtin, index };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: SymbolScope::Function, index: 0 };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len() - 1,
        };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let outer = self.outer.as_mut()?;
        let resolved = outer.resolve(name)?;
        match resolved.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(resolved),
            _ => Some(self.define_free(resolved)),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}
