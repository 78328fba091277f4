use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope's name table. Function scopes nest by owning their
/// enclosing scope in `outer`; resolving a name that lives in an outer
/// *function* scope (not the outermost global scope) promotes it to a
/// free variable lazily, the first time it's referenced from the inner
/// scope — see [`SymbolTable::resolve`].
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Enters a new nested scope, taking ownership of `self` as its outer
    /// scope. Call [`SymbolTable::leave_scope`] on the result to get `self`
    /// back when the nested scope closes.
    pub fn enter_scope(self) -> SymbolTable {
        SymbolTable {
            outer: Some(Box::new(self)),
            store: HashMap::new(),
            num_definitions: 0,
            free_symbols: Vec::new(),
        }
    }

    pub fn leave_scope(self) -> SymbolTable {
        *self.outer.expect("leave_scope called on the outermost symbol table")
    }

    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Binds a function literal's own name inside its body, so a `let`-bound
    /// recursive function can call itself by name without that name having
    /// to be a free variable captured from the enclosing scope.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
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
        self.store.insert(original.name, symbol.clone());
        symbol
    }

    /// Resolves `name`, walking outward through enclosing scopes at most
    /// once per scope. A name found directly in `self` or in the outermost
    /// (global) or a builtin scope is returned unchanged — those are
    /// visible everywhere, never captured. A name found in an intervening
    /// function scope is recorded as a free variable of every scope between
    /// its definition and this reference, in the order each scope first
    /// needed it; the compiler later emits one `OpGetFree`/capture load per
    /// entry of `free_symbols`, so that order is load-bearing.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_global() {
        let mut table = SymbolTable::new();
        table.define("a");
        table.define("b");
        assert_eq!(
            table.resolve("a"),
            Some(Symbol {
                name: "a".to_string(),
                scope: SymbolScope::Global,
                index: 0
            })
        );
        assert_eq!(
            table.resolve("b"),
            Some(Symbol {
                name: "b".to_string(),
                scope: SymbolScope::Global,
                index: 1
            })
        );
    }

    #[test]
    fn resolve_local() {
        let mut global = SymbolTable::new();
        global.define("a");
        let mut local = global.enter_scope();
        local.define("b");
        local.define("c");

        assert_eq!(local.resolve("a").unwrap().scope, SymbolScope::Global);
        assert_eq!(local.resolve("b").unwrap().scope, SymbolScope::Local);
        assert_eq!(local.resolve("c").unwrap().index, 1);
    }

    #[test]
    fn resolve_free_variables_in_nested_scopes() {
        let mut global = SymbolTable::new();
        global.define("a");
        let mut first = global.enter_scope();
        first.define("b");
        let mut second = first.enter_scope();
        second.define("c");
        second.define("d");

        assert_eq!(second.resolve("a").unwrap().scope, SymbolScope::Global);
        assert_eq!(second.resolve("b").unwrap().scope, SymbolScope::Free);
        assert_eq!(second.resolve("b").unwrap().index, 0);
        assert_eq!(second.resolve("c").unwrap().scope, SymbolScope::Local);

        assert_eq!(second.free_symbols.len(), 1);
        assert_eq!(second.free_symbols[0].name, "b");
        assert_eq!(second.free_symbols[0].scope, SymbolScope::Local);
    }

    #[test]
    fn define_and_resolve_function_name() {
        let mut global = SymbolTable::new();
        global.define_function_name("fibonacci");
        let resolved = global.resolve("fibonacci").unwrap();
        assert_eq!(resolved.scope, SymbolScope::Function);
    }

    #[test]
    fn builtins_resolve_across_every_nesting_depth() {
        let mut global = SymbolTable::new();
        global.define_builtin(0, "puts");
        let first = global.enter_scope();
        let mut second = first.enter_scope();
        assert_eq!(second.resolve("puts").unwrap().scope, SymbolScope::Builtin);
        // not promoted to Free
        assert!(second.free_symbols.is_empty());
    }
}
