use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

struct EnvInner {
    store: HashMap<String, Value>,
    outer: Option<Environment>,
}

/// A chained variable scope, shared by reference so that a captured closure
/// sees later mutations of the scope it was created in (the tree-walker's
/// closure semantics — live references, unlike the VM's by-value free
/// variable snapshot at `OpClosure` time).
#[derive(Clone)]
pub struct Environment(Rc<RefCell<EnvInner>>);

impl Environment {
    pub fn new() -> Self {
        Environment(Rc::new(RefCell::new(EnvInner {
            store: HashMap::new(),
            outer: None,
        })))
    }

    pub fn enclosed(outer: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(EnvInner {
            store: HashMap::new(),
            outer: Some(outer.clone()),
        })))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.0.borrow().store.get(name) {
            return Some(value.clone());
        }
        self.0.borrow().outer.as_ref()?.get(name)
    }

    pub fn set(&self, name: &str, value: Value) {
        self.0.borrow_mut().store.insert(name.to_string(), value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Environment(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_sees_outer_bindings() {
        let outer = Environment::new();
        outer.set("x", Value::Integer(5));
        let inner = Environment::enclosed(&outer);
        assert_eq!(inner.get("x"), Some(Value::Integer(5)));
    }

    #[test]
    fn inner_scope_shadows_without_mutating_outer() {
        let outer = Environment::new();
        outer.set("x", Value::Integer(5));
        let inner = Environment::enclosed(&outer);
        inner.set("x", Value::Integer(10));
        assert_eq!(inner.get("x"), Some(Value::Integer(10)));
        assert_eq!(outer.get("x"), Some(Value::Integer(5)));
    }
}
