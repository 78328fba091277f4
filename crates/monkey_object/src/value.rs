use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use monkey_parser::Stmt;

use crate::code::Instructions;
use crate::environment::Environment;

pub type RcArray = Rc<RefCell<Vec<Value>>>;
pub type HashPairs = IndexMap<HashKey, HashPair, FxBuildHasher>;
pub type RcHash = Rc<RefCell<HashPairs>>;
pub type BuiltinFn = fn(&[Value]) -> Value;

/// The single tagged union every execution backend (tree-walker, VM) speaks.
/// Composite values (`Array`, `Hash`) are `Rc<RefCell<_>>`-backed so cloning
/// a `Value` is always O(1): the compiler/VM push and pop `Value`s by value
/// constantly, and only `push` ever needs to observe a "new" array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    String(Rc<String>),
    Array(RcArray),
    Hash(RcHash),
    ReturnValue(Box<Value>),
    Error(String),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static str, BuiltinFn),
    /// The tree-walker's callable: unevaluated body plus the environment it
    /// closed over by reference. The VM never produces this variant; it
    /// only ever sees `CompiledFunction`/`Closure`.
    Function(Rc<FunctionObject>),
}

#[derive(Debug)]
pub struct FunctionObject {
    pub parameters: Vec<String>,
    pub body: Vec<Stmt>,
    pub env: Environment,
}

impl PartialEq for FunctionObject {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters && self.body == other.body
    }
}

/// A function body lowered to bytecode, plus the frame-sizing metadata the
/// VM needs when it calls into it. Never itself callable — only a
/// [`Closure`] wrapping one is a runtime-callable value (spec's closures
/// are the only callable, `CompiledFunction` is compile-time bookkeeping).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A `CompiledFunction` together with the free-variable values captured at
/// the point the closure was constructed (by value, at `OpClosure` time —
/// not a live reference to the enclosing scope).
#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func) && self.free.len() == other.free.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    tag: u8,
    payload: u64,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::String(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::ReturnValue(_) => "RETURN_VALUE",
            Value::Error(_) => "ERROR",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION_OBJ",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(..) => "BUILTIN",
            Value::Function(_) => "FUNCTION",
        }
    }

    /// Integer 0 is the only falsy integer; `Null` and `false` are falsy.
    /// Every other value (including empty strings/arrays) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Null => false,
            Value::Integer(0) => false,
            _ => true,
        }
    }

    /// `==`/`!=` on anything but two integers compares by reference
    /// identity, not structural content — two freshly built arrays with
    /// the same elements are unequal. Both execution backends share this
    /// rule, mirroring the original interpreter's pointer-equality
    /// semantics for composite objects.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(s.into()))
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    /// `HashKey` for use as a hash/map key. Mirrors the original
    /// interpreter's per-type `HashKey()` methods as one closed match
    /// instead of one trait impl per variant.
    pub fn hash_key(&self) -> Result<HashKey, String> {
        match self {
            Value::Boolean(b) => Ok(HashKey {
                tag: 0,
                payload: if *b { 1 } else { 0 },
            }),
            Value::Integer(i) => Ok(HashKey {
                tag: 1,
                payload: *i as u64,
            }),
            Value::String(s) => Ok(HashKey {
                tag: 2,
                payload: fnv1a64(s.as_bytes()),
            }),
            other => Err(format!("unusable as hash key: {}", other.type_name())),
        }
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(elements) => {
                let items: Vec<String> =
                    elements.borrow().iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Hash(pairs) => {
                let items: Vec<String> = pairs
                    .borrow()
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Value::ReturnValue(v) => write!(f, "{v}"),
            Value::Error(msg) => write!(f, "ERROR: {msg}"),
            Value::CompiledFunction(_) => write!(f, "CompiledFunction[{:p}]", self),
            Value::Closure(c) => write!(f, "Closure[{:p}]", Rc::as_ptr(c)),
            Value::Builtin(name, _) => write!(f, "builtin function: {name}"),
            Value::Function(func) => {
                write!(f, "fn({}) {{\n...\n}}", func.parameters.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_zero_is_falsy() {
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(1).is_truthy());
        assert!(Value::Integer(-1).is_truthy());
    }

    #[test]
    fn same_strings_hash_equal() {
        let a = Value::string("hello world");
        let b = Value::string("hello world");
        assert_eq!(a.hash_key().unwrap(), b.hash_key().unwrap());
    }

    #[test]
    fn different_strings_hash_different() {
        let a = Value::string("hello");
        let b = Value::string("world");
        assert_ne!(a.hash_key().unwrap(), b.hash_key().unwrap());
    }

    #[test]
    fn booleans_hash_by_identity_value() {
        assert_eq!(
            Value::Boolean(true).hash_key().unwrap(),
            Value::Boolean(true).hash_key().unwrap()
        );
        assert_ne!(
            Value::Boolean(true).hash_key().unwrap(),
            Value::Boolean(false).hash_key().unwrap()
        );
    }

    #[test]
    fn arrays_are_not_hashable() {
        assert!(Value::array(vec![]).hash_key().is_err());
    }
}
