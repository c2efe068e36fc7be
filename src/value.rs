//! Runtime values and lexical environments.
//!
//! Values are cheap to clone: integers, booleans and null are `Copy`-sized,
//! strings memoize their hash behind a [`Text`] wrapper, and functions and
//! macros share their captured environment through [`Rc`]. Equality is
//! structural for data values; functions, macros and builtins compare by
//! identity.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

use fnv::FnvHasher;

use crate::ast::{Block, Expression};
use crate::builtins::Builtin;

/// A shared, mutable lexical scope. Cloning an `Env` aliases the scope, it
/// does not copy the bindings.
pub type Env = Rc<Environment>;

/// The result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    String(Text),
    Array(Vec<Value>),
    Hash(HashMap<HashKey, HashPair>),
    Function(Rc<FunctionValue>),
    /// Shaped like a function but applied to unevaluated syntax during macro
    /// expansion, never at evaluation time.
    Macro(Rc<FunctionValue>),
    Builtin(&'static Builtin),
    /// Unevaluated syntax produced by `quote(...)`.
    Quote(Expression),
    Null,
}

/// The coarse type of a [`Value`], used in diagnostics and hash keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Integer,
    Boolean,
    String,
    Array,
    Hash,
    Function,
    Macro,
    Builtin,
    Quote,
    Null,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Kind::Integer => "Integer",
            Kind::Boolean => "Boolean",
            Kind::String => "String",
            Kind::Array => "Array",
            Kind::Hash => "Hash",
            Kind::Function => "Function",
            Kind::Macro => "Macro",
            Kind::Builtin => "Builtin",
            Kind::Quote => "Quote",
            Kind::Null => "Null",
        };
        write!(f, "{text}")
    }
}

/// A string value with a lazily computed, memoized FNV-1a hash. Hashing the
/// same string value repeatedly (for example as a hash key in a loop) pays
/// for the hash once.
#[derive(Debug, Clone)]
pub struct Text {
    value: String,
    hash: OnceCell<u64>,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Text {
            value: value.into(),
            hash: OnceCell::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    fn fnv_hash(&self) -> u64 {
        *self.hash.get_or_init(|| {
            let mut hasher = FnvHasher::default();
            hasher.write(self.value.as_bytes());
            hasher.finish()
        })
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Text::new(value)
    }
}

impl From<String> for Text {
    fn from(value: String) -> Self {
        Text::new(value)
    }
}

/// A hashable projection of a value. Only integers, booleans and strings
/// may be used as hash keys; the kind tag keeps keys of different types
/// distinct even when their raw hashes collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: Kind,
    pub value: u64,
}

/// A hash entry keeps the original key value alongside the stored value so
/// the pair can be displayed and compared structurally.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// A user-defined function or macro: parameter names, body and the
/// environment captured at the literal's evaluation site.
#[derive(Debug)]
pub struct FunctionValue {
    pub parameters: Vec<String>,
    pub body: Block,
    pub env: Env,
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Integer(_) => Kind::Integer,
            Value::Boolean(_) => Kind::Boolean,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Hash(_) => Kind::Hash,
            Value::Function(_) => Kind::Function,
            Value::Macro(_) => Kind::Macro,
            Value::Builtin(_) => Kind::Builtin,
            Value::Quote(_) => Kind::Quote,
            Value::Null => Kind::Null,
        }
    }

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// The hashable projection of this value, if its type supports hashing.
    pub fn hash_key(&self) -> Option<HashKey> {
        let key = match self {
            Value::Integer(value) => HashKey {
                kind: Kind::Integer,
                // The bit pattern is unique per integer already
                value: *value as u64,
            },
            Value::Boolean(value) => HashKey {
                kind: Kind::Boolean,
                value: u64::from(*value),
            },
            Value::String(text) => HashKey {
                kind: Kind::String,
                value: text.fnv_hash(),
            },
            _ => return None,
        };
        Some(key)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Quote(a), Value::Quote(b)) => a == b,
            (Value::Null, Value::Null) => true,
            // Functions and macros are equal only to themselves
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// Render the value the way the REPL prints results. String contents are
    /// shown verbatim, without quotes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::String(text) => write!(f, "{}", text.as_str()),
            Value::Array(elements) => {
                let rendered: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Value::Function(function) => {
                let params = function.parameters.join(", ");
                write!(f, "fn({params}) {}", function.body)
            }
            Value::Macro(function) => {
                let params = function.parameters.join(", ");
                write!(f, "macro({params}) {}", function.body)
            }
            Value::Builtin(builtin) => write!(f, "#<builtin:{}>", builtin.name),
            Value::Quote(expression) => write!(f, "quote({expression})"),
            Value::Null => write!(f, "null"),
        }
    }
}

/// One lexical scope with an optional enclosing scope. Name resolution walks
/// outward; definition always writes the innermost scope.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    outer: Option<Env>,
}

impl Environment {
    /// A fresh top-level scope.
    pub fn new() -> Env {
        Rc::new(Environment::default())
    }

    /// A scope nested inside `outer`, as created for each function call.
    pub fn new_enclosed(outer: &Env) -> Env {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            outer: Some(Rc::clone(outer)),
        })
    }

    /// Resolve `name`, searching enclosing scopes outward.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.get(name))
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Names bound directly in this scope, sorted for stable display.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_keys_compare_by_content() {
        let hello1 = Value::String(Text::from("Hello World"));
        let hello2 = Value::String(Text::from("Hello World"));
        let diff = Value::String(Text::from("My name is johnny"));

        assert_eq!(hello1.hash_key(), hello2.hash_key());
        assert_ne!(hello1.hash_key(), diff.hash_key());
    }

    #[test]
    fn test_hash_keys_distinguish_kinds() {
        // 1, true and "1" must all be distinct keys even if raw hashes align
        let one = Value::Integer(1).hash_key().unwrap();
        let yes = Value::Boolean(true).hash_key().unwrap();
        assert_ne!(one, yes);
        assert_eq!(one.value, yes.value);
    }

    #[test]
    fn test_unhashable_values_have_no_key() {
        assert_eq!(Value::Array(vec![]).hash_key(), None);
        assert_eq!(Value::Null.hash_key(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::String(Text::from("")).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_environment_scoping() {
        let outer = Environment::new();
        outer.set("a", Value::Integer(1));
        outer.set("b", Value::Integer(2));

        let inner = Environment::new_enclosed(&outer);
        inner.set("b", Value::Integer(20));

        // Inner sees its own binding, outer's untouched
        assert_eq!(inner.get("a"), Some(Value::Integer(1)));
        assert_eq!(inner.get("b"), Some(Value::Integer(20)));
        assert_eq!(outer.get("b"), Some(Value::Integer(2)));
        assert_eq!(inner.get("missing"), None);
    }

    #[test]
    fn test_display() {
        let cases: Vec<(Value, &str)> = vec![
            (Value::Integer(-7), "-7"),
            (Value::Boolean(true), "true"),
            (Value::String(Text::from("hi there")), "hi there"),
            (Value::Null, "null"),
            (
                Value::Array(vec![Value::Integer(1), Value::String(Text::from("x"))]),
                "[1, x]",
            ),
        ];

        for (value, expected) in cases {
            assert_eq!(value.to_string(), expected);
        }
    }
}
