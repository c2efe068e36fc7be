//! Built-in function registry.
//!
//! Builtins are host functions exposed to programs as ordinary values; the
//! evaluator resolves a free identifier against this registry after the
//! lexical environment misses, so any builtin name can be shadowed by a
//! `let` binding.
//!
//! Each builtin receives its arguments already evaluated and owned. Arity is
//! validated by the evaluator before the implementation runs, so the
//! implementations only check argument types.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::RuntimeError;
use crate::value::{Kind, Value};

/// Expected argument count for a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
}

impl Arity {
    pub fn validate(self, got: usize) -> Result<(), RuntimeError> {
        let ok = match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
        };
        if ok {
            Ok(())
        } else {
            Err(RuntimeError::WrongArity {
                expected: self,
                got,
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Definition of a built-in function.
pub struct Builtin {
    /// The identifier programs use to call this builtin
    pub name: &'static str,
    /// Expected number of arguments, validated before `func` runs
    pub arity: Arity,
    pub func: fn(Vec<Value>) -> Result<Value, RuntimeError>,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

fn type_error(builtin: &str, expected: &str, got: Kind) -> RuntimeError {
    RuntimeError::Builtin(format!(
        "argument to `{builtin}` must be {expected}, got {got}"
    ))
}

//
// Builtin Function Implementations
//

fn builtin_len(mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.remove(0) {
        Value::String(text) => Ok(Value::Integer(text.as_str().len() as i64)),
        Value::Array(elements) => Ok(Value::Integer(elements.len() as i64)),
        other => Err(type_error("len", "String or Array", other.kind())),
    }
}

fn builtin_first(mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.remove(0) {
        Value::Array(elements) => Ok(elements.into_iter().next().unwrap_or(Value::Null)),
        other => Err(type_error("first", "Array", other.kind())),
    }
}

fn builtin_last(mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.remove(0) {
        Value::Array(elements) => Ok(elements.into_iter().next_back().unwrap_or(Value::Null)),
        other => Err(type_error("last", "Array", other.kind())),
    }
}

/// All elements after the first, as a fresh array. `rest` of an empty array
/// is `null`, so repeated `rest` calls terminate at a sentinel.
fn builtin_rest(mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.remove(0) {
        Value::Array(elements) => {
            if elements.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Array(elements[1..].to_vec()))
            }
        }
        other => Err(type_error("rest", "Array", other.kind())),
    }
}

/// Append an element, returning a new array. The original is unchanged.
fn builtin_push(mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    let element = args.pop().unwrap_or(Value::Null);
    match args.remove(0) {
        Value::Array(mut elements) => {
            elements.push(element);
            Ok(Value::Array(elements))
        }
        other => Err(type_error("push", "Array", other.kind())),
    }
}

/// Print each argument on its own line and return `null`.
fn builtin_puts(args: Vec<Value>) -> Result<Value, RuntimeError> {
    for arg in args {
        println!("{arg}");
    }
    Ok(Value::Null)
}

/// The registry itself. Definition order is the display order used by the
/// REPL's environment listing.
static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        arity: Arity::Exact(1),
        func: builtin_len,
    },
    Builtin {
        name: "first",
        arity: Arity::Exact(1),
        func: builtin_first,
    },
    Builtin {
        name: "last",
        arity: Arity::Exact(1),
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        arity: Arity::Exact(1),
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        arity: Arity::Exact(2),
        func: builtin_push,
    },
    Builtin {
        name: "puts",
        arity: Arity::AtLeast(0),
        func: builtin_puts,
    },
];

/// Lazy static map from name to builtin (private - use `lookup`)
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static Builtin>> =
    LazyLock::new(|| BUILTINS.iter().map(|b| (b.name, b)).collect());

/// Find a builtin by name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTIN_INDEX.get(name).copied()
}

/// All registered builtins, in definition order.
pub fn all() -> &'static [Builtin] {
    BUILTINS
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::value::Text;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let builtin = lookup(name).unwrap();
        builtin.arity.validate(args.len())?;
        (builtin.func)(args)
    }

    fn array(elements: Vec<i64>) -> Value {
        Value::Array(elements.into_iter().map(Value::Integer).collect())
    }

    #[test]
    fn test_len() {
        let cases: Vec<(Value, Result<Value, RuntimeError>)> = vec![
            (Value::String(Text::from("")), Ok(Value::Integer(0))),
            (Value::String(Text::from("four")), Ok(Value::Integer(4))),
            (
                Value::String(Text::from("hello world")),
                Ok(Value::Integer(11)),
            ),
            (array(vec![1, 2, 3]), Ok(Value::Integer(3))),
            (array(vec![]), Ok(Value::Integer(0))),
            (
                Value::Integer(1),
                Err(RuntimeError::Builtin(
                    "argument to `len` must be String or Array, got Integer".to_owned(),
                )),
            ),
        ];

        for (arg, expected) in cases {
            assert_eq!(call("len", vec![arg]), expected);
        }
    }

    #[test]
    fn test_arity_validation() {
        let err = call("len", vec![]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::WrongArity {
                expected: Arity::Exact(1),
                got: 0
            }
        );
        assert_eq!(err.to_string(), "wrong number of arguments: expected 1, got 0");

        // puts accepts any number of arguments
        assert_eq!(call("puts", vec![]), Ok(Value::Null));
    }

    #[test]
    fn test_array_accessors() {
        assert_eq!(call("first", vec![array(vec![1, 2, 3])]), Ok(Value::Integer(1)));
        assert_eq!(call("first", vec![array(vec![])]), Ok(Value::Null));
        assert_eq!(call("last", vec![array(vec![1, 2, 3])]), Ok(Value::Integer(3)));
        assert_eq!(call("last", vec![array(vec![])]), Ok(Value::Null));
        assert_eq!(
            call("rest", vec![array(vec![1, 2, 3])]),
            Ok(array(vec![2, 3]))
        );
        assert_eq!(call("rest", vec![array(vec![1])]), Ok(array(vec![])));
        assert_eq!(call("rest", vec![array(vec![])]), Ok(Value::Null));
    }

    #[test]
    fn test_push_copies() {
        let original = array(vec![1, 2]);
        let pushed = call("push", vec![original.clone(), Value::Integer(3)]).unwrap();
        assert_eq!(pushed, array(vec![1, 2, 3]));
        // push must not mutate its argument
        assert_eq!(original, array(vec![1, 2]));
    }

    #[test]
    fn test_lookup_misses_unknown_names() {
        assert!(lookup("len").is_some());
        assert!(lookup("nope").is_none());
    }
}
