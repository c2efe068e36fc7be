//! Mico - A small expression-oriented scripting language
//!
//! This crate provides a complete interpreter for Mico: a dynamically typed
//! language with first-class functions, closures, arrays, hash maps and a
//! compile-time macro system built on `quote`/`unquote`.
//!
//! ```text
//! let newAdder = fn(x) { fn(y) { x + y } };
//! let addTwo = newAdder(2);
//! addTwo(3)                      // => 5
//!
//! let people = [{"name": "Alice"}, {"name": "Bob"}];
//! people[1]["name"]              // => Bob
//!
//! let unless = macro(cond, cons, alt) {
//!     quote(if (!(unquote(cond))) { unquote(cons) } else { unquote(alt) })
//! };
//! unless(10 > 5, "not greater", "greater")   // => greater
//! ```
//!
//! ## Pipeline
//!
//! Source text flows through four stages. The lexer turns text into
//! position-tagged tokens, the parser builds an AST with precedence-climbing,
//! the macro expander rewrites the AST before any evaluation happens, and the
//! tree-walking evaluator produces a [`value::Value`].
//!
//! Evaluation is strict about types: arithmetic requires integers on both
//! sides, mixed-type operands are a type mismatch rather than a coercion,
//! and integer overflow and division by zero are reported as errors instead
//! of wrapping or panicking.
//!
//! ## Modules
//!
//! - `token`, `lexer`: text to position-tagged tokens
//! - `ast`, `parser`: tokens to syntax trees, with error recovery
//! - `value`: runtime values and lexical environments
//! - `builtins`: the built-in function registry
//! - `evaluator`: the tree-walking evaluation engine
//! - `macros`: macro collection and `quote`/`unquote` expansion

use std::fmt;

use crate::ast::{InfixOperator, PrefixOperator};
use crate::builtins::Arity;
use crate::value::Kind;

/// An error raised while evaluating a program. Evaluation stops at the first
/// error and unwinds to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// An infix operator applied to operands of two different types.
    TypeMismatch {
        operator: InfixOperator,
        left: Kind,
        right: Kind,
    },
    /// An infix operator applied to a same-type operand pair it does not
    /// support.
    UnknownInfixOperator {
        operator: InfixOperator,
        left: Kind,
        right: Kind,
    },
    /// A prefix operator applied to an operand type it does not support.
    UnknownPrefixOperator {
        operator: PrefixOperator,
        operand: Kind,
    },
    UnboundIdentifier(String),
    /// Call syntax applied to a value that is neither a function nor a
    /// builtin.
    NotCallable(Kind),
    WrongArity { expected: Arity, got: usize },
    /// A hash key of a type that does not support hashing.
    UnusableHashKey(Kind),
    /// Index syntax applied to an unsupported container/index combination.
    NotIndexable(Kind),
    DivisionByZero,
    IntegerOverflow(InfixOperator),
    /// A builtin rejected its arguments; carries the full message.
    Builtin(String),
    /// A macro failed to expand; carries the full message.
    MacroExpansion(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::TypeMismatch {
                operator,
                left,
                right,
            } => write!(f, "type mismatch: {left} {operator} {right}"),
            RuntimeError::UnknownInfixOperator {
                operator,
                left,
                right,
            } => write!(f, "unknown operator: {left} {operator} {right}"),
            RuntimeError::UnknownPrefixOperator { operator, operand } => {
                write!(f, "unknown operator: {operator}{operand}")
            }
            RuntimeError::UnboundIdentifier(name) => {
                write!(f, "identifier not found: {name}")
            }
            RuntimeError::NotCallable(kind) => write!(f, "not a function: {kind}"),
            RuntimeError::WrongArity { expected, got } => {
                write!(f, "wrong number of arguments: expected {expected}, got {got}")
            }
            RuntimeError::UnusableHashKey(kind) => {
                write!(f, "unusable as hash key: {kind}")
            }
            RuntimeError::NotIndexable(container) => {
                write!(f, "index operator not supported: {container}")
            }
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::IntegerOverflow(operator) => {
                write!(f, "integer overflow evaluating `{operator}`")
            }
            RuntimeError::Builtin(message) | RuntimeError::MacroExpansion(message) => {
                write!(f, "{message}")
            }
        }
    }
}

pub mod ast;
pub mod builtins;
pub mod evaluator;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod token;
pub mod value;
