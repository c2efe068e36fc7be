//! Tree-walking evaluation engine.
//!
//! Evaluation is a direct recursive walk over the AST. Every evaluation
//! function returns `Result<Value, Signal>`, where the error side carries
//! either a runtime error or a `return` in flight; both unwind through
//! enclosing blocks with `?`. A `return` stops unwinding at the nearest
//! function-call boundary, where it becomes that call's result; a runtime
//! error unwinds all the way to [`eval_program`]'s caller.
//!
//! The walk recurses with the depth of the AST and imposes no depth limit of
//! its own; hosts evaluating untrusted input must bound recursion around the
//! top-level call.

use std::collections::HashMap;
use std::rc::Rc;

use crate::RuntimeError;
use crate::ast::{Block, Expression, InfixOperator, PrefixOperator, Program, Statement};
use crate::builtins::{self, Arity};
use crate::macros;
use crate::value::{Env, Environment, FunctionValue, HashPair, Kind, Text, Value};

/// Why an evaluation function unwound instead of producing a value. Both
/// variants propagate through `?`; only a function-call boundary intercepts
/// [`Signal::Return`].
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A `return` statement in flight, carrying the value being returned.
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(error: RuntimeError) -> Self {
        Signal::Error(error)
    }
}

/// Evaluate a whole program. A top-level `return` finishes the program with
/// its value; the result is otherwise the value of the last statement.
pub fn eval_program(program: &Program, env: &Env) -> Result<Value, RuntimeError> {
    let mut result = Value::Null;
    for statement in &program.statements {
        match eval_statement(statement, env) {
            Ok(value) => result = value,
            Err(Signal::Return(value)) => return Ok(value),
            Err(Signal::Error(error)) => return Err(error),
        }
    }
    Ok(result)
}

fn eval_statement(statement: &Statement, env: &Env) -> Result<Value, Signal> {
    match statement {
        Statement::Let { name, value } => {
            let value = eval_expression(value, env)?;
            env.set(name.clone(), value);
            Ok(Value::Null)
        }
        Statement::Return(value) => {
            let value = eval_expression(value, env)?;
            Err(Signal::Return(value))
        }
        Statement::Expression(expression) => eval_expression(expression, env),
    }
}

/// Evaluate a block; its value is the value of the last statement. A
/// `Signal::Return` raised inside passes through untouched, so it keeps
/// unwinding through nested blocks.
fn eval_block(block: &Block, env: &Env) -> Result<Value, Signal> {
    let mut result = Value::Null;
    for statement in &block.statements {
        result = eval_statement(statement, env)?;
    }
    Ok(result)
}

pub fn eval_expression(expression: &Expression, env: &Env) -> Result<Value, Signal> {
    match expression {
        Expression::Identifier(name) => eval_identifier(name, env),
        Expression::IntegerLiteral(value) => Ok(Value::Integer(*value)),
        Expression::StringLiteral(value) => Ok(Value::String(Text::new(value.clone()))),
        Expression::BooleanLiteral(value) => Ok(Value::Boolean(*value)),
        Expression::Prefix { operator, operand } => {
            let value = eval_expression(operand, env)?;
            Ok(eval_prefix(*operator, value)?)
        }
        Expression::Infix {
            operator,
            left,
            right,
        } => {
            let left = eval_expression(left, env)?;
            let right = eval_expression(right, env)?;
            Ok(eval_infix(*operator, left, right)?)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = eval_expression(condition, env)?;
            if condition.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Ok(Value::Null)
            }
        }
        Expression::FunctionLiteral { parameters, body } => {
            Ok(Value::Function(Rc::new(FunctionValue {
                parameters: parameters.clone(),
                body: body.clone(),
                env: Rc::clone(env),
            })))
        }
        // Macro literals are consumed by the collection pass; one reaching
        // the evaluator was written somewhere collection does not look.
        Expression::MacroLiteral { .. } => Err(Signal::Error(RuntimeError::MacroExpansion(
            "macro literals must be bound directly with `let`".to_owned(),
        ))),
        Expression::Call {
            function,
            arguments,
        } => {
            // `quote` looks like a call but receives its argument unevaluated
            if matches!(function.as_ref(), Expression::Identifier(name) if name == "quote") {
                if arguments.len() != 1 {
                    return Err(Signal::Error(RuntimeError::WrongArity {
                        expected: Arity::Exact(1),
                        got: arguments.len(),
                    }));
                }
                let quoted = macros::quote(arguments[0].clone(), env)?;
                return Ok(Value::Quote(quoted));
            }

            let function = eval_expression(function, env)?;
            let mut args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                args.push(eval_expression(argument, env)?);
            }
            apply_function(&function, args)
        }
        Expression::ArrayLiteral(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(eval_expression(element, env)?);
            }
            Ok(Value::Array(values))
        }
        Expression::Index { left, index } => {
            let left = eval_expression(left, env)?;
            let index = eval_expression(index, env)?;
            Ok(eval_index(left, index)?)
        }
        Expression::HashLiteral(pairs) => {
            let mut map = HashMap::with_capacity(pairs.len());
            for (key_expr, value_expr) in pairs {
                let key = eval_expression(key_expr, env)?;
                let hash_key = key
                    .hash_key()
                    .ok_or(RuntimeError::UnusableHashKey(key.kind()))?;
                let value = eval_expression(value_expr, env)?;
                map.insert(hash_key, HashPair { key, value });
            }
            Ok(Value::Hash(map))
        }
    }
}

/// Resolve a name against the environment chain, then the builtin registry.
/// Builtins can therefore be shadowed by `let` bindings.
fn eval_identifier(name: &str, env: &Env) -> Result<Value, Signal> {
    if let Some(value) = env.get(name) {
        return Ok(value);
    }
    if let Some(builtin) = builtins::lookup(name) {
        return Ok(Value::Builtin(builtin));
    }
    Err(Signal::Error(RuntimeError::UnboundIdentifier(
        name.to_owned(),
    )))
}

fn eval_prefix(operator: PrefixOperator, value: Value) -> Result<Value, RuntimeError> {
    match operator {
        PrefixOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
        PrefixOperator::Negate => match value {
            Value::Integer(value) => value
                .checked_neg()
                .map(Value::Integer)
                .ok_or(RuntimeError::IntegerOverflow(InfixOperator::Sub)),
            other => Err(RuntimeError::UnknownPrefixOperator {
                operator,
                operand: other.kind(),
            }),
        },
    }
}

fn eval_infix(operator: InfixOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    if left.kind() != right.kind() {
        return Err(RuntimeError::TypeMismatch {
            operator,
            left: left.kind(),
            right: right.kind(),
        });
    }
    match (left, right) {
        (Value::Integer(left), Value::Integer(right)) => {
            eval_integer_infix(operator, left, right)
        }
        (Value::String(left), Value::String(right)) => match operator {
            InfixOperator::Add => {
                let mut combined = String::with_capacity(
                    left.as_str().len() + right.as_str().len(),
                );
                combined.push_str(left.as_str());
                combined.push_str(right.as_str());
                Ok(Value::String(Text::new(combined)))
            }
            InfixOperator::Eq => Ok(Value::Boolean(left == right)),
            InfixOperator::NotEq => Ok(Value::Boolean(left != right)),
            _ => Err(RuntimeError::UnknownInfixOperator {
                operator,
                left: Kind::String,
                right: Kind::String,
            }),
        },
        (left, right) => {
            // Booleans and null support equality by value; no other kind
            // supports any infix operator
            let equatable = matches!(left.kind(), Kind::Boolean | Kind::Null);
            match operator {
                InfixOperator::Eq if equatable => Ok(Value::Boolean(left == right)),
                InfixOperator::NotEq if equatable => Ok(Value::Boolean(left != right)),
                _ => Err(RuntimeError::UnknownInfixOperator {
                    operator,
                    left: left.kind(),
                    right: right.kind(),
                }),
            }
        }
    }
}

fn eval_integer_infix(
    operator: InfixOperator,
    left: i64,
    right: i64,
) -> Result<Value, RuntimeError> {
    let overflow = || RuntimeError::IntegerOverflow(operator);
    match operator {
        InfixOperator::Add => left.checked_add(right).map(Value::Integer).ok_or_else(overflow),
        InfixOperator::Sub => left.checked_sub(right).map(Value::Integer).ok_or_else(overflow),
        InfixOperator::Mul => left.checked_mul(right).map(Value::Integer).ok_or_else(overflow),
        InfixOperator::Div => {
            if right == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            left.checked_div(right).map(Value::Integer).ok_or_else(overflow)
        }
        InfixOperator::Rem => {
            if right == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            left.checked_rem(right).map(Value::Integer).ok_or_else(overflow)
        }
        InfixOperator::Lt => Ok(Value::Boolean(left < right)),
        InfixOperator::Gt => Ok(Value::Boolean(left > right)),
        InfixOperator::Eq => Ok(Value::Boolean(left == right)),
        InfixOperator::NotEq => Ok(Value::Boolean(left != right)),
    }
}

fn eval_index(left: Value, index: Value) -> Result<Value, RuntimeError> {
    match (left, index) {
        (Value::Array(elements), Value::Integer(index)) => {
            // Out-of-range indexing is permissive and yields null
            let index = usize::try_from(index).ok();
            Ok(index
                .and_then(|i| elements.get(i).cloned())
                .unwrap_or(Value::Null))
        }
        (Value::Hash(map), key) => {
            let hash_key = key
                .hash_key()
                .ok_or(RuntimeError::UnusableHashKey(key.kind()))?;
            Ok(map
                .get(&hash_key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Value::Null))
        }
        (other, _) => Err(RuntimeError::NotIndexable(other.kind())),
    }
}

/// Call a function or builtin value with already-evaluated arguments.
pub fn apply_function(function: &Value, args: Vec<Value>) -> Result<Value, Signal> {
    match function {
        Value::Function(function) => {
            Arity::Exact(function.parameters.len()).validate(args.len())?;
            let call_env = Environment::new_enclosed(&function.env);
            for (parameter, argument) in function.parameters.iter().zip(args) {
                call_env.set(parameter.clone(), argument);
            }
            match eval_block(&function.body, &call_env) {
                // The call boundary unwraps a return into a plain value
                Err(Signal::Return(value)) => Ok(value),
                other => other,
            }
        }
        Value::Builtin(builtin) => {
            builtin.arity.validate(args.len())?;
            Ok((builtin.func)(args)?)
        }
        other => Err(Signal::Error(RuntimeError::NotCallable(other.kind()))),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn run(input: &str) -> Result<Value, RuntimeError> {
        let mut parser = Parser::new(Lexer::new(input));
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parse errors for '{input}': {:?}",
            parser.errors()
        );
        let env = Environment::new();
        eval_program(&program, &env)
    }

    fn int(value: i64) -> Result<Value, RuntimeError> {
        Ok(Value::Integer(value))
    }

    fn boolean(value: bool) -> Result<Value, RuntimeError> {
        Ok(Value::Boolean(value))
    }

    fn null() -> Result<Value, RuntimeError> {
        Ok(Value::Null)
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_integer_arithmetic() {
        let cases = vec![
            ("5", int(5)),
            ("10", int(10)),
            ("-5", int(-5)),
            ("-10", int(-10)),
            ("5 + 5 + 5 + 5 - 10", int(10)),
            ("2 * 2 * 2 * 2 * 2", int(32)),
            ("-50 + 100 + -50", int(0)),
            ("5 * 2 + 10", int(20)),
            ("5 + 2 * 10", int(25)),
            ("20 + 2 * -10", int(0)),
            ("50 / 2 * 2 + 10", int(60)),
            ("2 * (5 + 10)", int(30)),
            ("3 * 3 * 3 + 10", int(37)),
            ("3 * (3 * 3) + 10", int(37)),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", int(50)),
            // Division truncates toward zero
            ("7 / 2", int(3)),
            ("-7 / 2", int(-3)),
            ("10 % 3", int(1)),
            ("-10 % 3", int(-1)),
            ("10 % 2", int(0)),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_boolean_expressions() {
        let cases = vec![
            ("true", boolean(true)),
            ("false", boolean(false)),
            ("1 < 2", boolean(true)),
            ("1 > 2", boolean(false)),
            ("1 < 1", boolean(false)),
            ("1 > 1", boolean(false)),
            ("1 == 1", boolean(true)),
            ("1 != 1", boolean(false)),
            ("1 == 2", boolean(false)),
            ("1 != 2", boolean(true)),
            ("true == true", boolean(true)),
            ("false == false", boolean(true)),
            ("true == false", boolean(false)),
            ("true != false", boolean(true)),
            ("(1 < 2) == true", boolean(true)),
            ("(1 < 2) == false", boolean(false)),
            ("\"a\" == \"a\"", boolean(true)),
            ("\"a\" != \"b\"", boolean(true)),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_bang_operator() {
        let cases = vec![
            ("!true", boolean(false)),
            ("!false", boolean(true)),
            ("!5", boolean(false)),
            ("!!true", boolean(true)),
            ("!!false", boolean(false)),
            ("!!5", boolean(true)),
            ("!0", boolean(false)),
            ("!\"\"", boolean(false)),
            // if-without-else yields null, which is falsy
            ("!if (false) { 1 }", boolean(true)),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_if_expressions() {
        let cases = vec![
            ("if (true) { 10 }", int(10)),
            ("if (false) { 10 }", null()),
            ("if (1) { 10 }", int(10)),
            ("if (1 < 2) { 10 }", int(10)),
            ("if (1 > 2) { 10 }", null()),
            ("if (1 > 2) { 10 } else { 20 }", int(20)),
            ("if (1 < 2) { 10 } else { 20 }", int(10)),
            ("if (1 > 2) { 1 } else if (2 > 2) { 2 } else { 3 }", int(3)),
            ("if (1 > 2) { 1 } else if (2 > 1) { 2 } else { 3 }", int(2)),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_return_statements() {
        let cases = vec![
            ("return 10;", int(10)),
            ("return 10; 9;", int(10)),
            ("return 2 * 5; 9;", int(10)),
            ("9; return 2 * 5; 9;", int(10)),
            // A return deep in nested blocks skips the enclosing blocks too
            (
                "if (10 > 1) { if (10 > 1) { return 10; } return 1; }",
                int(10),
            ),
            (
                "let f = fn(x) { return x; x + 10; }; f(10);",
                int(10),
            ),
            (
                "let f = fn(x) { let result = x + 10; return result; return 10; }; f(10);",
                int(20),
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_error_handling() {
        let cases = vec![
            ("5 + true;", "type mismatch: Integer + Boolean"),
            ("5 + true; 5;", "type mismatch: Integer + Boolean"),
            ("-true", "unknown operator: -Boolean"),
            ("true + false;", "unknown operator: Boolean + Boolean"),
            ("5; true + false; 5", "unknown operator: Boolean + Boolean"),
            (
                "if (10 > 1) { true + false; }",
                "unknown operator: Boolean + Boolean",
            ),
            (
                "if (10 > 1) { if (10 > 1) { return true + false; } return 1; }",
                "unknown operator: Boolean + Boolean",
            ),
            ("foobar", "identifier not found: foobar"),
            ("\"Hello\" - \"World\"", "unknown operator: String - String"),
            ("true < false", "unknown operator: Boolean < Boolean"),
            // Equality does not coerce across kinds
            ("1 == true", "type mismatch: Integer == Boolean"),
            ("1 != \"1\"", "type mismatch: Integer != String"),
            ("[1, 2] == [1, 2]", "unknown operator: Array == Array"),
            ("5 / 0", "division by zero"),
            ("5 % 0", "division by zero"),
            (
                "9223372036854775807 + 1",
                "integer overflow evaluating `+`",
            ),
            (
                "-9223372036854775807 - 2",
                "integer overflow evaluating `-`",
            ),
            (
                "{\"name\": \"mico\"}[fn(x) { x }];",
                "unusable as hash key: Function",
            ),
            ("{[1]: 2}", "unusable as hash key: Array"),
            ("5[0]", "index operator not supported: Integer"),
            ("false(1)", "not a function: Boolean"),
            (
                "let f = fn(a) { a }; f(1, 2);",
                "wrong number of arguments: expected 1, got 2",
            ),
            (
                "len(\"one\", \"two\")",
                "wrong number of arguments: expected 1, got 2",
            ),
            // An error inside a composite literal aborts the whole literal
            ("[1, 2 + true, 3]", "type mismatch: Integer + Boolean"),
            ("{1: 2 + true}", "type mismatch: Integer + Boolean"),
            (
                "let f = fn(a) { a }; f(1 + true)",
                "type mismatch: Integer + Boolean",
            ),
        ];

        for (input, expected) in cases {
            match run(input) {
                Err(error) => {
                    assert_eq!(error.to_string(), expected, "error for '{input}'");
                }
                Ok(value) => panic!("expected error for '{input}', got {value:?}"),
            }
        }
    }

    #[test]
    fn test_let_statements() {
        let cases = vec![
            ("let a = 5; a;", int(5)),
            ("let a = 5 * 5; a;", int(25)),
            ("let a = 5; let b = a; b;", int(5)),
            ("let a = 5; let b = a; let c = a + b + 5; c;", int(15)),
            // Shadowing in an inner scope leaves the outer binding intact
            (
                "let x = 1; let f = fn() { let x = 2; x }; f() + x;",
                int(3),
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_function_application() {
        let cases = vec![
            ("let identity = fn(x) { x; }; identity(5);", int(5)),
            ("let identity = fn(x) { return x; }; identity(5);", int(5)),
            ("let double = fn(x) { x * 2; }; double(5);", int(10)),
            ("let add = fn(x, y) { x + y; }; add(5, 5);", int(10)),
            (
                "let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));",
                int(20),
            ),
            ("fn(x) { x; }(5)", int(5)),
            (
                "let apply = fn(a, b, func) { func(a, b) }; apply(2, 2, fn(a, b) { a * b });",
                int(4),
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_closures() {
        let input = "
            let newAdder = fn(x) { fn(y) { x + y }; };
            let addTwo = newAdder(2);
            addTwo(3);";
        assert_eq!(run(input), int(5));

        // The captured environment is shared, not copied: a closure sees a
        // binding added to its defining scope after the closure was created
        let input = "
            let f = fn() { x };
            let x = 7;
            f();";
        assert_eq!(run(input), int(7));
    }

    #[test]
    fn test_recursion() {
        let input = "
            let fib = fn(n) {
                if (n < 2) { n } else { fib(n - 1) + fib(n - 2) }
            };
            fib(10);";
        assert_eq!(run(input), int(55));
    }

    #[test]
    fn test_string_operations() {
        let cases = vec![
            ("\"Hello World!\"", "Hello World!"),
            ("\"Hello\" + \" \" + \"World!\"", "Hello World!"),
        ];

        for (input, expected) in cases {
            match run(input) {
                Ok(Value::String(text)) => assert_eq!(text.as_str(), expected),
                other => panic!("expected string for '{input}', got {other:?}"),
            }
        }

        assert_eq!(run("len(\"hello\")"), int(5));
    }

    #[test]
    fn test_array_literals_and_indexing() {
        assert_eq!(
            run("[1, 2 * 2, 3 + 3]"),
            Ok(Value::Array(vec![
                Value::Integer(1),
                Value::Integer(4),
                Value::Integer(6)
            ]))
        );

        let cases = vec![
            ("[1, 2, 3][0]", int(1)),
            ("[1, 2, 3][1]", int(2)),
            ("[1, 2, 3][2]", int(3)),
            ("let i = 0; [1][i];", int(1)),
            ("[1, 2, 3][1 + 1];", int(3)),
            ("let myArray = [1, 2, 3]; myArray[2];", int(3)),
            (
                "let myArray = [1, 2, 3]; myArray[0] + myArray[1] + myArray[2];",
                int(6),
            ),
            ("let myArray = [1, 2, 3]; let i = myArray[0]; myArray[i]", int(2)),
            ("[1, 2, 3][3]", null()),
            ("[1, 2, 3][-1]", null()),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_hash_literals() {
        let input = "
            let two = \"two\";
            {
                \"one\": 10 - 9,
                two: 1 + 1,
                \"thr\" + \"ee\": 6 / 2,
                4: 4,
                true: 5,
                false: 6
            }";
        let value = run(input).unwrap();
        let Value::Hash(map) = value else {
            panic!("expected hash, got {value:?}");
        };

        let expected = vec![
            (Value::String(Text::from("one")), 1),
            (Value::String(Text::from("two")), 2),
            (Value::String(Text::from("three")), 3),
            (Value::Integer(4), 4),
            (Value::Boolean(true), 5),
            (Value::Boolean(false), 6),
        ];
        assert_eq!(map.len(), expected.len());
        for (key, value) in expected {
            let pair = map.get(&key.hash_key().unwrap()).unwrap();
            assert_eq!(pair.value, Value::Integer(value), "value under {key:?}");
        }
    }

    #[test]
    fn test_hash_indexing() {
        let cases = vec![
            // Distinct string values with equal content hit the same slot
            ("{\"foo\": 1}[\"foo\"]", int(1)),
            ("{\"foo\": 5}[\"bar\"]", null()),
            ("let key = \"foo\"; {\"foo\": 5}[key]", int(5)),
            ("{}[\"foo\"]", null()),
            ("{5: 5}[5]", int(5)),
            ("{true: 5}[true]", int(5)),
            ("{false: 5}[false]", int(5)),
            ("[{\"name\": \"Alice\"}, {\"name\": \"Bob\"}][1][\"name\"]", {
                Ok(Value::String(Text::from("Bob")))
            }),
        ];

        for (input, expected) in cases {
            assert_eq!(run(input), expected, "eval of '{input}'");
        }
    }

    #[test]
    fn test_builtins_resolve_after_environment() {
        // The builtin is reachable as a value and callable
        assert_eq!(run("len([1, 2, 3])"), int(3));
        assert_eq!(
            run("let l = len; l(\"four\")"),
            int(4)
        );
        // A let binding shadows the builtin of the same name
        assert_eq!(run("let len = fn(x) { 0 }; len(\"abc\")"), int(0));
    }

    #[test]
    fn test_function_display() {
        let value = run("fn(x) { x + 2; }").unwrap();
        assert_eq!(value.to_string(), "fn(x) { (x + 2) }");
    }
}
