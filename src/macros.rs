//! Macro collection, expansion and `quote`/`unquote` processing.
//!
//! Macros run in two passes before any ordinary evaluation:
//!
//! 1. **Collection** ([`define_macros`]): top-level `let <name> = macro(...)
//!    { ... }` statements are removed from the program and bound as
//!    [`Value::Macro`] in a dedicated macro environment. Macro literals
//!    anywhere else are left in place and rejected later by the evaluator.
//! 2. **Expansion** ([`expand_macros`]): the remaining tree is rewritten
//!    depth-first. Each call whose callee names a collected macro is replaced
//!    by the result of evaluating the macro body with every argument bound
//!    *unevaluated*, as a [`Value::Quote`]. The body must produce a quote;
//!    its wrapped node is spliced into the tree in place of the call.
//!
//! Expansion is a single pass: a macro that expands into another macro call
//! leaves that call for the evaluator to trip over, it is not re-expanded.
//!
//! `quote(...)` itself is evaluated lazily by the evaluator, which hands the
//! unevaluated argument to [`quote`] here. The walk evaluates every
//! `unquote(...)` call inside and converts the resulting value back into
//! syntax: integers, booleans and strings become the corresponding literals,
//! a quote value splices its wrapped node, and anything else is an error
//! rather than a guess.

use std::mem;
use std::rc::Rc;

use crate::RuntimeError;
use crate::ast::{Block, Expression, Program, Statement};
use crate::builtins::Arity;
use crate::evaluator::{self, Signal};
use crate::value::{Env, FunctionValue, Value};

/// Collection pass: strip top-level macro definitions out of `program` and
/// bind them in `macro_env`.
pub fn define_macros(program: &mut Program, macro_env: &Env) {
    let statements = mem::take(&mut program.statements);
    for statement in statements {
        match statement {
            Statement::Let {
                name,
                value: Expression::MacroLiteral { parameters, body },
            } => {
                log::debug!("collected macro `{name}`");
                let function = FunctionValue {
                    parameters,
                    body,
                    env: Rc::clone(macro_env),
                };
                macro_env.set(name, Value::Macro(Rc::new(function)));
            }
            other => program.statements.push(other),
        }
    }
}

/// Expansion pass: rewrite every macro call site in `program` using the
/// macros collected in `macro_env`.
pub fn expand_macros(program: Program, macro_env: &Env) -> Result<Program, RuntimeError> {
    let statements = program
        .statements
        .into_iter()
        .map(|statement| expand_statement(statement, macro_env))
        .collect::<Result<_, _>>()?;
    Ok(Program { statements })
}

fn expand_statement(statement: Statement, env: &Env) -> Result<Statement, RuntimeError> {
    Ok(match statement {
        Statement::Let { name, value } => Statement::Let {
            name,
            value: expand_expression(value, env)?,
        },
        Statement::Return(value) => Statement::Return(expand_expression(value, env)?),
        Statement::Expression(expression) => {
            Statement::Expression(expand_expression(expression, env)?)
        }
    })
}

fn expand_block(block: Block, env: &Env) -> Result<Block, RuntimeError> {
    let statements = block
        .statements
        .into_iter()
        .map(|statement| expand_statement(statement, env))
        .collect::<Result<_, _>>()?;
    Ok(Block { statements })
}

/// Depth-first rewrite: children are expanded before the node itself, so a
/// macro call nested in the arguments of another macro call expands first.
fn expand_expression(expression: Expression, env: &Env) -> Result<Expression, RuntimeError> {
    Ok(match expression {
        Expression::Prefix { operator, operand } => Expression::Prefix {
            operator,
            operand: Box::new(expand_expression(*operand, env)?),
        },
        Expression::Infix {
            operator,
            left,
            right,
        } => Expression::Infix {
            operator,
            left: Box::new(expand_expression(*left, env)?),
            right: Box::new(expand_expression(*right, env)?),
        },
        Expression::If {
            condition,
            consequence,
            alternative,
        } => Expression::If {
            condition: Box::new(expand_expression(*condition, env)?),
            consequence: expand_block(consequence, env)?,
            alternative: alternative
                .map(|alternative| expand_block(alternative, env))
                .transpose()?,
        },
        Expression::FunctionLiteral { parameters, body } => Expression::FunctionLiteral {
            parameters,
            body: expand_block(body, env)?,
        },
        Expression::Call {
            function,
            arguments,
        } => {
            let function = Box::new(expand_expression(*function, env)?);
            let arguments = arguments
                .into_iter()
                .map(|argument| expand_expression(argument, env))
                .collect::<Result<Vec<_>, _>>()?;

            if let Expression::Identifier(name) = function.as_ref() {
                if let Some(Value::Macro(makro)) = env.get(name) {
                    return apply_macro(&makro, arguments);
                }
            }
            Expression::Call {
                function,
                arguments,
            }
        }
        Expression::ArrayLiteral(elements) => Expression::ArrayLiteral(
            elements
                .into_iter()
                .map(|element| expand_expression(element, env))
                .collect::<Result<_, _>>()?,
        ),
        Expression::Index { left, index } => Expression::Index {
            left: Box::new(expand_expression(*left, env)?),
            index: Box::new(expand_expression(*index, env)?),
        },
        Expression::HashLiteral(pairs) => Expression::HashLiteral(
            pairs
                .into_iter()
                .map(|(key, value)| {
                    Ok((expand_expression(key, env)?, expand_expression(value, env)?))
                })
                .collect::<Result<_, _>>()?,
        ),
        other => other,
    })
}

/// Evaluate one macro body with its arguments bound as quoted syntax and
/// splice the resulting quote into the tree.
fn apply_macro(
    makro: &Rc<FunctionValue>,
    arguments: Vec<Expression>,
) -> Result<Expression, RuntimeError> {
    Arity::Exact(makro.parameters.len()).validate(arguments.len())?;

    let quoted: Vec<Value> = arguments.into_iter().map(Value::Quote).collect();
    let function = Value::Function(Rc::clone(makro));
    let result = evaluator::apply_function(&function, quoted).map_err(|signal| match signal {
        Signal::Error(error) => error,
        // apply_function unwraps returns at the call boundary already
        Signal::Return(_) => {
            RuntimeError::MacroExpansion("`return` escaped a macro body".to_owned())
        }
    })?;

    match result {
        Value::Quote(node) => Ok(node),
        other => Err(RuntimeError::MacroExpansion(format!(
            "macro must return a quoted expression, got {}",
            other.kind()
        ))),
    }
}

/// Process the unevaluated argument of a `quote(...)` call: evaluate every
/// `unquote(...)` inside and splice the results back in as syntax.
pub fn quote(expression: Expression, env: &Env) -> Result<Expression, RuntimeError> {
    let expression = quote_children(expression, env)?;

    if let Expression::Call {
        function,
        arguments,
    } = &expression
    {
        if matches!(function.as_ref(), Expression::Identifier(name) if name == "unquote") {
            if arguments.len() != 1 {
                return Err(RuntimeError::WrongArity {
                    expected: Arity::Exact(1),
                    got: arguments.len(),
                });
            }
            let value = match evaluator::eval_expression(&arguments[0], env) {
                Ok(value) | Err(Signal::Return(value)) => value,
                Err(Signal::Error(error)) => return Err(error),
            };
            return value_to_expression(value);
        }
    }

    Ok(expression)
}

/// Recurse into every child expression so nested `unquote` calls are
/// processed innermost-first.
fn quote_children(expression: Expression, env: &Env) -> Result<Expression, RuntimeError> {
    Ok(match expression {
        Expression::Prefix { operator, operand } => Expression::Prefix {
            operator,
            operand: Box::new(quote(*operand, env)?),
        },
        Expression::Infix {
            operator,
            left,
            right,
        } => Expression::Infix {
            operator,
            left: Box::new(quote(*left, env)?),
            right: Box::new(quote(*right, env)?),
        },
        Expression::If {
            condition,
            consequence,
            alternative,
        } => Expression::If {
            condition: Box::new(quote(*condition, env)?),
            consequence: quote_block(consequence, env)?,
            alternative: alternative
                .map(|alternative| quote_block(alternative, env))
                .transpose()?,
        },
        Expression::FunctionLiteral { parameters, body } => Expression::FunctionLiteral {
            parameters,
            body: quote_block(body, env)?,
        },
        Expression::Call {
            function,
            arguments,
        } => Expression::Call {
            function: Box::new(quote(*function, env)?),
            arguments: arguments
                .into_iter()
                .map(|argument| quote(argument, env))
                .collect::<Result<_, _>>()?,
        },
        Expression::ArrayLiteral(elements) => Expression::ArrayLiteral(
            elements
                .into_iter()
                .map(|element| quote(element, env))
                .collect::<Result<_, _>>()?,
        ),
        Expression::Index { left, index } => Expression::Index {
            left: Box::new(quote(*left, env)?),
            index: Box::new(quote(*index, env)?),
        },
        Expression::HashLiteral(pairs) => Expression::HashLiteral(
            pairs
                .into_iter()
                .map(|(key, value)| Ok((quote(key, env)?, quote(value, env)?)))
                .collect::<Result<_, _>>()?,
        ),
        other => other,
    })
}

fn quote_block(block: Block, env: &Env) -> Result<Block, RuntimeError> {
    let statements = block
        .statements
        .into_iter()
        .map(|statement| {
            Ok(match statement {
                Statement::Let { name, value } => Statement::Let {
                    name,
                    value: quote(value, env)?,
                },
                Statement::Return(value) => Statement::Return(quote(value, env)?),
                Statement::Expression(expression) => Statement::Expression(quote(expression, env)?),
            })
        })
        .collect::<Result<_, _>>()?;
    Ok(Block { statements })
}

/// Convert an unquoted value back into a syntax node. Only values with a
/// literal form can be spliced.
fn value_to_expression(value: Value) -> Result<Expression, RuntimeError> {
    match value {
        Value::Integer(value) => Ok(Expression::IntegerLiteral(value)),
        Value::Boolean(value) => Ok(Expression::BooleanLiteral(value)),
        Value::String(text) => Ok(Expression::StringLiteral(text.as_str().to_owned())),
        Value::Quote(node) => Ok(node),
        other => Err(RuntimeError::MacroExpansion(format!(
            "cannot unquote a value of type {}",
            other.kind()
        ))),
    }
}
