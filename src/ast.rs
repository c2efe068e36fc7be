//! Abstract syntax tree produced by the parser and consumed by the
//! evaluator and the macro expander.
//!
//! Every node renders itself back to source-equivalent text through
//! [`std::fmt::Display`]. The rendering is fully parenthesized for prefix and
//! infix expressions, so re-parsing a rendered node is always semantically
//! equivalent to the original (and a fixed point for expression forms). The
//! same rendering is used when values that wrap syntax (functions, macros,
//! quoted nodes) are displayed.
//!
//! Each node exclusively owns its children; the tree has no sharing and no
//! cycles, so cloning a node clones the whole subtree.

/// An ordered sequence of top-level statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let <name> = <value>;`
    Let { name: String, value: Expression },
    /// `return <value>;`
    Return(Expression),
    /// A bare expression in statement position.
    Expression(Expression),
}

/// A brace-delimited statement sequence, as used by `if`, `fn` and `macro`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

/// Prefix (unary) operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOperator {
    /// `!`, logical negation of truthiness
    Not,
    /// `-`, integer negation
    Negate,
}

impl std::fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixOperator::Not => write!(f, "!"),
            PrefixOperator::Negate => write!(f, "-"),
        }
    }
}

/// Infix (binary) operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Eq,
    NotEq,
}

impl std::fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            InfixOperator::Add => "+",
            InfixOperator::Sub => "-",
            InfixOperator::Mul => "*",
            InfixOperator::Div => "/",
            InfixOperator::Rem => "%",
            InfixOperator::Lt => "<",
            InfixOperator::Gt => ">",
            InfixOperator::Eq => "==",
            InfixOperator::NotEq => "!=",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(String),
    IntegerLiteral(i64),
    StringLiteral(String),
    BooleanLiteral(bool),
    Prefix {
        operator: PrefixOperator,
        operand: Box<Expression>,
    },
    Infix {
        operator: InfixOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        consequence: Block,
        alternative: Option<Block>,
    },
    FunctionLiteral {
        parameters: Vec<String>,
        body: Block,
    },
    /// `macro(<params>) { <body> }` is shaped like a function literal, but
    /// is consumed by the macro collection pass before evaluation.
    MacroLiteral {
        parameters: Vec<String>,
        body: Block,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    ArrayLiteral(Vec<Expression>),
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
    /// Key/value expression pairs in source order.
    HashLiteral(Vec<(Expression, Expression)>),
}

/// Render a comma-separated list of displayable items.
fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.statements.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {name} = {value};"),
            Statement::Return(value) => write!(f, "return {value};"),
            Statement::Expression(expr) => write!(f, "{expr}"),
        }
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ ")?;
        for statement in &self.statements {
            write!(f, "{statement} ")?;
        }
        write!(f, "}}")
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{name}"),
            Expression::IntegerLiteral(value) => write!(f, "{value}"),
            Expression::StringLiteral(value) => write!(f, "\"{value}\""),
            Expression::BooleanLiteral(value) => write!(f, "{value}"),
            Expression::Prefix { operator, operand } => write!(f, "({operator}{operand})"),
            Expression::Infix {
                operator,
                left,
                right,
            } => write!(f, "({left} {operator} {right})"),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if ({condition}) {consequence}")?;
                if let Some(alternative) = alternative {
                    write!(f, " else {alternative}")?;
                }
                Ok(())
            }
            Expression::FunctionLiteral { parameters, body } => {
                write!(f, "fn({}) {body}", join(parameters))
            }
            Expression::MacroLiteral { parameters, body } => {
                write!(f, "macro({}) {body}", join(parameters))
            }
            Expression::Call {
                function,
                arguments,
            } => write!(f, "{function}({})", join(arguments)),
            Expression::ArrayLiteral(elements) => write!(f, "[{}]", join(elements)),
            Expression::Index { left, index } => write!(f, "({left}[{index}])"),
            Expression::HashLiteral(pairs) => {
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_source_equivalent_text() {
        let program = Program {
            statements: vec![Statement::Let {
                name: "myVar".to_owned(),
                value: Expression::Identifier("anotherVar".to_owned()),
            }],
        };
        assert_eq!(program.to_string(), "let myVar = anotherVar;");
    }

    #[test]
    fn test_display_parenthesizes_expressions() {
        let expr = Expression::Infix {
            operator: InfixOperator::Mul,
            left: Box::new(Expression::Prefix {
                operator: PrefixOperator::Negate,
                operand: Box::new(Expression::Identifier("a".to_owned())),
            }),
            right: Box::new(Expression::Identifier("b".to_owned())),
        };
        assert_eq!(expr.to_string(), "((-a) * b)");
    }
}
