//! Precedence-climbing ("Pratt") parser over the token stream.
//!
//! Every token kind that can begin an expression has a prefix rule; every
//! infix-capable token has an infix rule plus a precedence level.
//! [`Parser::parse_expression`] parses one prefix term, then keeps consuming
//! infix operators while the upcoming token binds tighter than the caller's
//! minimum precedence, associating to the left.
//!
//! Syntax errors are non-fatal: the parser records a message, abandons the
//! current statement, skips ahead to the next statement boundary and keeps
//! going, so one parse surfaces as many errors as possible. Callers must
//! refuse to evaluate a [`Program`] produced alongside a non-empty error
//! list.

use crate::ast::{Block, Expression, InfixOperator, PrefixOperator, Program, Statement};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Operator binding strength, low to high. `Lowest` is the entry threshold
/// and never assigned to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    /// `==` `!=`
    Equals,
    /// `<` `>`
    LessGreater,
    /// `+` `-`
    Sum,
    /// `*` `/` `%`
    Product,
    /// `!x` `-x`
    Prefix,
    /// `f(...)` and `a[...]`
    Call,
}

fn infix_precedence(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        TokenKind::Lparen | TokenKind::Lbracket => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    peek: Token,
    errors: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Parser {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
        }
    }

    /// Parse the whole token stream into a [`Program`]. Check [`Parser::errors`]
    /// afterwards; the returned tree is fragmentary if any were recorded.
    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while self.cur.kind != TokenKind::Eof {
            match self.parse_statement() {
                Some(statement) => program.statements.push(statement),
                None => self.synchronize(),
            }
            self.next_token();
        }
        program
    }

    /// Syntax error messages accumulated so far, in source order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn next_token(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    /// Advance if the next token matches, otherwise record an error.
    fn expect_peek(&mut self, expected: TokenKind) -> bool {
        if self.peek_is(expected) {
            self.next_token();
            true
        } else {
            self.errors.push(format!(
                "{}:{}: expected {}, got {}",
                self.peek.line, self.peek.column, expected, self.peek.kind
            ));
            false
        }
    }

    /// Abandon the current statement: skip tokens until a statement boundary
    /// so the next statement parses from a clean state.
    fn synchronize(&mut self) {
        log::debug!(
            "recovering from syntax error near {}:{}",
            self.cur.line,
            self.cur.column
        );
        while !matches!(
            self.cur.kind,
            TokenKind::Semicolon | TokenKind::Rbrace | TokenKind::Eof
        ) {
            self.next_token();
        }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur.kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.cur.literal.clone();
        if !self.expect_peek(TokenKind::Assign) {
            return None;
        }
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
        Some(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
        Some(Statement::Return(value))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        // A trailing semicolon is optional
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
        Some(Statement::Expression(expression))
    }

    fn parse_expression(&mut self, min_precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(TokenKind::Semicolon)
            && min_precedence < infix_precedence(self.peek.kind)
        {
            left = match self.peek.kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Eq
                | TokenKind::NotEq => {
                    self.next_token();
                    self.parse_infix_expression(left)?
                }
                TokenKind::Lparen => {
                    self.next_token();
                    self.parse_call_expression(left)?
                }
                TokenKind::Lbracket => {
                    self.next_token();
                    self.parse_index_expression(left)?
                }
                _ => break,
            };
        }

        Some(left)
    }

    /// Dispatch on the token kinds that can begin an expression.
    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur.kind {
            TokenKind::Ident => Some(Expression::Identifier(self.cur.literal.clone())),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Str => Some(Expression::StringLiteral(self.cur.literal.clone())),
            TokenKind::True => Some(Expression::BooleanLiteral(true)),
            TokenKind::False => Some(Expression::BooleanLiteral(false)),
            TokenKind::Bang => self.parse_prefix_expression(PrefixOperator::Not),
            TokenKind::Minus => self.parse_prefix_expression(PrefixOperator::Negate),
            TokenKind::Lparen => self.parse_grouped_expression(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Function => self.parse_function_like_literal(false),
            TokenKind::Macro => self.parse_function_like_literal(true),
            TokenKind::Lbracket => {
                let elements = self.parse_expression_list(TokenKind::Rbracket)?;
                Some(Expression::ArrayLiteral(elements))
            }
            TokenKind::Lbrace => self.parse_hash_literal(),
            other => {
                self.errors.push(format!(
                    "{}:{}: expected an expression, got {}",
                    self.cur.line, self.cur.column, other
                ));
                None
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        match self.cur.literal.parse::<i64>() {
            Ok(value) => Some(Expression::IntegerLiteral(value)),
            Err(_) => {
                self.errors.push(format!(
                    "{}:{}: integer literal `{}` does not fit in 64 bits",
                    self.cur.line, self.cur.column, self.cur.literal
                ));
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self, operator: PrefixOperator) -> Option<Expression> {
        self.next_token();
        let operand = self.parse_expression(Precedence::Prefix)?;
        Some(Expression::Prefix {
            operator,
            operand: Box::new(operand),
        })
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let operator = match self.cur.kind {
            TokenKind::Plus => InfixOperator::Add,
            TokenKind::Minus => InfixOperator::Sub,
            TokenKind::Asterisk => InfixOperator::Mul,
            TokenKind::Slash => InfixOperator::Div,
            TokenKind::Percent => InfixOperator::Rem,
            TokenKind::Lt => InfixOperator::Lt,
            TokenKind::Gt => InfixOperator::Gt,
            TokenKind::Eq => InfixOperator::Eq,
            TokenKind::NotEq => InfixOperator::NotEq,
            _ => unreachable!("parse_infix_expression called on a non-infix token"),
        };
        let precedence = infix_precedence(self.cur.kind);
        self.next_token();
        // Passing the operator's own precedence makes operators of equal
        // strength associate to the left.
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::Rparen) {
            return None;
        }
        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        if !self.expect_peek(TokenKind::Lparen) {
            return None;
        }
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::Rparen) {
            return None;
        }
        if !self.expect_peek(TokenKind::Lbrace) {
            return None;
        }
        let consequence = self.parse_block();

        let alternative = if self.peek_is(TokenKind::Else) {
            self.next_token();
            if self.peek_is(TokenKind::If) {
                // `else if`: wrap the chained if-expression in a synthetic block
                self.next_token();
                let nested = self.parse_if_expression()?;
                Some(Block {
                    statements: vec![Statement::Expression(nested)],
                })
            } else {
                if !self.expect_peek(TokenKind::Lbrace) {
                    return None;
                }
                Some(self.parse_block())
            }
        } else {
            None
        };

        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    /// Parse a brace-delimited statement sequence. The current token must be
    /// the opening brace.
    fn parse_block(&mut self) -> Block {
        let mut block = Block::default();
        self.next_token();
        while !matches!(self.cur.kind, TokenKind::Rbrace | TokenKind::Eof) {
            match self.parse_statement() {
                Some(statement) => block.statements.push(statement),
                None => self.synchronize(),
            }
            self.next_token();
        }
        if self.cur.kind != TokenKind::Rbrace {
            self.errors.push(format!(
                "{}:{}: expected {}, got {}",
                self.cur.line,
                self.cur.column,
                TokenKind::Rbrace,
                self.cur.kind
            ));
        }
        block
    }

    /// `fn(...) { ... }` and `macro(...) { ... }` share one shape.
    fn parse_function_like_literal(&mut self, is_macro: bool) -> Option<Expression> {
        if !self.expect_peek(TokenKind::Lparen) {
            return None;
        }
        let parameters = self.parse_parameters()?;
        if !self.expect_peek(TokenKind::Lbrace) {
            return None;
        }
        let body = self.parse_block();
        if is_macro {
            Some(Expression::MacroLiteral { parameters, body })
        } else {
            Some(Expression::FunctionLiteral { parameters, body })
        }
    }

    fn parse_parameters(&mut self) -> Option<Vec<String>> {
        let mut parameters = Vec::new();

        if self.peek_is(TokenKind::Rparen) {
            self.next_token();
            return Some(parameters);
        }

        self.next_token();
        parameters.push(self.parameter_name()?);

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            parameters.push(self.parameter_name()?);
        }

        if !self.expect_peek(TokenKind::Rparen) {
            return None;
        }
        Some(parameters)
    }

    fn parameter_name(&mut self) -> Option<String> {
        if self.cur.kind == TokenKind::Ident {
            Some(self.cur.literal.clone())
        } else {
            self.errors.push(format!(
                "{}:{}: expected {}, got {}",
                self.cur.line,
                self.cur.column,
                TokenKind::Ident,
                self.cur.kind
            ));
            None
        }
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let arguments = self.parse_expression_list(TokenKind::Rparen)?;
        Some(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    /// Parse a comma-separated expression list up to the closing `end` token.
    /// The current token must be the opening delimiter.
    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut list = Vec::new();

        if self.peek_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }
        Some(list)
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::Rbracket) {
            return None;
        }
        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    /// Parse `{key: value, ...}` pairs in source order. The current token
    /// must be the opening brace; `{}` is a valid empty hash.
    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();

        while !self.peek_is(TokenKind::Rbrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            if !self.expect_peek(TokenKind::Colon) {
                return None;
            }
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(TokenKind::Rbrace) && !self.expect_peek(TokenKind::Comma) {
                return None;
            }
        }

        if !self.expect_peek(TokenKind::Rbrace) {
            return None;
        }
        Some(Expression::HashLiteral(pairs))
    }
}
