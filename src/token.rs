//! Token definitions shared between the lexer and the parser.
//!
//! A [`Token`] pairs a [`TokenKind`] with the literal text it was scanned
//! from and the 1-based line/column of its first character, which the parser
//! uses for diagnostics.

/// The closed set of token kinds the lexer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An unrecognized character or an unterminated string literal.
    /// Produced instead of failing, so the parser can report it in context.
    Illegal,
    /// End of input. Produced forever once the input is exhausted.
    Eof,

    Ident,
    Int,
    Str,

    Assign,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,

    Bang,
    Lt,
    Gt,
    Eq,
    NotEq,

    Comma,
    Semicolon,
    Colon,
    Lparen,
    Rparen,
    Lbrace,
    Rbrace,
    Lbracket,
    Rbracket,

    Function,
    Let,
    True,
    False,
    If,
    Else,
    Return,
    Macro,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::Illegal => "illegal token",
            TokenKind::Eof => "end of input",
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer literal",
            TokenKind::Str => "string literal",
            TokenKind::Assign => "`=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Asterisk => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::Bang => "`!`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::Eq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Colon => "`:`",
            TokenKind::Lparen => "`(`",
            TokenKind::Rparen => "`)`",
            TokenKind::Lbrace => "`{`",
            TokenKind::Rbrace => "`}`",
            TokenKind::Lbracket => "`[`",
            TokenKind::Rbracket => "`]`",
            TokenKind::Function => "`fn`",
            TokenKind::Let => "`let`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::If => "`if`",
            TokenKind::Else => "`else`",
            TokenKind::Return => "`return`",
            TokenKind::Macro => "`macro`",
        };
        write!(f, "{text}")
    }
}

/// One lexed token with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The scanned text. For string literals this is the unescaped content;
    /// for `Eof` it is empty.
    pub literal: String,
    /// 1-based line of the token's first character.
    pub line: u32,
    /// 1-based column of the token's first character.
    pub column: u32,
}

impl Token {
    pub(crate) fn new(
        kind: TokenKind,
        literal: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Token {
            kind,
            literal: literal.into(),
            line,
            column,
        }
    }
}

/// Map an identifier to its keyword kind, or `Ident` if it is not reserved.
pub fn lookup_ident(ident: &str) -> TokenKind {
    match ident {
        "fn" => TokenKind::Function,
        "let" => TokenKind::Let,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        "macro" => TokenKind::Macro,
        _ => TokenKind::Ident,
    }
}
