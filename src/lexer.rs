//! The lexer: turns source text into a lazy stream of [`Token`]s.
//!
//! Tokens are produced on demand through [`Lexer::next_token`]. The stream
//! never fails: unrecognized characters and unterminated strings come back as
//! `Illegal` tokens, and once the input is exhausted every further call
//! returns an `Eof` token, so consumers can pull past the end safely.
//!
//! Individual token shapes (operators, identifiers, numbers, strings) are
//! recognized with `nom` combinators; the lexer itself only drives them and
//! tracks line/column positions for diagnostics.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::value,
};

use crate::token::{Token, TokenKind, lookup_ident};

/// A restartable tokenizer over a borrowed source string.
pub struct Lexer<'a> {
    rest: &'a str,
    line: u32,
    column: u32,
}

/// Recognize a single operator or delimiter. Two-character operators must be
/// tried before their one-character prefixes.
fn scan_operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Eq, tag("==")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::Assign, tag("=")),
        value(TokenKind::Plus, tag("+")),
        value(TokenKind::Minus, tag("-")),
        value(TokenKind::Asterisk, tag("*")),
        value(TokenKind::Slash, tag("/")),
        value(TokenKind::Percent, tag("%")),
        value(TokenKind::Bang, tag("!")),
        value(TokenKind::Lt, tag("<")),
        value(TokenKind::Gt, tag(">")),
        value(TokenKind::Comma, tag(",")),
        value(TokenKind::Semicolon, tag(";")),
        value(TokenKind::Colon, tag(":")),
        value(TokenKind::Lparen, tag("(")),
        value(TokenKind::Rparen, tag(")")),
        value(TokenKind::Lbrace, tag("{")),
        value(TokenKind::Rbrace, tag("}")),
        value(TokenKind::Lbracket, tag("[")),
        value(TokenKind::Rbracket, tag("]")),
    ))
    .parse(input)
}

/// Recognize an identifier or keyword: ASCII letters and underscores.
fn scan_word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphabetic() || c == '_').parse(input)
}

/// Recognize a run of decimal digits. Overflow is not checked here; the
/// parser reports literals that do not fit an i64.
fn scan_digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit()).parse(input)
}

/// Recognize a double-quoted string literal and return its unescaped content.
/// Supported escapes: `\n \t \r \\ \"`. An unknown escape sequence is kept
/// verbatim. Fails on unterminated input so the caller can produce an
/// `Illegal` token instead.
fn scan_string(input: &str) -> IResult<&str, String> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut content = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), content)),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => content.push('\n'),
                    Some('t') => content.push('\t'),
                    Some('r') => content.push('\r'),
                    Some('\\') => content.push('\\'),
                    Some('"') => content.push('"'),
                    Some(other) => {
                        // Unknown escape: keep both characters as written
                        content.push('\\');
                        content.push(other);
                    }
                    None => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            nom::error::ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                content.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                // End of input before the closing quote
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            rest: source,
            line: 1,
            column: 1,
        }
    }

    /// Consume input up to `new_rest`, updating line/column along the way.
    fn advance_to(&mut self, new_rest: &'a str) {
        let consumed = &self.rest[..self.rest.len() - new_rest.len()];
        for ch in consumed.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.rest = new_rest;
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest.trim_start_matches([' ', '\t', '\r', '\n']);
        self.advance_to(trimmed);
    }

    /// Produce the next token. Never fails; see the module docs for how
    /// malformed input and end of input are represented.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let (line, column) = (self.line, self.column);

        if self.rest.is_empty() {
            return Token::new(TokenKind::Eof, "", line, column);
        }

        if self.rest.starts_with('"') {
            return match scan_string(self.rest) {
                Ok((remaining, content)) => {
                    self.advance_to(remaining);
                    Token::new(TokenKind::Str, content, line, column)
                }
                Err(_) => {
                    // Unterminated string: emit the rest of the input as one
                    // Illegal token rather than failing the scan.
                    let literal = self.rest.to_owned();
                    self.advance_to(&self.rest[self.rest.len()..]);
                    Token::new(TokenKind::Illegal, literal, line, column)
                }
            };
        }

        if let Ok((remaining, kind)) = scan_operator(self.rest) {
            let literal = &self.rest[..self.rest.len() - remaining.len()];
            let token = Token::new(kind, literal, line, column);
            self.advance_to(remaining);
            return token;
        }

        if let Ok((remaining, word)) = scan_word(self.rest) {
            let token = Token::new(lookup_ident(word), word, line, column);
            self.advance_to(remaining);
            return token;
        }

        if let Ok((remaining, digits)) = scan_digits(self.rest) {
            let token = Token::new(TokenKind::Int, digits, line, column);
            self.advance_to(remaining);
            return token;
        }

        // Unrecognized character: emit it as Illegal and keep going.
        let ch = self.rest.chars().next().expect("rest is non-empty");
        let token = Token::new(TokenKind::Illegal, ch.to_string(), line, column);
        self.advance_to(&self.rest[ch.len_utf8()..]);
        token
    }
}
