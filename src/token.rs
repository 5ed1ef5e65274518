//! The token definition for the filter language.

use std::borrow::Cow;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And, // "and"
    Or,  // "or"
    Not, // "not"

    // Word operators
    In,         // "in"
    Contains,   // "contains"
    StartsWith, // "startswith"
    EndsWith,   // "endswith"

    // Literals
    Identifier(&'a str),
    String(Cow<'a, str>), // Unquoted content; owned only when escapes were resolved
    Number(f64),
    True,
    False,
    Null,

    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,

    // Operators
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=
}

impl TokenKind<'_> {
    /// Short human-readable name used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::And => "'and'".to_string(),
            TokenKind::Or => "'or'".to_string(),
            TokenKind::Not => "'not'".to_string(),
            TokenKind::In => "'in'".to_string(),
            TokenKind::Contains => "'contains'".to_string(),
            TokenKind::StartsWith => "'startswith'".to_string(),
            TokenKind::EndsWith => "'endswith'".to_string(),
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::String(s) => format!("string '{}'", s),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::True => "'true'".to_string(),
            TokenKind::False => "'false'".to_string(),
            TokenKind::Null => "'null'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Gte => "'>='".to_string(),
            TokenKind::Lte => "'<='".to_string(),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
