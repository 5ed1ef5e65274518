//! Error kinds raised by the query core.
//!
//! Every error here describes bad caller input (malformed filter text, an
//! unknown field, an unknown view). None of them are transient.

use std::fmt;

use thiserror::Error;

/// Result type for query core operations
pub type QueryResult<T> = Result<T, QueryError>;

/// The tokenizer met a character it does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Byte offset into the filter string
    pub position: usize,
    pub message: String,
}

impl LexError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

/// The token stream does not form a valid expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset into the input string
    pub position: usize,
    pub message: String,
    /// What the parser would have accepted at `position`
    pub expected: Vec<String>,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    pub fn expecting<I, S>(mut self, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected = expected.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)?;
        if !self.expected.is_empty() {
            write!(f, " (expected {})", self.expected.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("lex error: {0}")]
    Lex(LexError),

    #[error("parse error: {0}")]
    Parse(ParseError),

    #[error("unknown field '{field}' (available: {})", .available.join(", "))]
    UnknownField { field: String, available: Vec<String> },

    #[error("field '{field}' is not {required}")]
    Capability {
        field: String,
        required: &'static str,
    },

    #[error("type mismatch on field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("view '{name}' not found (available: {})", .available.join(", "))]
    UnknownView { name: String, available: Vec<String> },

    #[error("no default view set")]
    NoDefaultView,
}

impl QueryError {
    /// Stable code for translating the error at an API boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Lex(_) => "lex_error",
            QueryError::Parse(_) => "parse_error",
            QueryError::UnknownField { .. } => "unknown_field",
            QueryError::Capability { .. } => "capability",
            QueryError::TypeMismatch { .. } => "type_mismatch",
            QueryError::UnknownView { .. } => "unknown_view",
            QueryError::NoDefaultView => "no_default_view",
        }
    }

    pub(crate) fn type_mismatch(
        field: impl Into<String>,
        expected: impl fmt::Display,
        got: impl fmt::Display,
    ) -> Self {
        QueryError::TypeMismatch {
            field: field.into(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

impl From<LexError> for QueryError {
    fn from(err: LexError) -> Self {
        QueryError::Lex(err)
    }
}

impl From<ParseError> for QueryError {
    fn from(err: ParseError) -> Self {
        QueryError::Parse(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_available_fields() {
        let err = QueryError::UnknownField {
            field: "unknownField".to_string(),
            available: vec!["age".to_string(), "name".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown field 'unknownField' (available: age, name)"
        );
        assert_eq!(err.kind(), "unknown_field");
    }

    #[test]
    fn test_parse_error_display_with_expected() {
        let err = ParseError::new(4, "Unexpected end of input").expecting(["value"]);
        assert_eq!(
            err.to_string(),
            "Unexpected end of input at position 4 (expected value)"
        );
    }
}
