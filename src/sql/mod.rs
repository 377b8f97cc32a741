//! The minimal lexical scan the session needs: placeholder discovery and the
//! `insert ... from input(...)` shape. No SQL is parsed beyond that.

mod columns;
pub(crate) mod parsers;
pub(crate) mod scanner;

pub use columns::{ColumnSpec, parse_columns};

use crate::error::SessionError;
use crate::types::RowValues;
use scanner::{Token, TokenKind, tokenize};

/// SQL text with the byte offsets of its top-level `?` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizedQuery {
    sql: String,
    placeholders: Vec<usize>,
    pub(crate) tokens: Vec<Token>,
}

impl ParameterizedQuery {
    /// Scan `sql` for placeholders, ignoring anything inside literals, quoted identifiers
    /// and comments.
    ///
    /// # Errors
    /// Returns `SessionError::Client` if the text is empty, holds only whitespace and
    /// comments, or has an unterminated literal/comment.
    pub fn parse(sql: &str) -> Result<Self, SessionError> {
        if sql.trim().is_empty() {
            return Err(SessionError::Client("SQL must not be empty".to_string()));
        }
        let tokens = tokenize(sql)?;
        if tokens.is_empty() {
            return Err(SessionError::Client(
                "SQL contains no statement, only comments".to_string(),
            ));
        }

        let placeholders = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Placeholder)
            .map(|t| t.start)
            .collect();
        Ok(Self {
            sql: sql.to_string(),
            placeholders,
            tokens,
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn has_parameter(&self) -> bool {
        !self.placeholders.is_empty()
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.placeholders.len()
    }

    /// Inline `params` as literals in placeholder order.
    ///
    /// # Errors
    /// Returns `SessionError::Parameter` if the number of values differs from the number
    /// of placeholders.
    pub fn render(&self, params: &[RowValues]) -> Result<String, SessionError> {
        if params.len() != self.placeholders.len() {
            return Err(SessionError::Parameter(format!(
                "Expected {} parameter(s) but got {}",
                self.placeholders.len(),
                params.len()
            )));
        }

        let mut out = String::with_capacity(self.sql.len() + params.len() * 8);
        let mut last = 0;
        for (offset, value) in self.placeholders.iter().zip(params) {
            out.push_str(&self.sql[last..*offset]);
            out.push_str(&value.to_sql_literal());
            last = offset + 1;
        }
        out.push_str(&self.sql[last..]);
        Ok(out)
    }
}
