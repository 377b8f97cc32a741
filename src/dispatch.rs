use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tracing::debug;

use crate::error::SessionError;
use crate::sql::parsers::{Argument, read_parameters, skip_until_keywords, unescape};
use crate::sql::scanner::{Token, TokenKind};
use crate::sql::{ColumnSpec, ParameterizedQuery, parse_columns};
use crate::statement::{ParameterizedStatement, Statement, StreamingInsertStatement};
use crate::transport::{QueryExecutor, Request};
use crate::tx::TransactionManager;

/// How a piece of SQL will be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// Plain statement, possibly with `?` placeholders.
    Parameterized(ParameterizedQuery),
    /// `insert into ... select ... from input('<structure>')` with exactly one literal
    /// structure argument and no placeholders.
    StreamingInsert(Vec<ColumnSpec>),
}

/// Decide which statement shape `sql` needs, without building anything.
///
/// Placeholders always win: a statement with `?` is parameterized even if it reads from
/// `input(...)`. An `input(...)` whose argument list is not a single string literal, or
/// that appears more than once, falls back to the parameterized path as well.
///
/// # Errors
/// - `SessionError::Client` for empty SQL, unterminated literals or a malformed column list.
pub fn classify(sql: &str) -> Result<StatementKind, SessionError> {
    let query = ParameterizedQuery::parse(sql)?;
    if query.has_parameter() {
        return Ok(StatementKind::Parameterized(query));
    }

    match input_structure(sql, &query.tokens)? {
        Some(columns) => Ok(StatementKind::StreamingInsert(columns)),
        None => Ok(StatementKind::Parameterized(query)),
    }
}

fn input_structure(sql: &str, tokens: &[Token]) -> Result<Option<Vec<ColumnSpec>>, SessionError> {
    let Some(after_insert) = skip_until_keywords(sql, tokens, 0, &["insert", "into"]) else {
        return Ok(None);
    };
    let Some(mut at) = skip_until_keywords(sql, tokens, after_insert, &["from", "input"]) else {
        return Ok(None);
    };

    let mut args = Vec::new();
    let mut calls = 0usize;
    while let Some((mut found, next)) = read_parameters(sql, tokens, at) {
        calls += 1;
        args.append(&mut found);
        match next_input_call(sql, tokens, next) {
            Some(open) => at = open,
            None => break,
        }
    }

    match (calls, args.as_slice()) {
        (1, [Argument::Literal(literal)]) => Ok(Some(parse_columns(&unescape(literal))?)),
        _ => {
            debug!(
                calls,
                arguments = args.len(),
                "input() is not a single literal structure, preparing as a plain statement"
            );
            Ok(None)
        }
    }
}

/// Index of the `(` of the next `input(` call at or after `from`.
fn next_input_call(sql: &str, tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len().saturating_sub(1)).find_map(|i| {
        (tokens[i].is_keyword(sql, "input") && tokens[i + 1].kind == TokenKind::Symbol(b'('))
            .then_some(i + 1)
    })
}

/// Builds statements for one connection.
///
/// Borrowed from the connection for the duration of a single `prepare` call; the
/// statements it returns own clones of everything they need.
pub(crate) struct StatementDispatcher<'a> {
    pub(crate) executor: &'a Arc<dyn QueryExecutor>,
    pub(crate) request: &'a Request,
    pub(crate) transactions: &'a TransactionManager,
    pub(crate) closed: &'a Arc<AtomicBool>,
    pub(crate) timeout: Option<Duration>,
}

impl StatementDispatcher<'_> {
    pub(crate) fn prepare(&self, sql: &str) -> Result<Statement, SessionError> {
        let kind = classify(sql)?;
        let query_id = self.transactions.new_query_id();

        let statement = match kind {
            StatementKind::Parameterized(query) => {
                debug!(%query_id, parameters = query.parameter_count(), "prepared statement");
                Statement::Parameterized(ParameterizedStatement::new(
                    query,
                    query_id,
                    self.request.copy().with_timeout(self.timeout),
                    Arc::clone(self.executor),
                    Arc::clone(self.closed),
                ))
            }
            StatementKind::StreamingInsert(columns) => {
                debug!(%query_id, columns = columns.len(), "prepared streaming insert");
                let request = self
                    .request
                    .write()
                    .query(sql, Some(query_id.clone()))
                    .with_timeout(self.timeout);
                Statement::StreamingInsert(StreamingInsertStatement::new(
                    sql,
                    query_id,
                    columns,
                    request,
                    Arc::clone(self.executor),
                    Arc::clone(self.closed),
                ))
            }
        };
        Ok(statement)
    }
}
