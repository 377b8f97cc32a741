mod prepared;
mod streaming;

pub use prepared::ParameterizedStatement;
pub use streaming::StreamingInsertStatement;

/// A statement built by [`Connection::prepare_statement`](crate::connection::Connection::prepare_statement).
#[derive(Debug)]
pub enum Statement {
    /// Ordinary statement; `?` placeholders are bound at execution time.
    Parameterized(ParameterizedStatement),
    /// `insert ... select ... from input('<structure>')`, fed with rows from the client.
    StreamingInsert(StreamingInsertStatement),
}

impl Statement {
    /// Correlation id attached to every request this statement sends.
    #[must_use]
    pub fn query_id(&self) -> &str {
        match self {
            Statement::Parameterized(stmt) => stmt.query_id(),
            Statement::StreamingInsert(stmt) => stmt.query_id(),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        match self {
            Statement::Parameterized(stmt) => stmt.sql(),
            Statement::StreamingInsert(stmt) => stmt.sql(),
        }
    }

    #[must_use]
    pub fn is_streaming_insert(&self) -> bool {
        matches!(self, Statement::StreamingInsert(_))
    }

    #[must_use]
    pub fn as_parameterized(&self) -> Option<&ParameterizedStatement> {
        match self {
            Statement::Parameterized(stmt) => Some(stmt),
            Statement::StreamingInsert(_) => None,
        }
    }

    #[must_use]
    pub fn as_streaming_insert(&self) -> Option<&StreamingInsertStatement> {
        match self {
            Statement::StreamingInsert(stmt) => Some(stmt),
            Statement::Parameterized(_) => None,
        }
    }

    #[must_use]
    pub fn into_parameterized(self) -> Option<ParameterizedStatement> {
        match self {
            Statement::Parameterized(stmt) => Some(stmt),
            Statement::StreamingInsert(_) => None,
        }
    }

    #[must_use]
    pub fn into_streaming_insert(self) -> Option<StreamingInsertStatement> {
        match self {
            Statement::StreamingInsert(stmt) => Some(stmt),
            Statement::Parameterized(_) => None,
        }
    }
}
