use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::debug;

use crate::connection::ensure_open;
use crate::error::SessionError;
use crate::results::ResultSet;
use crate::sql::ParameterizedQuery;
use crate::transport::{QueryExecutor, Request};
use crate::types::RowValues;

/// Statement whose `?` placeholders are filled with inlined literals on execution.
pub struct ParameterizedStatement {
    query: ParameterizedQuery,
    query_id: String,
    request: Request,
    executor: Arc<dyn QueryExecutor>,
    closed: Arc<AtomicBool>,
}

// Manual Debug implementation because the executor is a trait object
impl fmt::Debug for ParameterizedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterizedStatement")
            .field("sql", &self.query.sql())
            .field("parameters", &self.query.parameter_count())
            .field("query_id", &self.query_id)
            .finish_non_exhaustive()
    }
}

impl ParameterizedStatement {
    pub(crate) fn new(
        query: ParameterizedQuery,
        query_id: String,
        request: Request,
        executor: Arc<dyn QueryExecutor>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            query,
            query_id,
            request,
            executor,
            closed,
        }
    }

    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.query.parameter_count()
    }

    /// The request template this statement sends, before SQL is attached.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Bind `params` and run the statement.
    ///
    /// # Errors
    /// - `SessionError::Client` if the connection was closed;
    /// - `SessionError::Parameter` if `params` does not match the placeholders;
    /// - `SessionError::Execution` if the transport fails.
    pub async fn execute(&self, params: &[RowValues]) -> Result<ResultSet, SessionError> {
        ensure_open(&self.closed)?;
        let sql = self.query.render(params)?;
        let request = self
            .request
            .copy()
            .query(sql, Some(self.query_id.clone()));

        debug!(query_id = %self.query_id, "executing statement");
        self.executor.execute(&request).await.map_err(|e| {
            SessionError::Execution(format!("Query {} failed: {e}", self.query_id))
        })
    }
}
