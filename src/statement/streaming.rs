use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::debug;

use crate::connection::ensure_open;
use crate::error::SessionError;
use crate::sql::ColumnSpec;
use crate::transport::{QueryExecutor, Request};
use crate::types::RowValues;

/// Bulk insert through ClickHouse's `input(...)` table function.
///
/// Rows are buffered on the client and shipped as the `input` table of a single write
/// request when [`execute`](Self::execute) runs.
pub struct StreamingInsertStatement {
    sql: String,
    query_id: String,
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<RowValues>>,
    request: Request,
    executor: Arc<dyn QueryExecutor>,
    closed: Arc<AtomicBool>,
}

// Manual Debug implementation because the executor is a trait object
impl fmt::Debug for StreamingInsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingInsertStatement")
            .field("sql", &self.sql)
            .field("query_id", &self.query_id)
            .field("columns", &self.columns)
            .field("pending_rows", &self.rows.len())
            .finish_non_exhaustive()
    }
}

impl StreamingInsertStatement {
    pub(crate) fn new(
        sql: &str,
        query_id: String,
        columns: Vec<ColumnSpec>,
        request: Request,
        executor: Arc<dyn QueryExecutor>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sql: sql.to_string(),
            query_id,
            columns,
            rows: Vec::new(),
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
        &self.sql
    }

    /// Structure declared in `input(...)`.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[must_use]
    pub fn pending_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Buffer one row for the next [`execute`](Self::execute).
    ///
    /// # Errors
    /// Returns `SessionError::Parameter` if the row width differs from the declared columns.
    pub fn add_row(&mut self, row: Vec<RowValues>) -> Result<(), SessionError> {
        if row.len() != self.columns.len() {
            return Err(SessionError::Parameter(format!(
                "Expected {} value(s) per row but got {}",
                self.columns.len(),
                row.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    /// Send the buffered rows and return how many the server wrote.
    ///
    /// The buffer is emptied even if the request fails.
    ///
    /// # Errors
    /// - `SessionError::Client` if the connection was closed;
    /// - `SessionError::Execution` if the transport fails.
    pub async fn execute(&mut self) -> Result<usize, SessionError> {
        ensure_open(&self.closed)?;
        let rows = std::mem::take(&mut self.rows);
        let count = rows.len();
        let request = self
            .request
            .copy()
            .query(self.sql.clone(), Some(self.query_id.clone()))
            .with_input(rows);

        debug!(query_id = %self.query_id, rows = count, "streaming rows to input()");
        let rs = self.executor.execute(&request).await.map_err(|e| {
            SessionError::Execution(format!("Insert {} failed: {e}", self.query_id))
        })?;
        Ok(rs.rows_affected)
    }
}
