//! Session layer for a call-level SQL client talking to ClickHouse.
//!
//! ClickHouse executes every statement on its own and has no multi-statement
//! transactions. This crate puts a conventional session on top of that: it negotiates
//! the server profile once at connect time, emulates autocommit, commit, rollback and
//! savepoints as bookkeeping over statement correlation ids, and decides whether a
//! piece of SQL is an ordinary parameterized statement or a streaming `input(...)`
//! insert.
//!
//! The wire transport is not part of this crate; plug one in through
//! [`QueryExecutor`](transport::QueryExecutor).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clickhouse_session::prelude::*;
//!
//! # async fn run(executor: Arc<dyn QueryExecutor>) -> Result<(), SessionError> {
//! let mut conn = ConnectionOptionsBuilder::new("localhost")
//!     .database("analytics")
//!     .connect(executor)
//!     .await?;
//!
//! conn.set_auto_commit(false)?;
//! let stmt = conn.prepare_statement("insert into events values (?, ?)")?;
//! if let Statement::Parameterized(stmt) = stmt {
//!     stmt.execute(&[RowValues::Int(1), RowValues::Text("signup".into())]).await?;
//! }
//! conn.commit()?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod prelude;
pub mod profile;
pub mod results;
pub mod sql;
pub mod statement;
pub mod transport;
pub mod tx;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConnectionOptions, ConnectionOptionsBuilder, Node, Protocol};
pub use connection::Connection;
pub use error::{SessionError, TransportError};
pub use results::{CustomDbRow, ResultSet};
pub use statement::Statement;
pub use transport::{QueryExecutor, Request};
pub use types::RowValues;
