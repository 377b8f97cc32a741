//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{ConnectionOptions, ConnectionOptionsBuilder, Node, Protocol};
pub use crate::connection::Connection;
pub use crate::dispatch::{StatementKind, classify};
pub use crate::error::{SessionError, TransportError};
pub use crate::profile::{ServerVersion, SessionProfile};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::sql::{ColumnSpec, ParameterizedQuery};
pub use crate::statement::{ParameterizedStatement, Statement, StreamingInsertStatement};
pub use crate::transport::{Format, QueryExecutor, Request};
pub use crate::tx::{LogicalTransaction, Savepoint, TransactionManager};
pub use crate::types::{ClientInfoProperty, Holdability, IsolationLevel, RowValues};
