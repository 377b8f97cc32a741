use thiserror::Error;

/// SQL state reported for operations that need an active logical transaction.
pub const SQL_STATE_INVALID_TX_STATE: &str = "25000";
/// SQL state reported for a rejected schema name.
pub const SQL_STATE_INVALID_SCHEMA: &str = "3F000";
/// SQL state reported for features the session refuses outside compliance mode.
pub const SQL_STATE_FEATURE_NOT_SUPPORTED: &str = "0A000";
/// SQL state reported when the bootstrap probe was cancelled.
pub const SQL_STATE_CANCELLED: &str = "70100";
/// SQL state reported for transport failures during connect or teardown.
pub const SQL_STATE_CONNECTION_FAILURE: &str = "08000";
/// SQL state reported when bound parameters do not match the statement.
pub const SQL_STATE_WRONG_PARAMETER_COUNT: &str = "07001";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Caller misuse: closed connection, invalid argument, wrong state.
    #[error("Client error: {0}")]
    Client(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Invalid transaction state: {0}")]
    InvalidTransactionState(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("SQL execution error: {0}")]
    Execution(String),

    /// Client info could not be applied; lists every property that was rejected.
    #[error("Client info error: {message} (failed properties: {})", .properties.join(", "))]
    ClientInfo {
        message: String,
        properties: Vec<&'static str>,
    },
}

impl SessionError {
    /// Short categorical code distinguishing the failure class, when one applies.
    #[must_use]
    pub fn sql_state(&self) -> Option<&'static str> {
        match self {
            SessionError::Unsupported(_) => Some(SQL_STATE_FEATURE_NOT_SUPPORTED),
            SessionError::InvalidTransactionState(_) => Some(SQL_STATE_INVALID_TX_STATE),
            SessionError::InvalidSchema(_) => Some(SQL_STATE_INVALID_SCHEMA),
            SessionError::Cancelled(_) => Some(SQL_STATE_CANCELLED),
            SessionError::Connection(_) => Some(SQL_STATE_CONNECTION_FAILURE),
            SessionError::Parameter(_) => Some(SQL_STATE_WRONG_PARAMETER_COUNT),
            SessionError::Client(_)
            | SessionError::Config(_)
            | SessionError::Execution(_)
            | SessionError::ClientInfo { .. } => None,
        }
    }

    pub(crate) fn closed() -> Self {
        SessionError::Client("Cannot operate on a closed connection".to_string())
    }

    pub(crate) fn tx_not_started() -> Self {
        SessionError::InvalidTransactionState("Transaction not started".to_string())
    }
}

/// Failures reported by a [`QueryExecutor`](crate::transport::QueryExecutor).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request was cancelled before a response arrived.
    #[error("request cancelled: {0}")]
    Cancelled(String),

    /// The task driving the request was interrupted by its host.
    #[error("request interrupted: {0}")]
    Interrupted(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("transport failure: {0}")]
    Failed(String),
}

impl TransportError {
    /// Whether this failure is a cancellation-class signal rather than a fault.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            TransportError::Cancelled(_) | TransportError::Interrupted(_)
        )
    }
}
