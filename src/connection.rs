use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono_tz::Tz;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::bootstrap;
use crate::config::{ConnectionOptions, Node};
use crate::dispatch::StatementDispatcher;
use crate::error::SessionError;
use crate::profile::{ServerVersion, SessionProfile};
use crate::statement::Statement;
use crate::transport::{QueryExecutor, Request};
use crate::tx::{LogicalTransaction, Savepoint, TransactionManager};
use crate::types::{ClientInfoProperty, Holdability, IsolationLevel};

pub(crate) fn ensure_open(closed: &AtomicBool) -> Result<(), SessionError> {
    if closed.load(Ordering::SeqCst) {
        Err(SessionError::closed())
    } else {
        Ok(())
    }
}

/// A session over a stateless ClickHouse transport.
///
/// Offers autocommit, commit, rollback and savepoints on top of a backend where every
/// statement commits on its own. Those operations only move bookkeeping around (see
/// [`TransactionManager`]); nothing is ever undone on the server.
///
/// Session fields take `&mut self`, so one caller drives a connection at a time. The
/// closed flag and the transaction slot are shared with statements and with the task
/// spawned by [`abort`](Self::abort).
pub struct Connection {
    executor: Arc<dyn QueryExecutor>,
    request: Request,
    profile: SessionProfile,
    transactions: Arc<TransactionManager>,
    closed: Arc<AtomicBool>,
    database: String,
    read_only: bool,
    network_timeout: u32,
    holdability: Holdability,
    isolation: IsolationLevel,
}

// Manual Debug implementation because the executor is a trait object
impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("node", self.request.node())
            .field("database", &self.database)
            .field("closed", &self.is_closed())
            .field("auto_commit", &self.transactions.is_auto_commit())
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a session: bind a request to the configured node and negotiate the profile.
    ///
    /// # Errors
    /// - `SessionError::Config` for invalid options;
    /// - `SessionError::Connection` if the server info probe fails;
    /// - `SessionError::Cancelled` if the probe is cancelled.
    pub async fn connect(
        executor: Arc<dyn QueryExecutor>,
        options: ConnectionOptions,
    ) -> Result<Self, SessionError> {
        Self::connect_with_cancellation(executor, options, &CancellationToken::new()).await
    }

    /// Like [`connect`](Self::connect), but the bootstrap probe stops as soon as `cancel`
    /// fires.
    ///
    /// # Errors
    /// Same as [`connect`](Self::connect).
    #[instrument(skip_all, fields(node = %options.node))]
    pub async fn connect_with_cancellation(
        executor: Arc<dyn QueryExecutor>,
        options: ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        options.validate()?;
        debug!("opening connection");

        let mut request = Request::connect(&options.node, &options);
        let profile = bootstrap::negotiate(executor.as_ref(), &mut request, &options, cancel).await?;
        let database = profile.database.clone();
        request.use_database(&database);

        let isolation = if options.compliant {
            IsolationLevel::ReadCommitted
        } else {
            IsolationLevel::None
        };

        Ok(Self {
            executor,
            request,
            transactions: Arc::new(TransactionManager::new(options.compliant)),
            closed: Arc::new(AtomicBool::new(false)),
            database,
            read_only: false,
            network_timeout: 0,
            holdability: Holdability::default(),
            isolation,
            profile,
        })
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        ensure_open(&self.closed)
    }

    /// Prepare `sql` as either a parameterized statement or a streaming insert.
    ///
    /// # Errors
    /// - `SessionError::Client` if the connection is closed, the SQL is empty, or an
    ///   `input(...)` structure is malformed.
    pub fn prepare_statement(&self, sql: &str) -> Result<Statement, SessionError> {
        self.ensure_open()?;
        let timeout = (self.network_timeout > 0)
            .then(|| Duration::from_millis(u64::from(self.network_timeout)));
        StatementDispatcher {
            executor: &self.executor,
            request: &self.request,
            transactions: &self.transactions,
            closed: &self.closed,
            timeout,
        }
        .prepare(sql)
    }

    /// ClickHouse SQL needs no translation.
    ///
    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn native_sql(&self, sql: &str) -> Result<String, SessionError> {
        self.ensure_open()?;
        Ok(sql.to_string())
    }

    /// # Errors
    /// - `SessionError::Client` if the connection is closed;
    /// - `SessionError::Unsupported` outside compliance mode when the flag would change.
    pub fn set_auto_commit(&mut self, enable: bool) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.transactions.set_auto_commit(enable)
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn auto_commit(&self) -> Result<bool, SessionError> {
        self.ensure_open()?;
        Ok(self.transactions.is_auto_commit())
    }

    /// End the logical transaction and start a new one.
    ///
    /// # Errors
    /// See [`TransactionManager::commit`]; also `SessionError::Client` once closed.
    pub fn commit(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.transactions.commit()
    }

    /// End the logical transaction and start a new one. Executed statements stay executed.
    ///
    /// # Errors
    /// See [`TransactionManager::rollback`]; also `SessionError::Client` once closed.
    pub fn rollback(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.transactions.rollback()
    }

    /// # Errors
    /// See [`TransactionManager::set_savepoint`]; also `SessionError::Client` once closed.
    pub fn set_savepoint(&mut self, name: Option<&str>) -> Result<Savepoint, SessionError> {
        self.ensure_open()?;
        self.transactions.set_savepoint(name)
    }

    /// # Errors
    /// See [`TransactionManager::rollback_to_savepoint`]; also `SessionError::Client` once
    /// closed.
    pub fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.transactions.rollback_to_savepoint(savepoint)
    }

    /// # Errors
    /// See [`TransactionManager::release_savepoint`]; also `SessionError::Client` once closed.
    pub fn release_savepoint(&mut self, savepoint: &Savepoint) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.transactions.release_savepoint(savepoint)
    }

    /// The logical transaction currently open, if any.
    #[must_use]
    pub fn current_transaction(&self) -> Option<Arc<LogicalTransaction>> {
        self.transactions.current()
    }

    /// Correlation id for an ad-hoc request, recorded in the open transaction if there is one.
    #[must_use]
    pub fn new_query_id(&self) -> String {
        self.transactions.new_query_id()
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn set_read_only(&mut self, read_only: bool) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.read_only = read_only;
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn is_read_only(&self) -> Result<bool, SessionError> {
        self.ensure_open()?;
        Ok(self.read_only)
    }

    /// Catalogs do not exist in ClickHouse; the call is logged and ignored.
    ///
    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn set_catalog(&mut self, catalog: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        warn!(catalog, "catalog is not supported, ignoring");
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn catalog(&self) -> Result<Option<String>, SessionError> {
        self.ensure_open()?;
        Ok(None)
    }

    /// Record the requested isolation level. The backend provides no isolation.
    ///
    /// # Errors
    /// - `SessionError::Client` if the connection is closed or `level` is
    ///   [`IsolationLevel::None`].
    pub fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<(), SessionError> {
        self.ensure_open()?;
        if level == IsolationLevel::None {
            return Err(SessionError::Client(
                "Invalid transaction isolation level".to_string(),
            ));
        }
        self.isolation = level;
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn transaction_isolation(&self) -> Result<IsolationLevel, SessionError> {
        self.ensure_open()?;
        Ok(self.isolation)
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn set_holdability(&mut self, holdability: Holdability) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.holdability = holdability;
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn holdability(&self) -> Result<Holdability, SessionError> {
        self.ensure_open()?;
        Ok(self.holdability)
    }

    /// Timeout in milliseconds for statements prepared from now on; `0` means none.
    ///
    /// # Errors
    /// `SessionError::Client` if the connection is closed or `millis` is negative.
    pub fn set_network_timeout(&mut self, millis: i32) -> Result<(), SessionError> {
        self.ensure_open()?;
        let Ok(millis) = u32::try_from(millis) else {
            return Err(SessionError::Client(
                "Network timeout must be a non-negative number of milliseconds".to_string(),
            ));
        };
        self.network_timeout = millis;
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn network_timeout(&self) -> Result<u32, SessionError> {
        self.ensure_open()?;
        Ok(self.network_timeout)
    }

    fn client_info_closed() -> SessionError {
        SessionError::ClientInfo {
            message: "Cannot set client info on a closed connection".to_string(),
            properties: ClientInfoProperty::ALL.iter().map(|p| p.name()).collect(),
        }
    }

    /// Set one client-info property; a blank or missing value removes it. Unknown names
    /// are ignored.
    ///
    /// # Errors
    /// Returns `SessionError::ClientInfo` if the connection is closed.
    pub fn set_client_info(&mut self, name: &str, value: Option<&str>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(Self::client_info_closed());
        }
        match ClientInfoProperty::from_name(name) {
            Some(property) => self.request.set_client_info(property, value),
            None => debug!(name, "ignoring unknown client info property"),
        }
        Ok(())
    }

    /// Replace every client-info property at once; properties absent from `values` are
    /// removed.
    ///
    /// # Errors
    /// Returns `SessionError::ClientInfo` if the connection is closed.
    pub fn set_client_info_all(
        &mut self,
        values: &HashMap<String, String>,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(Self::client_info_closed());
        }
        for property in ClientInfoProperty::ALL {
            self.request
                .set_client_info(property, values.get(property.name()).map(String::as_str));
        }
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn client_info(&self, name: &str) -> Result<Option<String>, SessionError> {
        self.ensure_open()?;
        Ok(ClientInfoProperty::from_name(name)
            .and_then(|p| self.request.client_info(p))
            .map(str::to_string))
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn client_info_all(&self) -> Result<BTreeMap<&'static str, String>, SessionError> {
        self.ensure_open()?;
        Ok(self.request.settings().client_info.clone())
    }

    /// Switch the default database for statements prepared from now on.
    ///
    /// # Errors
    /// - `SessionError::Client` if the connection is closed;
    /// - `SessionError::InvalidSchema` for an empty name.
    pub fn set_schema(&mut self, schema: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        if schema.is_empty() {
            return Err(SessionError::InvalidSchema(
                "Non-empty schema name is required".to_string(),
            ));
        }
        if schema != self.database {
            debug!(from = %self.database, to = schema, "switching schema");
            self.database = schema.to_string();
            self.request.use_database(schema);
        }
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError::Client` if the connection is closed.
    pub fn schema(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        Ok(self.current_database().to_string())
    }

    /// Ping the node. A closed connection is never valid; `0` passes a zero timeout to
    /// the transport, which treats it as unbounded.
    ///
    /// # Errors
    /// Returns `SessionError::Client` for a negative timeout.
    pub async fn is_valid(&self, timeout_secs: i32) -> Result<bool, SessionError> {
        let Ok(secs) = u64::try_from(timeout_secs) else {
            return Err(SessionError::Client("Negative timeout is not allowed".to_string()));
        };
        if self.is_closed() {
            return Ok(false);
        }
        Ok(self
            .executor
            .ping(self.request.node(), Duration::from_secs(secs))
            .await)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the transport and drop the open logical transaction. Calling it again is a
    /// no-op.
    ///
    /// The connection counts as closed even when the transport fails to close.
    ///
    /// # Errors
    /// Returns `SessionError::Connection` if the transport failed to close.
    pub async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.executor.close().await;
        self.transactions.discard();
        result.map_err(|e| {
            warn!(node = %self.request.node(), error = %e, "failed to close connection");
            SessionError::Connection(format!("Failed to close connection: {e}"))
        })
    }

    /// Close the connection in the background on `handle`, returning at once.
    ///
    /// When the task runs the connection is marked closed and its transaction discarded,
    /// whether or not the transport closed cleanly. Already-closed connections get a task that does nothing.
    pub fn abort(&self, handle: &Handle) -> JoinHandle<()> {
        if self.is_closed() {
            return handle.spawn(async {});
        }
        let executor = Arc::clone(&self.executor);
        let closed = Arc::clone(&self.closed);
        let transactions = Arc::clone(&self.transactions);
        let node = self.request.node().clone();
        handle.spawn(async move {
            if closed.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Err(e) = executor.close().await {
                warn!(%node, error = %e, "failed to close connection during abort");
            }
            transactions.discard();
        })
    }

    #[must_use]
    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }

    /// Default database of the session, following [`set_schema`](Self::set_schema).
    #[must_use]
    pub fn current_database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn current_user(&self) -> &str {
        &self.profile.user
    }

    #[must_use]
    pub fn server_time_zone(&self) -> Tz {
        self.profile.server_time_zone
    }

    #[must_use]
    pub fn effective_time_zone(&self) -> Tz {
        self.profile.effective_time_zone
    }

    #[must_use]
    pub fn server_version(&self) -> &ServerVersion {
        &self.profile.server_version
    }

    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.profile.compliant
    }

    #[must_use]
    pub fn node(&self) -> &Node {
        self.request.node()
    }

    /// The request template statements are built from.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }
}
