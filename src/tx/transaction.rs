use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SessionError;

/// Handle to a savepoint inside a [`LogicalTransaction`].
///
/// # This is a logical marker, not a checkpoint
///
/// A savepoint only records how many statements the logical transaction had issued when it
/// was taken. Rolling back to it truncates that bookkeeping so later statements fall
/// outside the transaction window in logs. **It does not undo anything on the server:**
/// every statement issued after the savepoint has already been executed and committed by
/// the backend and stays that way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Savepoint {
    pub(crate) owner: u64,
    id: u64,
    name: Option<String>,
    marker: usize,
}

impl Savepoint {
    /// Numeric id, unique per connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name given at creation; `None` for anonymous savepoints.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of statements the transaction had issued when this savepoint was taken.
    #[must_use]
    pub fn marker(&self) -> usize {
        self.marker
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "savepoint {name:?} (#{}, at {})", self.id, self.marker),
            None => write!(f, "savepoint #{} (at {})", self.id, self.marker),
        }
    }
}

#[derive(Debug, Default)]
struct TxLog {
    query_ids: Vec<String>,
    savepoints: Vec<Savepoint>,
}

/// Bookkeeping record of the statements issued since a logical transaction began.
///
/// The backend commits every statement on its own; this record grants no atomicity or
/// isolation. It exists so commit/rollback can report which statements belonged together.
#[derive(Debug)]
pub struct LogicalTransaction {
    id: String,
    log: Mutex<TxLog>,
}

impl Default for LogicalTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalTransaction {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            log: Mutex::new(TxLog::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TxLog> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the correlation ids inside the transaction window, oldest first.
    #[must_use]
    pub fn query_ids(&self) -> Vec<String> {
        self.lock().query_ids.clone()
    }

    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.lock().query_ids.len()
    }

    /// Snapshot of the savepoint stack, oldest first.
    #[must_use]
    pub fn savepoints(&self) -> Vec<Savepoint> {
        self.lock().savepoints.clone()
    }

    /// Allocate a correlation id and append it to the window.
    pub fn new_query(&self) -> String {
        let query_id = Uuid::new_v4().to_string();
        self.lock().query_ids.push(query_id.clone());
        query_id
    }

    pub(crate) fn new_savepoint(&self, owner: u64, id: u64, name: Option<&str>) -> Savepoint {
        let mut log = self.lock();
        let savepoint = Savepoint {
            owner,
            id,
            name: name.map(str::to_string),
            marker: log.query_ids.len(),
        };
        log.savepoints.push(savepoint.clone());
        savepoint
    }

    /// Truncate the window back to `savepoint`, keeping it so it can be rolled back to
    /// again. Savepoints taken after it are discarded.
    pub(crate) fn rollback_to(&self, savepoint: &Savepoint) -> Result<usize, SessionError> {
        self.to_savepoint(savepoint, false)
    }

    /// Truncate the window back to `savepoint` and drop it together with every savepoint
    /// taken after it.
    pub(crate) fn release(&self, savepoint: &Savepoint) -> Result<usize, SessionError> {
        self.to_savepoint(savepoint, true)
    }

    fn to_savepoint(&self, savepoint: &Savepoint, drop_target: bool) -> Result<usize, SessionError> {
        let mut log = self.lock();
        let Some(pos) = log.savepoints.iter().position(|s| s.id == savepoint.id) else {
            return Err(SessionError::Client(format!("Unknown savepoint: {savepoint}")));
        };
        log.savepoints.truncate(if drop_target { pos } else { pos + 1 });

        let before = log.query_ids.len();
        log.query_ids.truncate(savepoint.marker);
        Ok(before - log.query_ids.len())
    }

    pub(crate) fn clear(&self) {
        let mut log = self.lock();
        log.query_ids.clear();
        log.savepoints.clear();
    }

    pub(crate) fn log_details(&self, action: &str) {
        let log = self.lock();
        if action == "rolled back" && !log.query_ids.is_empty() {
            warn!(
                tx_id = %self.id,
                statements = log.query_ids.len(),
                query_ids = ?log.query_ids,
                "transaction rolled back, but its statements were already executed by the server"
            );
        } else {
            debug!(
                tx_id = %self.id,
                statements = log.query_ids.len(),
                query_ids = ?log.query_ids,
                "transaction {action}"
            );
        }
    }

    pub(crate) fn log_savepoint_details(&self, savepoint: &Savepoint, action: &str) {
        let log = self.lock();
        let after = log
            .query_ids
            .get(savepoint.marker.min(log.query_ids.len())..)
            .unwrap_or_default();
        debug!(
            tx_id = %self.id,
            savepoint = %savepoint,
            query_ids = ?after,
            "{action} {savepoint}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savepoint_markers_capture_window_length() {
        let tx = LogicalTransaction::new();
        tx.new_query();
        let sp = tx.new_savepoint(1, 1, Some("a"));
        tx.new_query();
        tx.new_query();

        assert_eq!(sp.marker(), 1);
        assert_eq!(tx.statement_count(), 3);
        assert_eq!(tx.rollback_to(&sp).ok(), Some(2));
        assert_eq!(tx.statement_count(), 1);
        // rolling back to the same savepoint again is allowed
        assert_eq!(tx.rollback_to(&sp).ok(), Some(0));
    }

    #[test]
    fn rollback_to_discards_nested_savepoints() {
        let tx = LogicalTransaction::new();
        let outer = tx.new_savepoint(1, 1, None);
        tx.new_query();
        let inner = tx.new_savepoint(1, 2, None);
        tx.new_query();

        tx.rollback_to(&outer).expect("outer savepoint");
        assert_eq!(tx.savepoints(), vec![outer]);
        assert!(matches!(tx.rollback_to(&inner), Err(SessionError::Client(_))));
    }

    #[test]
    fn release_drops_target_and_later_savepoints() {
        let tx = LogicalTransaction::new();
        let first = tx.new_savepoint(1, 1, Some("first"));
        tx.new_query();
        let second = tx.new_savepoint(1, 2, Some("second"));
        tx.new_query();

        assert_eq!(tx.release(&second).ok(), Some(1));
        assert_eq!(tx.savepoints(), vec![first.clone()]);
        assert_eq!(tx.release(&first).ok(), Some(1));
        assert!(tx.savepoints().is_empty());
        assert_eq!(tx.statement_count(), 0);
    }

    #[test]
    fn query_ids_are_unique() {
        let tx = LogicalTransaction::new();
        let a = tx.new_query();
        let b = tx.new_query();
        assert_ne!(a, b);
        assert_eq!(tx.query_ids(), vec![a, b]);
    }
}
