use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use super::transaction::{LogicalTransaction, Savepoint};
use crate::error::SessionError;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Emulates transaction control on a backend that commits every statement on its own.
///
/// Owns the connection's autocommit flag and a single slot holding the current
/// [`LogicalTransaction`]. Each public operation swaps or reads the slot in one short
/// critical section that never spans I/O, so commit, rollback, close and abort racing
/// from different tasks cannot observe a half-updated transaction. Nothing ties two calls
/// together: interleaving `set_auto_commit` and `commit` from two tasks is caller error.
#[derive(Debug)]
pub struct TransactionManager {
    id: u64,
    compliant: bool,
    autocommit: AtomicBool,
    next_savepoint: AtomicU64,
    slot: Mutex<Option<Arc<LogicalTransaction>>>,
}

impl TransactionManager {
    /// New manager in autocommit mode with an empty slot.
    #[must_use]
    pub fn new(compliant: bool) -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            compliant,
            autocommit: AtomicBool::new(true),
            next_savepoint: AtomicU64::new(1),
            slot: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<LogicalTransaction>>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn swap(&self, next: Option<Arc<LogicalTransaction>>) -> Option<Arc<LogicalTransaction>> {
        std::mem::replace(&mut *self.slot(), next)
    }

    /// Install a fresh transaction if the slot is empty; `false` if one was already there.
    fn begin_if_empty(&self) -> bool {
        let mut slot = self.slot();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Arc::new(LogicalTransaction::new()));
        true
    }

    fn current_or_begin(&self) -> Arc<LogicalTransaction> {
        Arc::clone(
            self.slot()
                .get_or_insert_with(|| Arc::new(LogicalTransaction::new())),
        )
    }

    /// The transaction currently in the slot, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<LogicalTransaction>> {
        self.slot().clone()
    }

    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.compliant
    }

    #[must_use]
    pub fn is_auto_commit(&self) -> bool {
        self.autocommit.load(Ordering::SeqCst)
    }

    /// Outside compliance mode an unsupported feature is an error; inside it the call
    /// goes ahead and the gap is only logged.
    fn ensure_support(&self, feature: &str) -> Result<(), SessionError> {
        let msg = format!("{feature} is not supported");
        if self.compliant {
            warn!("[compliance mode] {msg}. Set compliant to false to fail instead.");
            Ok(())
        } else {
            Err(SessionError::Unsupported(msg))
        }
    }

    /// Toggle autocommit.
    ///
    /// Enabling it while a transaction is open commits that transaction implicitly.
    /// Disabling it begins a new transaction, or keeps the one already in the slot.
    ///
    /// # Errors
    /// Returns `SessionError::Unsupported` outside compliance mode when the flag would change.
    pub fn set_auto_commit(&self, enable: bool) -> Result<(), SessionError> {
        if self.is_auto_commit() == enable {
            return Ok(());
        }

        self.ensure_support("Transaction")?;
        self.autocommit.store(enable, Ordering::SeqCst);
        if enable {
            if let Some(tx) = self.swap(None) {
                tx.log_details("committed");
                tx.clear();
            }
        } else if !self.begin_if_empty() {
            warn!("[compliance mode] not able to start a new transaction, reusing the existing one");
        }
        Ok(())
    }

    /// Close the current logical transaction and start a fresh one.
    ///
    /// # Errors
    /// - `SessionError::Client` in autocommit mode;
    /// - `SessionError::Unsupported` outside compliance mode;
    /// - `SessionError::InvalidTransactionState` if no transaction was open.
    pub fn commit(&self) -> Result<(), SessionError> {
        self.finish("commit", "committed")
    }

    /// Same as [`commit`](Self::commit) but logged as a rollback.
    ///
    /// Nothing is undone on the server; the statements in the window stay executed.
    ///
    /// # Errors
    /// Same as [`commit`](Self::commit).
    pub fn rollback(&self) -> Result<(), SessionError> {
        self.finish("rollback", "rolled back")
    }

    fn finish(&self, action: &str, verb: &str) -> Result<(), SessionError> {
        if self.is_auto_commit() {
            return Err(SessionError::Client(format!(
                "Cannot {action} in auto-commit mode"
            )));
        }

        self.ensure_support("Transaction")?;

        let Some(tx) = self.swap(Some(Arc::new(LogicalTransaction::new()))) else {
            return Err(SessionError::tx_not_started());
        };
        tx.log_details(verb);
        tx.clear();
        Ok(())
    }

    /// Mark the current position in the logical transaction, beginning one if needed.
    ///
    /// # Errors
    /// - `SessionError::Client` in autocommit mode;
    /// - `SessionError::Unsupported` outside compliance mode.
    pub fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint, SessionError> {
        if self.is_auto_commit() {
            return Err(SessionError::Client(
                "Cannot set savepoint in auto-commit mode".to_string(),
            ));
        }
        if !self.compliant {
            return Err(SessionError::Unsupported("Savepoint is not supported".to_string()));
        }

        let tx = self.current_or_begin();
        let id = self.next_savepoint.fetch_add(1, Ordering::Relaxed);
        let savepoint = tx.new_savepoint(self.id, id, name);
        debug!(tx_id = %tx.id(), savepoint = %savepoint, "savepoint set");
        Ok(savepoint)
    }

    /// Truncate the logical window back to `savepoint`, keeping the savepoint.
    ///
    /// # Errors
    /// - `SessionError::Client` in autocommit mode, for a savepoint from another
    ///   connection, or one that no longer exists in the current transaction;
    /// - `SessionError::Unsupported` outside compliance mode;
    /// - `SessionError::InvalidTransactionState` if no transaction is open.
    pub fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<(), SessionError> {
        let tx = self.savepoint_target(savepoint, "rollback to")?;
        tx.log_savepoint_details(savepoint, "rolled back to");
        tx.rollback_to(savepoint)?;
        Ok(())
    }

    /// Truncate the logical window back to `savepoint` and forget it.
    ///
    /// # Errors
    /// Same as [`rollback_to_savepoint`](Self::rollback_to_savepoint).
    pub fn release_savepoint(&self, savepoint: &Savepoint) -> Result<(), SessionError> {
        let tx = self.savepoint_target(savepoint, "release")?;
        tx.log_savepoint_details(savepoint, "released");
        tx.release(savepoint)?;
        Ok(())
    }

    fn savepoint_target(
        &self,
        savepoint: &Savepoint,
        action: &str,
    ) -> Result<Arc<LogicalTransaction>, SessionError> {
        if self.is_auto_commit() {
            return Err(SessionError::Client(format!(
                "Cannot {action} savepoint in auto-commit mode"
            )));
        }
        if !self.compliant {
            return Err(SessionError::Unsupported("Savepoint is not supported".to_string()));
        }
        if savepoint.owner != self.id {
            return Err(SessionError::Client(format!(
                "Unsupported type of savepoint: {savepoint}"
            )));
        }
        self.current().ok_or_else(SessionError::tx_not_started)
    }

    /// Correlation id for the next statement.
    ///
    /// Inside a logical transaction the id is recorded in its window; in autocommit mode a
    /// standalone id is returned and nothing is kept.
    #[must_use]
    pub fn new_query_id(&self) -> String {
        match self.current() {
            Some(tx) => tx.new_query(),
            None => Uuid::new_v4().to_string(),
        }
    }

    /// Drop whatever transaction is in the slot, as on connection close.
    pub fn discard(&self) {
        if let Some(tx) = self.swap(None) {
            tx.log_details("committed");
            tx.clear();
        }
    }
}
