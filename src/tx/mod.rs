//! Fake transactions: bookkeeping that lets a session offer commit, rollback and
//! savepoints over a backend where every statement commits on its own.

mod manager;
mod transaction;

pub use manager::TransactionManager;
pub use transaction::{LogicalTransaction, Savepoint};
