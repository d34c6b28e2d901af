//! Atomic units of work.
//!
//! A unit either commits every statement it ran or none of them. Units nest:
//! an inner unit started while a transaction is already open joins the outer
//! one, so the outermost caller decides the commit boundary.

use log::debug;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Runs `work` as one atomic unit on `conn`.
///
/// When `conn` is in autocommit mode an IMMEDIATE transaction is opened and
/// committed after `work` succeeds; any error rolls it back. When a
/// transaction is already active, `work` runs inside it unchanged.
pub fn run_atomic<T, E, F>(conn: &Connection, work: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    if !conn.is_autocommit() {
        return work(conn);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                debug!(
                    "event=tx_rollback module=repo status=error error={}",
                    rollback_err
                );
            }
            Err(err)
        }
    }
}
