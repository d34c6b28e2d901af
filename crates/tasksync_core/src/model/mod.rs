//! Relational model of the local task store.
//!
//! # Responsibility
//! - Define accounts, lists, tasks and every record that hangs off a task.
//! - Keep timestamp conventions in one place: epoch milliseconds, `0` = unset.
//!
//! # Invariants
//! - Surrogate ids (`TaskId`, `ListId`) are assigned by the store on insert
//!   and never change afterwards.
//! - A list's `remote_id` is unique within its owning account.

pub mod account;
pub mod task;
pub mod task_list;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
