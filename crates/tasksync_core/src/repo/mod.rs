//! Storage access layer.
//!
//! # Responsibility
//! - Row-level create/read/update/delete for accounts, lists, tasks and
//!   task-owned records.
//! - Batched deletion statements used by the cascading and purge engines.
//! - The atomic-unit helper every engine runs its writes through.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - SQL stays inside this module tree; engines never build statements.

pub mod atomic;
pub mod deletion_repo;
pub mod list_repo;
pub mod task_repo;

use crate::config::ConfigError;
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::task::TaskValidationError;
use crate::model::task_list::ListId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level failure.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(TaskValidationError),
    AccountNotFound(String),
    ListNotFound(ListId),
    /// Connection schema is not at the version this build expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
    /// Engine settings rejected before any statement ran.
    Config(ConfigError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::AccountNotFound(key) => write!(f, "account not found: {key}"),
            Self::ListNotFound(id) => write!(f, "task list not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Config(err) => write!(f, "invalid engine config: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Rejects connections that did not go through `db::open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// `?, ?, ?` placeholder list for an `IN (...)` clause of `count` values.
pub(crate) fn placeholders(count: usize) -> String {
    let mut sql = String::with_capacity(count * 3);
    for index in 0..count {
        if index > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::placeholders;

    #[test]
    fn placeholders_match_count() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
