//! Cascading deletion engine.
//!
//! # Responsibility
//! - Remove tasks together with alarms, geofences, tags, list memberships,
//!   attachments and comments, in `CASCADE_ORDER`.
//! - Remove a list with its active tasks, and an account with its lists.
//!
//! # Invariants
//! - Each batch of ids is one atomic unit; a failing batch leaves no trace.
//! - A failing batch stops the call; later batches are not attempted.
//! - External resources are not touched here. References carried by removed
//!   rows land in the released-resource outbox for the cleanup coordinator.

use crate::config::EngineConfig;
use crate::model::account::Account;
use crate::model::task::TaskId;
use crate::model::task_list::{ListId, TaskList};
use crate::repo::atomic::run_atomic;
use crate::repo::deletion_repo::{
    apply_cascade_step, delete_memberships_for_list, CascadeStep, CASCADE_ORDER,
};
use crate::repo::list_repo::{ListRepository, SqliteListRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use crate::service::chunked_ids;
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure of a cascading deletion.
#[derive(Debug)]
pub enum DeletionError {
    Repo(RepoError),
    /// Batch `batch_index` was rolled back; `batches_committed` earlier
    /// batches stay applied.
    Batch {
        batch_index: usize,
        batches_committed: usize,
        source: RepoError,
    },
    /// One list of an account failed; the account row was kept.
    AccountList {
        account_key: String,
        list_id: ListId,
        lists_deleted: usize,
        source: Box<DeletionError>,
    },
}

impl Display for DeletionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Batch {
                batch_index,
                batches_committed,
                source,
            } => write!(
                f,
                "deletion batch {batch_index} failed after {batches_committed} committed batches: {source}"
            ),
            Self::AccountList {
                account_key,
                list_id,
                lists_deleted,
                source,
            } => write!(
                f,
                "deleting list {list_id} of account {account_key} failed after {lists_deleted} lists: {source}"
            ),
        }
    }
}

impl Error for DeletionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Batch { source, .. } => Some(source),
            Self::AccountList { source, .. } => Some(source.as_ref()),
        }
    }
}

impl From<RepoError> for DeletionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for DeletionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Outcome of `delete_tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub batches_attempted: usize,
    pub batches_committed: usize,
    /// Task rows actually removed (ids that did not exist are not counted).
    pub tasks_deleted: usize,
}

/// Outcome of `delete_account`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountDeletion {
    pub task_ids: Vec<TaskId>,
    pub lists_deleted: usize,
}

/// Hard-deletes tasks, lists and accounts with their dependents.
pub struct CascadeDeleter<'conn> {
    conn: &'conn Connection,
    chunk_size: usize,
}

impl<'conn> CascadeDeleter<'conn> {
    pub fn try_new(conn: &'conn Connection, config: &EngineConfig) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        config.validate()?;
        Ok(Self::unchecked(conn, config))
    }

    pub(crate) fn unchecked(conn: &'conn Connection, config: &EngineConfig) -> Self {
        Self {
            conn,
            chunk_size: config.chunk_size,
        }
    }

    /// Deletes `ids` and every dependent row, one atomic unit per batch.
    ///
    /// Called inside an open transaction, all batches join that transaction.
    pub fn delete_tasks(&self, ids: &[TaskId]) -> Result<DeletionReport, DeletionError> {
        let started_at = Instant::now();
        let mut report = DeletionReport::default();

        for (batch_index, chunk) in chunked_ids(ids, self.chunk_size).into_iter().enumerate() {
            report.batches_attempted += 1;
            let removed = run_atomic(self.conn, |tx| -> RepoResult<usize> {
                let mut tasks_removed = 0;
                for step in CASCADE_ORDER {
                    let removed = apply_cascade_step(tx, step, &chunk)?;
                    if step == CascadeStep::Tasks {
                        tasks_removed = removed;
                    }
                }
                Ok(tasks_removed)
            });

            match removed {
                Ok(removed) => {
                    report.batches_committed += 1;
                    report.tasks_deleted += removed;
                }
                Err(source) => {
                    error!(
                        "event=delete_tasks module=cascade status=error batch={} committed={} error={}",
                        batch_index, report.batches_committed, source
                    );
                    return Err(DeletionError::Batch {
                        batch_index,
                        batches_committed: report.batches_committed,
                        source,
                    });
                }
            }
        }

        if report.batches_attempted > 0 {
            info!(
                "event=delete_tasks module=cascade status=ok tasks={} batches={} duration_ms={}",
                report.tasks_deleted,
                report.batches_committed,
                started_at.elapsed().as_millis()
            );
        }
        Ok(report)
    }

    /// Deletes `list`, its active tasks and any membership still pointing at
    /// it, as one atomic unit. Returns the ids of the deleted tasks.
    pub fn delete_list(&self, list: &TaskList) -> Result<Vec<TaskId>, DeletionError> {
        let task_ids = run_atomic(self.conn, |tx| -> Result<Vec<TaskId>, DeletionError> {
            let task_ids = SqliteTaskRepository::unchecked(tx).active_task_ids_for_list(list.id)?;
            self.delete_tasks(&task_ids)?;
            delete_memberships_for_list(tx, list.id)?;
            SqliteListRepository::unchecked(tx).delete_list_row(list.id)?;
            Ok(task_ids)
        })?;

        info!(
            "event=delete_list module=cascade status=ok list_id={} tasks={}",
            list.id,
            task_ids.len()
        );
        Ok(task_ids)
    }

    /// Deletes every list of `account`, then the account row.
    ///
    /// Each list is its own atomic unit. The first failing list stops the
    /// call and the account row is kept.
    pub fn delete_account(&self, account: &Account) -> Result<AccountDeletion, DeletionError> {
        let lists = SqliteListRepository::unchecked(self.conn).lists_for_account(&account.key)?;
        let mut deletion = AccountDeletion::default();

        for list in &lists {
            match self.delete_list(list) {
                Ok(task_ids) => {
                    deletion.task_ids.extend(task_ids);
                    deletion.lists_deleted += 1;
                }
                Err(source) => {
                    error!(
                        "event=delete_account module=cascade status=error list_id={} lists_deleted={} error={}",
                        list.id, deletion.lists_deleted, source
                    );
                    return Err(DeletionError::AccountList {
                        account_key: account.key.clone(),
                        list_id: list.id,
                        lists_deleted: deletion.lists_deleted,
                        source: Box::new(source),
                    });
                }
            }
        }

        run_atomic(self.conn, |tx| {
            SqliteListRepository::unchecked(tx).delete_account_row(&account.key)
        })?;

        info!(
            "event=delete_account module=cascade status=ok lists={} tasks={}",
            deletion.lists_deleted,
            deletion.task_ids.len()
        );
        Ok(deletion)
    }
}
