//! Remote list reconciliation.
//!
//! # Responsibility
//! - Make an account's local lists mirror an authoritative remote snapshot:
//!   create missing lists, rename changed ones, cascade-delete absent ones.
//!
//! # Invariants
//! - The whole reconciliation is one atomic unit.
//! - Surviving lists keep `id`, `remote_id` and `last_sync`; only `title`
//!   may change.
//! - Newly created lists always start with `last_sync = 0`.
//! - An empty snapshot deletes every list of the account. Callers must pass
//!   a complete snapshot, never one page of a paginated listing.
//! - Duplicate remote ids in one snapshot: the last occurrence wins.

use crate::config::EngineConfig;
use crate::model::account::Account;
use crate::model::task::TaskId;
use crate::model::task_list::{ListId, RemoteList, TaskList};
use crate::repo::atomic::run_atomic;
use crate::repo::list_repo::{ListRepository, SqliteListRepository};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use crate::service::cascade::{CascadeDeleter, DeletionError};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure of a reconciliation. Nothing was written in any case.
#[derive(Debug)]
pub enum ReconcileError {
    /// Snapshot entry `index` violates the input contract.
    InvalidSnapshot { index: usize, reason: &'static str },
    AccountNotFound(String),
    /// The local-only account has no remote side to mirror.
    LocalAccount,
    Deletion(DeletionError),
    Repo(RepoError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSnapshot { index, reason } => {
                write!(f, "invalid snapshot entry {index}: {reason}")
            }
            Self::AccountNotFound(key) => write!(f, "account not found: {key}"),
            Self::LocalAccount => write!(f, "the local account cannot be reconciled"),
            Self::Deletion(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Deletion(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReconcileError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DeletionError> for ReconcileError {
    fn from(value: DeletionError) -> Self {
        Self::Deletion(value)
    }
}

impl From<rusqlite::Error> for ReconcileError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// What one reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: Vec<ListId>,
    pub renamed: Vec<ListId>,
    pub deleted_lists: Vec<ListId>,
    /// Tasks removed with the deleted lists; feed these to cleanup.
    pub deleted_task_ids: Vec<TaskId>,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.renamed.is_empty() && self.deleted_lists.is_empty()
    }
}

/// Mirrors remote list snapshots into the local store.
pub struct ListReconciler<'conn> {
    conn: &'conn Connection,
    config: EngineConfig,
}

impl<'conn> ListReconciler<'conn> {
    pub fn try_new(conn: &'conn Connection, config: &EngineConfig) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        config.validate()?;
        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    /// Applies `snapshot` as the complete remote truth for `account`.
    pub fn reconcile(
        &self,
        account: &Account,
        snapshot: &[RemoteList],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        validate_snapshot(snapshot)?;
        if account.is_local() {
            return Err(ReconcileError::LocalAccount);
        }

        let started_at = Instant::now();
        let outcome = run_atomic(self.conn, |tx| self.apply(tx, &account.key, snapshot))?;

        if outcome.is_noop() {
            info!(
                "event=reconcile module=reconcile status=noop remote_lists={} duration_ms={}",
                snapshot.len(),
                started_at.elapsed().as_millis()
            );
        } else {
            info!(
                "event=reconcile module=reconcile status=ok created={} renamed={} deleted={} deleted_tasks={} duration_ms={}",
                outcome.created.len(),
                outcome.renamed.len(),
                outcome.deleted_lists.len(),
                outcome.deleted_task_ids.len(),
                started_at.elapsed().as_millis()
            );
        }
        Ok(outcome)
    }

    fn apply(
        &self,
        tx: &Connection,
        account_key: &str,
        snapshot: &[RemoteList],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let repo = SqliteListRepository::unchecked(tx);
        if repo.get_account(account_key)?.is_none() {
            return Err(ReconcileError::AccountNotFound(account_key.to_string()));
        }

        let mut local: HashMap<String, TaskList> = repo
            .lists_for_account(account_key)?
            .into_iter()
            .map(|list| (list.remote_id.clone(), list))
            .collect();
        let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.len());
        let mut outcome = ReconcileOutcome::default();

        for remote in snapshot {
            seen.insert(remote.remote_id.as_str());
            match local.get_mut(&remote.remote_id) {
                Some(existing) => {
                    if existing.title != remote.title {
                        repo.rename_list(existing.id, &remote.title)?;
                        existing.title = remote.title.clone();
                        if !outcome.renamed.contains(&existing.id)
                            && !outcome.created.contains(&existing.id)
                        {
                            outcome.renamed.push(existing.id);
                        }
                    }
                }
                None => {
                    let id = repo.insert_list(account_key, &remote.remote_id, &remote.title, 0)?;
                    outcome.created.push(id);
                    local.insert(
                        remote.remote_id.clone(),
                        TaskList {
                            id,
                            account_key: account_key.to_string(),
                            remote_id: remote.remote_id.clone(),
                            title: remote.title.clone(),
                            last_sync: 0,
                        },
                    );
                }
            }
        }

        let mut removed: Vec<&TaskList> = local
            .values()
            .filter(|list| !seen.contains(list.remote_id.as_str()))
            .collect();
        removed.sort_by_key(|list| list.id);

        let deleter = CascadeDeleter::unchecked(tx, &self.config);
        for list in removed {
            let task_ids = deleter.delete_list(list)?;
            outcome.deleted_lists.push(list.id);
            outcome.deleted_task_ids.extend(task_ids);
        }

        Ok(outcome)
    }
}

fn validate_snapshot(snapshot: &[RemoteList]) -> Result<(), ReconcileError> {
    for (index, remote) in snapshot.iter().enumerate() {
        if remote.remote_id.trim().is_empty() {
            warn!("event=reconcile module=reconcile status=rejected index={index} reason=blank_remote_id");
            return Err(ReconcileError::InvalidSnapshot {
                index,
                reason: "remote id must not be blank",
            });
        }
    }
    Ok(())
}
