//! Per-account sync and removal runs.
//!
//! # Invariants
//! - Runs for one account are serialised through `AccountLocks`.
//! - The remote snapshot is fetched before any write; a fetch failure leaves
//!   the store untouched.
//! - Every run opens its own connection, so runs for different accounts
//!   proceed in parallel and contend only on SQLite's write lock.

use crate::config::EngineConfig;
use crate::db::{open_db_with_timeout, DbError};
use crate::model::account::Account;
use crate::repo::list_repo::{ListRepository, SqliteListRepository};
use crate::repo::RepoError;
use crate::resource::ExternalResources;
use crate::service::cascade::{AccountDeletion, CascadeDeleter, DeletionError};
use crate::service::cleanup::{CleanupCoordinator, CleanupError, CleanupReport};
use crate::service::reconcile::{ListReconciler, ReconcileError, ReconcileOutcome};
use crate::sync::account_locks::AccountLocks;
use crate::sync::remote::RemoteError;
use crate::sync::source_registry::{SourceRegistry, SourceRegistryError};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Failure of one account run.
#[derive(Debug)]
pub enum SyncError {
    Db(DbError),
    Repo(RepoError),
    AccountNotFound(String),
    Registry(SourceRegistryError),
    Remote(RemoteError),
    Reconcile(ReconcileError),
    Deletion(DeletionError),
    Cleanup(CleanupError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::AccountNotFound(key) => write!(f, "account not found: {key}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Remote(err) => write!(f, "remote fetch failed: {err}"),
            Self::Reconcile(err) => write!(f, "reconcile failed: {err}"),
            Self::Deletion(err) => write!(f, "{err}"),
            Self::Cleanup(err) => write!(f, "cleanup failed: {err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::AccountNotFound(_) => None,
            Self::Registry(err) => Some(err),
            Self::Remote(err) => Some(err),
            Self::Reconcile(err) => Some(err),
            Self::Deletion(err) => Some(err),
            Self::Cleanup(err) => Some(err),
        }
    }
}

impl From<DbError> for SyncError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SourceRegistryError> for SyncError {
    fn from(value: SourceRegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

impl From<ReconcileError> for SyncError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

impl From<DeletionError> for SyncError {
    fn from(value: DeletionError) -> Self {
        Self::Deletion(value)
    }
}

impl From<CleanupError> for SyncError {
    fn from(value: CleanupError) -> Self {
        Self::Cleanup(value)
    }
}

/// Result of `sync_account`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: ReconcileOutcome,
    /// `None` when reconciliation removed no tasks.
    pub cleanup: Option<CleanupReport>,
}

/// Result of `remove_account`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalReport {
    pub deletion: AccountDeletion,
    pub cleanup: CleanupReport,
}

/// Runs list sync and account removal against a task store file.
pub struct SyncRunner {
    db_path: PathBuf,
    sources: SourceRegistry,
    resources: ExternalResources,
    config: EngineConfig,
    locks: AccountLocks,
}

impl SyncRunner {
    pub fn new(
        db_path: impl Into<PathBuf>,
        sources: SourceRegistry,
        resources: ExternalResources,
        config: EngineConfig,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            sources,
            resources,
            config,
            locks: AccountLocks::new(),
        }
    }

    /// Fetches the account's remote lists, reconciles them and cleans up
    /// the tasks of removed lists.
    pub fn sync_account(&self, account_key: &str) -> Result<SyncReport, SyncError> {
        self.locks.with_account(account_key, || {
            let result = self.sync_locked(account_key);
            if let Err(err) = &result {
                error!("event=sync_account module=sync status=error error={err}");
            }
            result
        })
    }

    /// Deletes the account with all lists and tasks, then cleans up.
    pub fn remove_account(&self, account_key: &str) -> Result<RemovalReport, SyncError> {
        self.locks.with_account(account_key, || {
            let conn = self.open()?;
            let account = load_account(&conn, account_key)?;
            let deletion = CascadeDeleter::try_new(&conn, &self.config)?.delete_account(&account)?;
            let cleanup = self.coordinator(&conn)?.cleanup(&deletion.task_ids)?;
            info!(
                "event=remove_account module=sync status=ok lists={} tasks={}",
                deletion.lists_deleted,
                deletion.task_ids.len()
            );
            Ok(RemovalReport { deletion, cleanup })
        })
    }

    fn sync_locked(&self, account_key: &str) -> Result<SyncReport, SyncError> {
        let conn = self.open()?;
        let account = load_account(&conn, account_key)?;
        let source = self.sources.source_for(&account)?;
        let snapshot = source.fetch_lists(&account)?;

        let outcome = ListReconciler::try_new(&conn, &self.config)?.reconcile(&account, &snapshot)?;
        let cleanup = if outcome.deleted_task_ids.is_empty() {
            None
        } else {
            Some(self.coordinator(&conn)?.cleanup(&outcome.deleted_task_ids)?)
        };

        info!(
            "event=sync_account module=sync status=ok provider={} remote_lists={}",
            source.provider_id(),
            snapshot.len()
        );
        Ok(SyncReport { outcome, cleanup })
    }

    fn open(&self) -> Result<Connection, SyncError> {
        Ok(open_db_with_timeout(
            &self.db_path,
            self.config.busy_timeout(),
        )?)
    }

    fn coordinator<'conn>(
        &self,
        conn: &'conn Connection,
    ) -> Result<CleanupCoordinator<'conn>, SyncError> {
        Ok(CleanupCoordinator::try_new(
            conn,
            self.resources.clone(),
            &self.config,
        )?)
    }
}

fn load_account(conn: &Connection, account_key: &str) -> Result<Account, SyncError> {
    SqliteListRepository::try_new(conn)?
        .get_account(account_key)?
        .ok_or_else(|| SyncError::AccountNotFound(account_key.to_string()))
}
