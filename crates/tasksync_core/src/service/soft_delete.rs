//! Soft-delete and purge engine.
//!
//! # Invariants
//! - One `mark_deleted` call stamps every id with the same wall-clock value.
//! - Purge only hard-deletes tombstoned tasks filed under the local-only
//!   account; tombstones in remote-synced lists wait for the remote side to
//!   confirm the deletion through sync.

use crate::config::EngineConfig;
use crate::model::now_epoch_ms;
use crate::model::task::TaskId;
use crate::repo::atomic::run_atomic;
use crate::repo::deletion_repo::{mark_deleted_chunk, purgeable_task_ids};
use crate::repo::{ensure_connection_ready, RepoResult};
use crate::service::cascade::{CascadeDeleter, DeletionError};
use crate::service::chunked_ids;
use log::{debug, info};
use rusqlite::Connection;

/// Tombstones tasks and purges safe tombstones.
pub struct SoftDeleteService<'conn> {
    conn: &'conn Connection,
    config: EngineConfig,
}

impl<'conn> SoftDeleteService<'conn> {
    pub fn try_new(conn: &'conn Connection, config: &EngineConfig) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        config.validate()?;
        Ok(Self::unchecked(conn, config))
    }

    pub(crate) fn unchecked(conn: &'conn Connection, config: &EngineConfig) -> Self {
        Self {
            conn,
            config: config.clone(),
        }
    }

    /// Marks `ids` deleted at the current time. Returns rows touched.
    pub fn mark_deleted(&self, ids: &[TaskId]) -> Result<usize, DeletionError> {
        self.mark_deleted_at(ids, now_epoch_ms())
    }

    /// Marks `ids` deleted at `now`, one atomic unit per batch.
    ///
    /// Re-marking an already deleted task just advances its timestamps.
    pub fn mark_deleted_at(&self, ids: &[TaskId], now: i64) -> Result<usize, DeletionError> {
        let mut touched = 0;
        for (batch_index, chunk) in chunked_ids(ids, self.config.chunk_size)
            .into_iter()
            .enumerate()
        {
            let changed = run_atomic(self.conn, |tx| mark_deleted_chunk(tx, &chunk, now))
                .map_err(|source| DeletionError::Batch {
                    batch_index,
                    batches_committed: batch_index,
                    source,
                })?;
            touched += changed;
        }
        debug!(
            "event=mark_deleted module=soft_delete status=ok requested={} touched={}",
            ids.len(),
            touched
        );
        Ok(touched)
    }

    /// Hard-deletes tombstoned tasks of the local-only account together with
    /// their dependents. Returns the purged ids.
    pub fn purge_deleted(&self) -> Result<Vec<TaskId>, DeletionError> {
        let purged = run_atomic(self.conn, |tx| -> Result<Vec<TaskId>, DeletionError> {
            let ids = purgeable_task_ids(tx)?;
            CascadeDeleter::unchecked(tx, &self.config).delete_tasks(&ids)?;
            Ok(ids)
        })?;

        if !purged.is_empty() {
            info!(
                "event=purge_deleted module=soft_delete status=ok tasks={}",
                purged.len()
            );
        }
        Ok(purged)
    }
}
