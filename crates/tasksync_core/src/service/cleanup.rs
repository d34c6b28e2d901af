//! Cleanup coordinator.
//!
//! # Responsibility
//! - For each task id: cancel alarms, timers and notifications, release
//!   geofence registrations, delete attachment and comment media, and
//!   remove the rows that referenced them.
//! - Afterwards: recompute timer notifications, purge local tombstones and
//!   drain the released-resource outbox.
//!
//! # Invariants
//! - A failed release is logged and counted; it never stops the run.
//! - A file whose deletion failed is queued in the outbox before its row is
//!   removed, so the next run retries it.
//! - Storage failures stop the run and reach the caller.

use crate::config::EngineConfig;
use crate::model::task::TaskId;
use crate::repo::deletion_repo::{
    pending_released, queue_released, remove_released, ReleasedKind,
};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use crate::resource::{ExternalResources, ResourceResult};
use crate::service::cascade::DeletionError;
use crate::service::soft_delete::SoftDeleteService;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Storage failure during cleanup.
#[derive(Debug)]
pub enum CleanupError {
    Repo(RepoError),
    Purge(DeletionError),
}

impl Display for CleanupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Purge(err) => write!(f, "purge failed: {err}"),
        }
    }
}

impl Error for CleanupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Purge(err) => Some(err),
        }
    }
}

impl From<RepoError> for CleanupError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DeletionError> for CleanupError {
    fn from(value: DeletionError) -> Self {
        Self::Purge(value)
    }
}

/// What one cleanup run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub tasks_processed: usize,
    /// External releases that failed and were skipped or re-queued.
    pub release_failures: usize,
    pub purged: Vec<TaskId>,
    /// Outbox entries released and removed.
    pub drained: usize,
}

/// Releases external resources held for tasks, then purges.
pub struct CleanupCoordinator<'conn> {
    conn: &'conn Connection,
    resources: ExternalResources,
    config: EngineConfig,
}

impl<'conn> CleanupCoordinator<'conn> {
    pub fn try_new(
        conn: &'conn Connection,
        resources: ExternalResources,
        config: &EngineConfig,
    ) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        config.validate()?;
        Ok(Self {
            conn,
            resources,
            config: config.clone(),
        })
    }

    pub fn cleanup(&self, ids: &[TaskId]) -> Result<CleanupReport, CleanupError> {
        let started_at = Instant::now();
        let repo = SqliteTaskRepository::unchecked(self.conn);
        let mut report = CleanupReport::default();
        let mut requeued = HashSet::new();

        for &task in ids {
            self.release_task(&repo, task, &mut requeued, &mut report)?;
            report.tasks_processed += 1;
        }

        self.record(self.resources.timers.update_notifications(), &mut report);
        report.purged = SoftDeleteService::unchecked(self.conn, &self.config).purge_deleted()?;
        self.drain_released(&requeued, &mut report)?;

        info!(
            "event=cleanup module=cleanup status=ok tasks={} release_failures={} purged={} drained={} duration_ms={}",
            report.tasks_processed,
            report.release_failures,
            report.purged.len(),
            report.drained,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn release_task(
        &self,
        repo: &SqliteTaskRepository<'_>,
        task: TaskId,
        requeued: &mut HashSet<i64>,
        report: &mut CleanupReport,
    ) -> Result<(), CleanupError> {
        self.record(self.resources.alarms.cancel(task), report);
        self.record(self.resources.timers.cancel(task), report);
        self.record(self.resources.notifications.cancel(task), report);

        for geofence in repo.geofences_for_task(task)? {
            repo.delete_geofence(geofence.id)?;
            self.record(self.resources.geofences.update(&geofence.place), report);
        }

        for attachment in repo.attachments_for_task(task)? {
            self.release_file(task, &attachment.uri, requeued, report)?;
            repo.delete_attachment(attachment.id)?;
        }

        for comment in repo.comments_for_task(task)? {
            if let Some(picture) = comment.picture_uri.as_deref().filter(|uri| !uri.is_empty()) {
                self.release_file(task, picture, requeued, report)?;
            }
            repo.delete_comment(comment.id)?;
        }

        Ok(())
    }

    fn release_file(
        &self,
        task: TaskId,
        reference: &str,
        requeued: &mut HashSet<i64>,
        report: &mut CleanupReport,
    ) -> Result<(), CleanupError> {
        if let Err(err) = self.resources.files.delete(reference) {
            warn!(
                "event=release module=cleanup status=requeued resource={} task={} error={}",
                err.resource, task, err.message
            );
            report.release_failures += 1;
            let entry = queue_released(self.conn, ReleasedKind::File, reference, task)?;
            requeued.insert(entry);
        }
        Ok(())
    }

    fn drain_released(
        &self,
        requeued: &HashSet<i64>,
        report: &mut CleanupReport,
    ) -> Result<(), CleanupError> {
        for item in pending_released(self.conn)? {
            if requeued.contains(&item.id) {
                continue;
            }
            let released = match item.kind {
                ReleasedKind::File => self.resources.files.delete(&item.reference),
                ReleasedKind::Place => self.resources.geofences.update(&item.reference),
            };
            if self.record(released, report) {
                remove_released(self.conn, item.id)?;
                report.drained += 1;
            }
        }
        Ok(())
    }

    /// Logs a failed release; returns whether it succeeded.
    fn record(&self, result: ResourceResult, report: &mut CleanupReport) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=release module=cleanup status=error resource={} error={}",
                    err.resource, err.message
                );
                report.release_failures += 1;
                false
            }
        }
    }
}
