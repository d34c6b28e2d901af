//! External resource managers consumed by the cleanup coordinator.
//!
//! # Responsibility
//! - Define one idempotent release operation per resource owner.
//! - Bundle the managers so engines receive them explicitly.
//!
//! # Invariants
//! - Every release may be retried: releasing something already gone
//!   succeeds.
//! - Release failures are recoverable; callers log and continue.

mod detached;
mod file_store;

pub use detached::Detached;
pub use file_store::LocalFileStore;

use crate::model::task::TaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Recoverable failure releasing one external resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceError {
    pub resource: &'static str,
    pub reference: String,
    pub message: String,
}

impl ResourceError {
    pub fn new(
        resource: &'static str,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            reference: reference.into(),
            message: message.into(),
        }
    }
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to release {} `{}`: {}",
            self.resource, self.reference, self.message
        )
    }
}

impl Error for ResourceError {}

pub type ResourceResult = Result<(), ResourceError>;

/// Cancels scheduled alarms and reminders of a task.
pub trait AlarmScheduler: Send + Sync {
    fn cancel(&self, task: TaskId) -> ResourceResult;
}

/// Cancels delivered or pending notifications of a task.
pub trait NotificationPresenter: Send + Sync {
    fn cancel(&self, task: TaskId) -> ResourceResult;
}

/// Running task timers and the notification that summarises them.
pub trait TimerController: Send + Sync {
    fn cancel(&self, task: TaskId) -> ResourceResult;
    /// Recomputes timer notification state after a batch of cancellations.
    fn update_notifications(&self) -> ResourceResult;
}

/// Platform geofence registrations, keyed by place.
pub trait GeofenceRegistrar: Send + Sync {
    /// Re-evaluates the registration for `place` against remaining geofences.
    fn update(&self, place: &str) -> ResourceResult;
}

/// Storage for attachment and comment media files.
pub trait FileStore: Send + Sync {
    fn delete(&self, reference: &str) -> ResourceResult;
}

/// The set of resource managers handed to the cleanup coordinator.
#[derive(Clone)]
pub struct ExternalResources {
    pub alarms: Arc<dyn AlarmScheduler>,
    pub notifications: Arc<dyn NotificationPresenter>,
    pub timers: Arc<dyn TimerController>,
    pub geofences: Arc<dyn GeofenceRegistrar>,
    pub files: Arc<dyn FileStore>,
}

impl ExternalResources {
    /// Local files only; every other manager is [`Detached`].
    pub fn files_only(files: Arc<dyn FileStore>) -> Self {
        let detached = Arc::new(Detached);
        Self {
            alarms: detached.clone(),
            notifications: detached.clone(),
            timers: detached.clone(),
            geofences: detached,
            files,
        }
    }
}
