//! Local task store consistency engines.
//!
//! Keeps the local task database aligned with remote task-list providers and
//! guarantees that deleting an account, list or task never leaves dependent
//! records behind.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod resource;
pub mod service;
pub mod sync;

pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::account::{Account, AccountKind, LOCAL_ACCOUNT_KEY};
pub use model::task::{
    Alarm, Attachment, Comment, Frequency, Geofence, ListMembership, RecurrenceRule, Tag, Task,
    TaskId, TaskValidationError,
};
pub use model::task_list::{ListId, RemoteList, TaskList};
pub use repo::list_repo::{ListRepository, SqliteListRepository};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepository};
pub use repo::{RepoError, RepoResult};
pub use resource::{
    AlarmScheduler, Detached, ExternalResources, FileStore, GeofenceRegistrar, LocalFileStore,
    NotificationPresenter, ResourceError, ResourceResult, TimerController,
};
pub use service::cascade::{AccountDeletion, CascadeDeleter, DeletionError, DeletionReport};
pub use service::cleanup::{CleanupCoordinator, CleanupError, CleanupReport};
pub use service::reconcile::{ListReconciler, ReconcileError, ReconcileOutcome};
pub use service::soft_delete::SoftDeleteService;
pub use sync::remote::{RemoteError, RemoteListSource};
pub use sync::runner::{RemovalReport, SyncError, SyncReport, SyncRunner};
pub use sync::source_registry::{SourceRegistry, SourceRegistryError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
