use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tasksync_core::db::open_db_in_memory;
use tasksync_core::{
    AlarmScheduler, CascadeDeleter, CleanupCoordinator, EngineConfig, ExternalResources,
    FileStore, Geofence, GeofenceRegistrar, ListMembership, ListRepository,
    NotificationPresenter, ResourceError, ResourceResult, SoftDeleteService,
    SqliteListRepository, SqliteTaskRepository, Task, TaskId, TaskRepository, TimerController,
    LOCAL_ACCOUNT_KEY,
};

#[test]
fn releases_every_resource_held_by_a_task() {
    let conn = open_db_in_memory().unwrap();
    let task = seed_task(&conn, "with resources");
    let recorder = Recorder::new();

    let report = coordinator(&conn, &recorder).cleanup(&[task]).unwrap();

    assert_eq!(report.tasks_processed, 1);
    assert_eq!(report.release_failures, 0);
    assert!(report.purged.is_empty());
    assert_eq!(report.drained, 0);
    assert_eq!(
        recorder.events(),
        vec![
            format!("alarm:{task}"),
            format!("timer:{task}"),
            format!("notification:{task}"),
            "geofence:place-home".to_string(),
            "file:attachments/report.pdf".to_string(),
            "file:comments/photo.jpg".to_string(),
            "timer_notifications".to_string(),
        ]
    );

    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    assert!(tasks.geofences_for_task(task).unwrap().is_empty());
    assert!(tasks.attachments_for_task(task).unwrap().is_empty());
    assert!(tasks.comments_for_task(task).unwrap().is_empty());
    assert_eq!(tasks.alarms_for_task(task).unwrap().len(), 1);
}

#[test]
fn drains_references_queued_by_cascade_deletion() {
    let conn = open_db_in_memory().unwrap();
    let task = seed_task(&conn, "deleted first");
    CascadeDeleter::try_new(&conn, &EngineConfig::default())
        .unwrap()
        .delete_tasks(&[task])
        .unwrap();
    assert_eq!(outbox_len(&conn), 3);
    let recorder = Recorder::new();

    let report = coordinator(&conn, &recorder).cleanup(&[task]).unwrap();

    assert_eq!(report.drained, 3);
    assert_eq!(report.release_failures, 0);
    assert_eq!(outbox_len(&conn), 0);
    let events = recorder.events();
    assert!(events.contains(&format!("alarm:{task}")));
    assert!(events.contains(&"geofence:place-home".to_string()));
    assert!(events.contains(&"file:attachments/report.pdf".to_string()));
    assert!(events.contains(&"file:comments/photo.jpg".to_string()));
}

#[test]
fn failed_file_release_is_counted_and_retried_next_run() {
    let conn = open_db_in_memory().unwrap();
    let task = seed_task(&conn, "stubborn");
    let recorder = Recorder::new();
    recorder.fail_file("attachments/report.pdf");

    let first = coordinator(&conn, &recorder).cleanup(&[task]).unwrap();

    assert_eq!(first.tasks_processed, 1);
    assert_eq!(first.release_failures, 1);
    assert_eq!(first.drained, 0);
    assert_eq!(outbox_len(&conn), 1);
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    assert!(tasks.attachments_for_task(task).unwrap().is_empty());

    recorder.heal_files();
    let second = coordinator(&conn, &recorder).cleanup(&[]).unwrap();

    assert_eq!(second.tasks_processed, 0);
    assert_eq!(second.release_failures, 0);
    assert_eq!(second.drained, 1);
    assert_eq!(outbox_len(&conn), 0);
}

#[test]
fn failing_managers_do_not_stop_the_run() {
    let conn = open_db_in_memory().unwrap();
    let first = seed_task(&conn, "first");
    let second = seed_task(&conn, "second");
    let recorder = Recorder::new();
    recorder.fail_alarms();

    let report = coordinator(&conn, &recorder).cleanup(&[first, second]).unwrap();

    assert_eq!(report.tasks_processed, 2);
    assert_eq!(report.release_failures, 2);
    let events = recorder.events();
    assert!(events.contains(&format!("notification:{first}")));
    assert!(events.contains(&format!("notification:{second}")));
}

#[test]
fn cleanup_purges_local_tombstones_and_releases_their_files() {
    let conn = open_db_in_memory().unwrap();
    let lists = SqliteListRepository::try_new(&conn).unwrap();
    let inbox = lists.insert_list(LOCAL_ACCOUNT_KEY, "inbox", "Inbox", 0).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let tombstone = tasks.create_task(&Task::new("trash")).unwrap();
    tasks.add_attachment(tombstone, "attachments/old.txt").unwrap();
    tasks
        .add_membership(&ListMembership {
            id: 0,
            task: tombstone,
            list_id: inbox,
            remote_id: None,
            deleted: 0,
            remote_order: 0,
            remote_parent: None,
        })
        .unwrap();
    SoftDeleteService::try_new(&conn, &EngineConfig::default())
        .unwrap()
        .mark_deleted(&[tombstone])
        .unwrap();
    let recorder = Recorder::new();

    let report = coordinator(&conn, &recorder).cleanup(&[]).unwrap();

    assert_eq!(report.purged, vec![tombstone]);
    assert_eq!(report.drained, 1);
    assert!(tasks.get_task(tombstone).unwrap().is_none());
    assert!(recorder
        .events()
        .contains(&"file:attachments/old.txt".to_string()));
}

#[test]
fn unknown_ids_only_cancel_task_scoped_managers() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Recorder::new();

    let report = coordinator(&conn, &recorder).cleanup(&[404]).unwrap();

    assert_eq!(report.tasks_processed, 1);
    assert_eq!(
        recorder.events(),
        vec![
            "alarm:404".to_string(),
            "timer:404".to_string(),
            "notification:404".to_string(),
            "timer_notifications".to_string(),
        ]
    );
}

#[derive(Default)]
struct RecorderState {
    events: Vec<String>,
    failing_files: HashSet<String>,
    failing_alarms: bool,
}

/// Records every release call; individual managers can be told to fail.
#[derive(Clone, Default)]
struct Recorder {
    state: Arc<Mutex<RecorderState>>,
}

impl Recorder {
    fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    fn fail_file(&self, reference: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_files
            .insert(reference.to_string());
    }

    fn heal_files(&self) {
        self.state.lock().unwrap().failing_files.clear();
    }

    fn fail_alarms(&self) {
        self.state.lock().unwrap().failing_alarms = true;
    }

    fn push(&self, event: String) {
        self.state.lock().unwrap().events.push(event);
    }

    fn resources(&self) -> ExternalResources {
        let shared = Arc::new(self.clone());
        ExternalResources {
            alarms: shared.clone(),
            notifications: shared.clone(),
            timers: shared.clone(),
            geofences: shared.clone(),
            files: shared,
        }
    }
}

impl AlarmScheduler for Recorder {
    fn cancel(&self, task: TaskId) -> ResourceResult {
        if self.state.lock().unwrap().failing_alarms {
            return Err(ResourceError::new("alarm", task.to_string(), "scheduler offline"));
        }
        self.push(format!("alarm:{task}"));
        Ok(())
    }
}

impl NotificationPresenter for Recorder {
    fn cancel(&self, task: TaskId) -> ResourceResult {
        self.push(format!("notification:{task}"));
        Ok(())
    }
}

impl TimerController for Recorder {
    fn cancel(&self, task: TaskId) -> ResourceResult {
        self.push(format!("timer:{task}"));
        Ok(())
    }

    fn update_notifications(&self) -> ResourceResult {
        self.push("timer_notifications".to_string());
        Ok(())
    }
}

impl GeofenceRegistrar for Recorder {
    fn update(&self, place: &str) -> ResourceResult {
        self.push(format!("geofence:{place}"));
        Ok(())
    }
}

impl FileStore for Recorder {
    fn delete(&self, reference: &str) -> ResourceResult {
        if self.state.lock().unwrap().failing_files.contains(reference) {
            return Err(ResourceError::new("file", reference, "permission denied"));
        }
        self.push(format!("file:{reference}"));
        Ok(())
    }
}

fn coordinator<'conn>(conn: &'conn Connection, recorder: &Recorder) -> CleanupCoordinator<'conn> {
    CleanupCoordinator::try_new(conn, recorder.resources(), &EngineConfig::default()).unwrap()
}

fn seed_task(conn: &Connection, title: &str) -> TaskId {
    let tasks = SqliteTaskRepository::try_new(conn).unwrap();
    let id = tasks.create_task(&Task::new(title)).unwrap();
    tasks.add_alarm(id, 1_700_000_000_000).unwrap();
    tasks
        .add_geofence(&Geofence {
            id: 0,
            task: id,
            place: "place-home".to_string(),
            latitude: 48.85,
            longitude: 2.35,
            radius: 100,
        })
        .unwrap();
    tasks.add_attachment(id, "attachments/report.pdf").unwrap();
    tasks
        .add_comment(id, "see photo", Some("comments/photo.jpg"))
        .unwrap();
    id
}

fn outbox_len(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM released_resources;", [], |row| row.get(0))
        .unwrap()
}
