use rusqlite::Connection;
use tasksync_core::db::open_db_in_memory;
use tasksync_core::{
    Account, AccountKind, EngineConfig, ListId, ListMembership, ListRepository,
    SoftDeleteService, SqliteListRepository, SqliteTaskRepository, Task, TaskId, TaskRepository,
    LOCAL_ACCOUNT_KEY,
};

#[test]
fn mark_deleted_stamps_every_task_with_one_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let ids: Vec<TaskId> = (0..25)
        .map(|index| tasks.create_task(&Task::new(format!("task {index}"))).unwrap())
        .collect();

    let config = EngineConfig::with_chunk_size(4).unwrap();
    let service = SoftDeleteService::try_new(&conn, &config).unwrap();
    let touched = service.mark_deleted(&ids).unwrap();
    assert_eq!(touched, 25);

    let stamps: Vec<(i64, i64)> = ids
        .iter()
        .map(|&id| {
            let task = tasks.get_task(id).unwrap().unwrap();
            (task.deleted, task.modified)
        })
        .collect();
    let (deleted, modified) = stamps[0];
    assert!(deleted > 0);
    assert_eq!(deleted, modified);
    assert!(stamps.iter().all(|&stamp| stamp == (deleted, modified)));
}

#[test]
fn mark_deleted_at_ignores_unknown_ids_and_keeps_other_tasks() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let doomed = tasks.create_task(&Task::new("doomed")).unwrap();
    let kept = tasks.create_task(&Task::new("kept")).unwrap();

    let service = SoftDeleteService::try_new(&conn, &EngineConfig::default()).unwrap();
    let touched = service.mark_deleted_at(&[doomed, 9_999], 1_234).unwrap();

    assert_eq!(touched, 1);
    let doomed = tasks.get_task(doomed).unwrap().unwrap();
    assert_eq!(doomed.deleted, 1_234);
    assert_eq!(doomed.modified, 1_234);
    assert!(doomed.is_deleted());
    assert!(!tasks.get_task(kept).unwrap().unwrap().is_deleted());
}

#[test]
fn mark_deleted_with_empty_input_touches_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = SoftDeleteService::try_new(&conn, &EngineConfig::default()).unwrap();
    assert_eq!(service.mark_deleted(&[]).unwrap(), 0);
}

#[test]
fn purge_removes_local_tombstones_with_dependents() {
    let conn = open_db_in_memory().unwrap();
    let local_list = list_for(&conn, LOCAL_ACCOUNT_KEY, "inbox");
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let tombstone = task_in(&tasks, local_list, "gone");
    tasks.add_alarm(tombstone, 42).unwrap();
    tasks.add_tag(tombstone, "home").unwrap();
    let alive = task_in(&tasks, local_list, "alive");

    let service = SoftDeleteService::try_new(&conn, &EngineConfig::default()).unwrap();
    service.mark_deleted_at(&[tombstone], 100).unwrap();
    let purged = service.purge_deleted().unwrap();

    assert_eq!(purged, vec![tombstone]);
    assert!(tasks.get_task(tombstone).unwrap().is_none());
    assert_eq!(tasks.count_dependents(&[tombstone]).unwrap(), 0);
    assert!(tasks.get_task(alive).unwrap().is_some());
    assert!(conn.is_autocommit());
}

#[test]
fn purge_keeps_tombstones_of_remote_synced_lists() {
    let conn = open_db_in_memory().unwrap();
    let remote_list = list_for(&conn, "acct1", "remote-1");
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let tombstone = task_in(&tasks, remote_list, "awaiting remote");

    let service = SoftDeleteService::try_new(&conn, &EngineConfig::default()).unwrap();
    service.mark_deleted_at(&[tombstone], 100).unwrap();
    let purged = service.purge_deleted().unwrap();

    assert!(purged.is_empty());
    let task = tasks.get_task(tombstone).unwrap().unwrap();
    assert_eq!(task.deleted, 100);
    assert_eq!(tasks.count_dependents(&[tombstone]).unwrap(), 1);
}

#[test]
fn purge_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let local_list = list_for(&conn, LOCAL_ACCOUNT_KEY, "inbox");
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let ids: Vec<TaskId> = (0..3)
        .map(|index| task_in(&tasks, local_list, &format!("task {index}")))
        .collect();

    let config = EngineConfig::with_chunk_size(2).unwrap();
    let service = SoftDeleteService::try_new(&conn, &config).unwrap();
    service.mark_deleted(&ids).unwrap();

    assert_eq!(service.purge_deleted().unwrap(), ids);
    assert!(service.purge_deleted().unwrap().is_empty());
}

fn list_for(conn: &Connection, account_key: &str, remote_id: &str) -> ListId {
    let lists = SqliteListRepository::try_new(conn).unwrap();
    if lists.get_account(account_key).unwrap().is_none() {
        lists
            .create_account(&Account::new(account_key, account_key, AccountKind::Caldav))
            .unwrap();
    }
    lists.insert_list(account_key, remote_id, remote_id, 0).unwrap()
}

fn task_in(tasks: &SqliteTaskRepository<'_>, list_id: ListId, title: &str) -> TaskId {
    let id = tasks.create_task(&Task::new(title)).unwrap();
    tasks
        .add_membership(&ListMembership {
            id: 0,
            task: id,
            list_id,
            remote_id: None,
            deleted: 0,
            remote_order: 0,
            remote_parent: None,
        })
        .unwrap();
    id
}
