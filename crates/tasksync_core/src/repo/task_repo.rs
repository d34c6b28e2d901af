//! Task and task-owned record persistence.
//!
//! # Responsibility
//! - Create/read tasks and the records hanging off them.
//! - Per-task lookups the cleanup coordinator walks before releasing
//!   external resources.
//!
//! # Invariants
//! - Write paths validate before SQL mutations.
//! - Dependent inserts fail with a foreign-key error when the task is gone.

use super::{ensure_connection_ready, placeholders, RepoError, RepoResult};
use crate::model::task::{
    Alarm, Attachment, Comment, Geofence, ListMembership, RecurrenceRule, Task, TaskId,
};
use crate::model::task_list::ListId;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    created,
    modified,
    completed,
    deleted,
    due_date,
    has_due_time,
    recurrence
FROM tasks";

/// Tables whose rows reference `tasks.id` through a `task` column.
pub const DEPENDENT_TABLES: [&str; 6] = [
    "alarms",
    "geofences",
    "tags",
    "list_memberships",
    "attachments",
    "comments",
];

/// Repository interface for tasks and their dependent records.
pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Ids of tasks linked to `list_id` by a membership not flagged deleted.
    fn active_task_ids_for_list(&self, list_id: ListId) -> RepoResult<Vec<TaskId>>;
    fn add_tag(&self, task: TaskId, name: &str) -> RepoResult<i64>;
    fn add_alarm(&self, task: TaskId, time: i64) -> RepoResult<i64>;
    fn add_geofence(&self, geofence: &Geofence) -> RepoResult<i64>;
    fn add_attachment(&self, task: TaskId, uri: &str) -> RepoResult<Attachment>;
    fn add_comment(
        &self,
        task: TaskId,
        message: &str,
        picture_uri: Option<&str>,
    ) -> RepoResult<Comment>;
    fn add_membership(&self, membership: &ListMembership) -> RepoResult<i64>;
    fn alarms_for_task(&self, task: TaskId) -> RepoResult<Vec<Alarm>>;
    fn geofences_for_task(&self, task: TaskId) -> RepoResult<Vec<Geofence>>;
    fn attachments_for_task(&self, task: TaskId) -> RepoResult<Vec<Attachment>>;
    fn comments_for_task(&self, task: TaskId) -> RepoResult<Vec<Comment>>;
    fn delete_geofence(&self, id: i64) -> RepoResult<()>;
    fn delete_attachment(&self, id: i64) -> RepoResult<()>;
    fn delete_comment(&self, id: i64) -> RepoResult<()>;
    /// Number of dependent rows, across every dependent table, referencing any of `ids`.
    fn count_dependents(&self, ids: &[TaskId]) -> RepoResult<i64>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;
        self.conn.execute(
            "INSERT INTO tasks (
                title,
                created,
                modified,
                completed,
                deleted,
                due_date,
                has_due_time,
                recurrence
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                task.title,
                task.created,
                task.modified,
                task.completed,
                task.deleted,
                task.due_date,
                task.has_due_time,
                task.recurrence.map(|rule| rule.to_string()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn active_task_ids_for_list(&self, list_id: ListId) -> RepoResult<Vec<TaskId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT task
             FROM list_memberships
             WHERE list_id = ?1
               AND deleted = 0
             ORDER BY task ASC;",
        )?;
        let ids = stmt
            .query_map([list_id], |row| row.get::<_, TaskId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn add_tag(&self, task: TaskId, name: &str) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO tags (task, name) VALUES (?1, ?2);",
            params![task, name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_alarm(&self, task: TaskId, time: i64) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO alarms (task, time) VALUES (?1, ?2);",
            params![task, time],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_geofence(&self, geofence: &Geofence) -> RepoResult<i64> {
        geofence.validate()?;
        self.conn.execute(
            "INSERT INTO geofences (task, place, latitude, longitude, radius)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                geofence.task,
                geofence.place,
                geofence.latitude,
                geofence.longitude,
                geofence.radius,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_attachment(&self, task: TaskId, uri: &str) -> RepoResult<Attachment> {
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO attachments (task, uuid, uri) VALUES (?1, ?2, ?3);",
            params![task, uuid, uri],
        )?;
        Ok(Attachment {
            id: self.conn.last_insert_rowid(),
            task,
            uuid,
            uri: uri.to_string(),
        })
    }

    fn add_comment(
        &self,
        task: TaskId,
        message: &str,
        picture_uri: Option<&str>,
    ) -> RepoResult<Comment> {
        let uuid = Uuid::new_v4().to_string();
        let created = crate::model::now_epoch_ms();
        self.conn.execute(
            "INSERT INTO comments (task, uuid, message, picture_uri, created)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![task, uuid, message, picture_uri, created],
        )?;
        Ok(Comment {
            id: self.conn.last_insert_rowid(),
            task,
            uuid,
            message: message.to_string(),
            picture_uri: picture_uri.map(str::to_string),
            created,
        })
    }

    fn add_membership(&self, membership: &ListMembership) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO list_memberships (
                task,
                list_id,
                remote_id,
                deleted,
                remote_order,
                remote_parent
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                membership.task,
                membership.list_id,
                membership.remote_id,
                membership.deleted,
                membership.remote_order,
                membership.remote_parent,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn alarms_for_task(&self, task: TaskId) -> RepoResult<Vec<Alarm>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, task, time FROM alarms WHERE task = ?1 ORDER BY time ASC;")?;
        let alarms = stmt
            .query_map([task], |row| {
                Ok(Alarm {
                    id: row.get(0)?,
                    task: row.get(1)?,
                    time: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alarms)
    }

    fn geofences_for_task(&self, task: TaskId) -> RepoResult<Vec<Geofence>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task, place, latitude, longitude, radius
             FROM geofences
             WHERE task = ?1
             ORDER BY id ASC;",
        )?;
        let geofences = stmt
            .query_map([task], |row| {
                Ok(Geofence {
                    id: row.get(0)?,
                    task: row.get(1)?,
                    place: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                    radius: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(geofences)
    }

    fn attachments_for_task(&self, task: TaskId) -> RepoResult<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task, uuid, uri FROM attachments WHERE task = ?1 ORDER BY id ASC;",
        )?;
        let attachments = stmt
            .query_map([task], |row| {
                Ok(Attachment {
                    id: row.get(0)?,
                    task: row.get(1)?,
                    uuid: row.get(2)?,
                    uri: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attachments)
    }

    fn comments_for_task(&self, task: TaskId) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task, uuid, message, picture_uri, created
             FROM comments
             WHERE task = ?1
             ORDER BY created ASC, id ASC;",
        )?;
        let comments = stmt
            .query_map([task], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    task: row.get(1)?,
                    uuid: row.get(2)?,
                    message: row.get(3)?,
                    picture_uri: row.get(4)?,
                    created: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    fn delete_geofence(&self, id: i64) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM geofences WHERE id = ?1;", [id])?;
        Ok(())
    }

    fn delete_attachment(&self, id: i64) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM attachments WHERE id = ?1;", [id])?;
        Ok(())
    }

    fn delete_comment(&self, id: i64) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM comments WHERE id = ?1;", [id])?;
        Ok(())
    }

    fn count_dependents(&self, ids: &[TaskId]) -> RepoResult<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut total = 0;
        for table in DEPENDENT_TABLES {
            let sql = format!(
                "SELECT COUNT(*) FROM {table} WHERE task IN ({});",
                placeholders(ids.len())
            );
            let count: i64 = self
                .conn
                .query_row(&sql, params_from_iter(ids.iter()), |row| row.get(0))?;
            total += count;
        }
        Ok(total)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let recurrence = match row.get::<_, Option<String>>("recurrence")? {
        Some(value) => Some(value.parse::<RecurrenceRule>().map_err(|_| {
            RepoError::InvalidData(format!("invalid recurrence `{value}` in tasks.recurrence"))
        })?),
        None => None,
    };

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        created: row.get("created")?,
        modified: row.get("modified")?,
        completed: row.get("completed")?,
        deleted: row.get("deleted")?,
        due_date: row.get("due_date")?,
        has_due_time: row.get("has_due_time")?,
        recurrence,
    })
}
