//! Batched deletion statements and the released-resource outbox.
//!
//! # Responsibility
//! - Declare the order in which task-owned tables are emptied.
//! - Run one cascade step for one chunk of task ids.
//! - Soft-delete and purge-eligibility queries.
//!
//! # Invariants
//! - Every statement binds at most one chunk of ids; callers size chunks.
//! - A step that removes rows carrying external references (files, places)
//!   first copies those references into `released_resources` in the same
//!   transaction, so a reference is never lost between row removal and
//!   resource release.

use super::{placeholders, RepoError, RepoResult};
use crate::model::account::LOCAL_ACCOUNT_KEY;
use crate::model::task::TaskId;
use crate::model::task_list::ListId;
use rusqlite::{params, params_from_iter, Connection};

/// One table emptied during cascading deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    Alarms,
    Geofences,
    Tags,
    Memberships,
    Attachments,
    Comments,
    Tasks,
}

/// Dependency order of a cascading delete: dependents first, task rows last.
pub const CASCADE_ORDER: [CascadeStep; 7] = [
    CascadeStep::Alarms,
    CascadeStep::Geofences,
    CascadeStep::Tags,
    CascadeStep::Memberships,
    CascadeStep::Attachments,
    CascadeStep::Comments,
    CascadeStep::Tasks,
];

impl CascadeStep {
    pub fn table(self) -> &'static str {
        match self {
            Self::Alarms => "alarms",
            Self::Geofences => "geofences",
            Self::Tags => "tags",
            Self::Memberships => "list_memberships",
            Self::Attachments => "attachments",
            Self::Comments => "comments",
            Self::Tasks => "tasks",
        }
    }

    fn task_column(self) -> &'static str {
        match self {
            Self::Tasks => "id",
            _ => "task",
        }
    }

    /// Column holding an external reference that must outlive the row.
    fn released_reference(self) -> Option<(ReleasedKind, &'static str)> {
        match self {
            Self::Geofences => Some((ReleasedKind::Place, "place")),
            Self::Attachments => Some((ReleasedKind::File, "uri")),
            Self::Comments => Some((ReleasedKind::File, "picture_uri")),
            _ => None,
        }
    }
}

/// Kind of external reference queued for release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleasedKind {
    /// Attachment or comment media file reference.
    File,
    /// Geofence place whose registration needs re-evaluation.
    Place,
}

impl ReleasedKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Place => "place",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(Self::File),
            "place" => Some(Self::Place),
            _ => None,
        }
    }
}

/// An external reference whose owning row has already been deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedResource {
    pub id: i64,
    pub kind: ReleasedKind,
    pub reference: String,
    pub task: TaskId,
}

/// Applies one cascade step to one chunk; returns rows removed.
pub fn apply_cascade_step(conn: &Connection, step: CascadeStep, ids: &[TaskId]) -> RepoResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let table = step.table();
    let column = step.task_column();
    let in_clause = placeholders(ids.len());

    if let Some((kind, reference_column)) = step.released_reference() {
        let sql = format!(
            "INSERT INTO released_resources (kind, reference, released_task)
             SELECT '{}', {reference_column}, task
             FROM {table}
             WHERE task IN ({in_clause})
               AND {reference_column} IS NOT NULL
               AND {reference_column} != '';",
            kind.as_str()
        );
        conn.execute(&sql, params_from_iter(ids.iter()))?;
    }

    let sql = format!("DELETE FROM {table} WHERE {column} IN ({in_clause});");
    Ok(conn.execute(&sql, params_from_iter(ids.iter()))?)
}

/// Removes memberships still pointing at `list_id`, including ones already
/// flagged deleted.
pub fn delete_memberships_for_list(conn: &Connection, list_id: ListId) -> RepoResult<usize> {
    Ok(conn.execute("DELETE FROM list_memberships WHERE list_id = ?1;", [list_id])?)
}

/// Stamps `modified` and `deleted` with `now` for one chunk.
pub fn mark_deleted_chunk(conn: &Connection, ids: &[TaskId], now: i64) -> RepoResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "UPDATE tasks SET modified = ?, deleted = ? WHERE id IN ({});",
        placeholders(ids.len())
    );
    let mut bind: Vec<i64> = Vec::with_capacity(ids.len() + 2);
    bind.push(now);
    bind.push(now);
    bind.extend_from_slice(ids);
    Ok(conn.execute(&sql, params_from_iter(bind))?)
}

/// Soft-deleted tasks filed under a list of the local-only account.
pub fn purgeable_task_ids(conn: &Connection) -> RepoResult<Vec<TaskId>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT t.id
         FROM tasks t
         INNER JOIN list_memberships m ON m.task = t.id
         INNER JOIN task_lists l ON l.id = m.list_id
         WHERE l.account_key = ?1
           AND t.deleted > 0
         ORDER BY t.id ASC;",
    )?;
    let ids = stmt
        .query_map([LOCAL_ACCOUNT_KEY], |row| row.get::<_, TaskId>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Queued references, oldest first.
pub fn pending_released(conn: &Connection) -> RepoResult<Vec<ReleasedResource>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, reference, released_task
         FROM released_resources
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get(1)?;
        let kind = ReleasedKind::parse(&kind_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid kind `{kind_text}` in released_resources.kind"
            ))
        })?;
        items.push(ReleasedResource {
            id: row.get(0)?,
            kind,
            reference: row.get(2)?,
            task: row.get(3)?,
        });
    }
    Ok(items)
}

/// Queues one reference for a later release attempt; returns the entry id.
pub fn queue_released(
    conn: &Connection,
    kind: ReleasedKind,
    reference: &str,
    task: TaskId,
) -> RepoResult<i64> {
    conn.execute(
        "INSERT INTO released_resources (kind, reference, released_task) VALUES (?1, ?2, ?3);",
        params![kind.as_str(), reference, task],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn remove_released(conn: &Connection, id: i64) -> RepoResult<()> {
    conn.execute("DELETE FROM released_resources WHERE id = ?1;", params![id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CascadeStep, CASCADE_ORDER};

    #[test]
    fn cascade_order_removes_task_rows_last() {
        assert_eq!(CASCADE_ORDER.last(), Some(&CascadeStep::Tasks));
        assert_eq!(CASCADE_ORDER[0], CascadeStep::Alarms);
        assert_eq!(
            CASCADE_ORDER.iter().map(|step| step.table()).collect::<Vec<_>>(),
            vec![
                "alarms",
                "geofences",
                "tags",
                "list_memberships",
                "attachments",
                "comments",
                "tasks"
            ]
        );
    }
}
