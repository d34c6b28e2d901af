//! Account and list persistence.
//!
//! # Invariants
//! - `(account_key, remote_id)` is unique; inserts that collide fail with a
//!   constraint error instead of silently replacing the row.
//! - Renames never touch `id`, `remote_id` or `last_sync`.

use super::{ensure_connection_ready, RepoError, RepoResult};
use crate::model::account::{Account, AccountKind};
use crate::model::task_list::{ListId, TaskList};
use rusqlite::{params, Connection, OptionalExtension, Row};

const LIST_SELECT_SQL: &str = "SELECT
    id,
    account_key,
    remote_id,
    title,
    last_sync
FROM task_lists";

/// Repository interface for accounts and their lists.
pub trait ListRepository {
    fn create_account(&self, account: &Account) -> RepoResult<()>;
    fn get_account(&self, key: &str) -> RepoResult<Option<Account>>;
    fn list_accounts(&self) -> RepoResult<Vec<Account>>;
    fn delete_account_row(&self, key: &str) -> RepoResult<()>;
    /// All lists owned by `account_key`, ordered by title.
    fn lists_for_account(&self, account_key: &str) -> RepoResult<Vec<TaskList>>;
    fn get_list(&self, id: ListId) -> RepoResult<Option<TaskList>>;
    fn get_list_by_remote_id(&self, account_key: &str, remote_id: &str)
        -> RepoResult<Option<TaskList>>;
    /// Inserts a list and returns its freshly assigned surrogate id.
    fn insert_list(
        &self,
        account_key: &str,
        remote_id: &str,
        title: &str,
        last_sync: i64,
    ) -> RepoResult<ListId>;
    fn rename_list(&self, id: ListId, title: &str) -> RepoResult<()>;
    fn set_last_sync(&self, id: ListId, last_sync: i64) -> RepoResult<()>;
    fn delete_list_row(&self, id: ListId) -> RepoResult<()>;
}

/// SQLite-backed list repository.
pub struct SqliteListRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteListRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection already known to be migrated.
    pub(crate) fn unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ListRepository for SqliteListRepository<'_> {
    fn create_account(&self, account: &Account) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO accounts (account_key, display_name, provider) VALUES (?1, ?2, ?3);",
            params![account.key, account.display_name, account.kind.as_str()],
        )?;
        Ok(())
    }

    fn get_account(&self, key: &str) -> RepoResult<Option<Account>> {
        self.conn
            .query_row(
                "SELECT account_key, display_name, provider FROM accounts WHERE account_key = ?1;",
                [key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
            .map(|(key, display_name, provider)| parse_account(key, display_name, &provider))
            .transpose()
    }

    fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_key, display_name, provider FROM accounts ORDER BY account_key ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            let provider: String = row.get(2)?;
            accounts.push(parse_account(row.get(0)?, row.get(1)?, &provider)?);
        }
        Ok(accounts)
    }

    fn delete_account_row(&self, key: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM accounts WHERE account_key = ?1;", [key])?;
        if changed == 0 {
            return Err(RepoError::AccountNotFound(key.to_string()));
        }
        Ok(())
    }

    fn lists_for_account(&self, account_key: &str) -> RepoResult<Vec<TaskList>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LIST_SELECT_SQL} WHERE account_key = ?1 ORDER BY title ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([account_key])?;
        let mut lists = Vec::new();
        while let Some(row) = rows.next()? {
            lists.push(parse_list_row(row)?);
        }
        Ok(lists)
    }

    fn get_list(&self, id: ListId) -> RepoResult<Option<TaskList>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LIST_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_list_row(row)?));
        }
        Ok(None)
    }

    fn get_list_by_remote_id(
        &self,
        account_key: &str,
        remote_id: &str,
    ) -> RepoResult<Option<TaskList>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LIST_SELECT_SQL} WHERE account_key = ?1 AND remote_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![account_key, remote_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_list_row(row)?));
        }
        Ok(None)
    }

    fn insert_list(
        &self,
        account_key: &str,
        remote_id: &str,
        title: &str,
        last_sync: i64,
    ) -> RepoResult<ListId> {
        self.conn.execute(
            "INSERT INTO task_lists (account_key, remote_id, title, last_sync)
             VALUES (?1, ?2, ?3, ?4);",
            params![account_key, remote_id, title, last_sync],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn rename_list(&self, id: ListId, title: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE task_lists SET title = ?2 WHERE id = ?1;",
            params![id, title],
        )?;
        if changed == 0 {
            return Err(RepoError::ListNotFound(id));
        }
        Ok(())
    }

    fn set_last_sync(&self, id: ListId, last_sync: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE task_lists SET last_sync = ?2 WHERE id = ?1;",
            params![id, last_sync],
        )?;
        if changed == 0 {
            return Err(RepoError::ListNotFound(id));
        }
        Ok(())
    }

    fn delete_list_row(&self, id: ListId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM task_lists WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::ListNotFound(id));
        }
        Ok(())
    }
}

fn parse_account(key: String, display_name: String, provider: &str) -> RepoResult<Account> {
    let kind = AccountKind::parse(provider).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid provider `{provider}` in accounts.provider"))
    })?;
    Ok(Account {
        key,
        display_name,
        kind,
    })
}

fn parse_list_row(row: &Row<'_>) -> RepoResult<TaskList> {
    Ok(TaskList {
        id: row.get("id")?,
        account_key: row.get("account_key")?,
        remote_id: row.get("remote_id")?,
        title: row.get("title")?,
        last_sync: row.get("last_sync")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{ListRepository, SqliteListRepository};
    use crate::db::open_db_in_memory;
    use crate::model::account::{Account, AccountKind, LOCAL_ACCOUNT_KEY};
    use crate::repo::RepoError;

    #[test]
    fn accounts_are_listed_with_the_seeded_local_one() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteListRepository::try_new(&conn).unwrap();
        repo.create_account(&Account::new("dav", "Work", AccountKind::Caldav))
            .unwrap();

        let keys: Vec<String> = repo
            .list_accounts()
            .unwrap()
            .into_iter()
            .map(|account| account.key)
            .collect();
        assert_eq!(keys, vec!["dav".to_string(), LOCAL_ACCOUNT_KEY.to_string()]);
        assert!(repo.get_account(LOCAL_ACCOUNT_KEY).unwrap().unwrap().is_local());
    }

    #[test]
    fn rename_and_sync_stamp_keep_identity() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteListRepository::try_new(&conn).unwrap();
        let id = repo.insert_list(LOCAL_ACCOUNT_KEY, "inbox", "Inbox", 0).unwrap();

        repo.rename_list(id, "Today").unwrap();
        repo.set_last_sync(id, 99).unwrap();

        let list = repo
            .get_list_by_remote_id(LOCAL_ACCOUNT_KEY, "inbox")
            .unwrap()
            .unwrap();
        assert_eq!(list.id, id);
        assert_eq!(list.title, "Today");
        assert_eq!(list.last_sync, 99);
    }

    #[test]
    fn duplicate_remote_id_in_one_account_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteListRepository::try_new(&conn).unwrap();
        repo.insert_list(LOCAL_ACCOUNT_KEY, "inbox", "Inbox", 0).unwrap();

        assert!(repo.insert_list(LOCAL_ACCOUNT_KEY, "inbox", "Again", 0).is_err());
    }

    #[test]
    fn missing_rows_report_not_found() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteListRepository::try_new(&conn).unwrap();

        assert!(matches!(repo.rename_list(42, "x"), Err(RepoError::ListNotFound(42))));
        assert!(matches!(repo.delete_list_row(42), Err(RepoError::ListNotFound(42))));
        assert!(matches!(
            repo.delete_account_row("ghost"),
            Err(RepoError::AccountNotFound(key)) if key == "ghost"
        ));
        assert!(repo.get_list(42).unwrap().is_none());
    }
}
