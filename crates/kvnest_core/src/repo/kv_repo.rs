//! Entry/sub-entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the storage primitives the store composes into operations.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Writes are upserts that update rows in place; they never delete and
//!   reinsert, so overwriting an entry keeps its sub-entries and
//!   `created_at`.
//! - Read paths surface undecodable stored text as errors instead of
//!   masking it.

use crate::codec::{deserialize, serialize, CodecError};
use crate::db::DbError;
use crate::model::entry::{Entry, SubEntry};
use crate::model::value::{JsonMap, JsonValue};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ENTRY_SELECT_SQL: &str = "SELECT key, value, created_at, updated_at FROM entries";
const SUB_ENTRY_SELECT_SQL: &str =
    "SELECT parent_key, subkey, subvalue, created_at, updated_at FROM sub_entries";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entry persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Codec(CodecError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<CodecError> for RepoError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage primitives over the `entries` and `sub_entries` tables.
pub trait KvRepository {
    fn upsert_entry(&self, key: &str, value: &JsonValue) -> RepoResult<()>;
    /// Inserts an empty-object entry for `key` unless one exists.
    /// Returns whether a row was created.
    fn ensure_entry(&self, key: &str) -> RepoResult<bool>;
    fn upsert_sub_entry(&self, parent_key: &str, subkey: &str, value: &JsonValue)
        -> RepoResult<()>;
    fn get_entry(&self, key: &str) -> RepoResult<Option<Entry>>;
    fn get_sub_entry(&self, parent_key: &str, subkey: &str) -> RepoResult<Option<SubEntry>>;
    fn list_sub_values(&self, parent_key: &str) -> RepoResult<JsonMap>;
    fn list_entries(&self) -> RepoResult<Vec<Entry>>;
    /// All sub-entries in insertion order.
    fn list_sub_entries(&self) -> RepoResult<Vec<SubEntry>>;
    fn delete_entry(&self, key: &str) -> RepoResult<usize>;
    fn delete_sub_entry(&self, parent_key: &str, subkey: &str) -> RepoResult<usize>;
    fn delete_sub_entries(&self, parent_key: &str) -> RepoResult<usize>;
    fn entry_exists(&self, key: &str) -> RepoResult<bool>;
    fn sub_entry_exists(&self, parent_key: &str, subkey: &str) -> RepoResult<bool>;
    fn count_entries(&self) -> RepoResult<u64>;
    fn count_sub_entries(&self) -> RepoResult<u64>;
}

/// SQLite-backed entry repository.
///
/// Borrows a connection (or a transaction, which derefs to one) so the
/// caller controls its lifetime and commit boundary.
pub struct SqliteKvRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKvRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl KvRepository for SqliteKvRepository<'_> {
    fn upsert_entry(&self, key: &str, value: &JsonValue) -> RepoResult<()> {
        let encoded = serialize(value)?;
        self.conn.execute(
            "INSERT INTO entries (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000);",
            params![key, encoded],
        )?;
        Ok(())
    }

    fn ensure_entry(&self, key: &str) -> RepoResult<bool> {
        let encoded = serialize(&JsonValue::empty_object())?;
        let inserted = self.conn.execute(
            "INSERT INTO entries (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO NOTHING;",
            params![key, encoded],
        )?;
        Ok(inserted > 0)
    }

    fn upsert_sub_entry(
        &self,
        parent_key: &str,
        subkey: &str,
        value: &JsonValue,
    ) -> RepoResult<()> {
        let encoded = serialize(value)?;
        self.conn.execute(
            "INSERT INTO sub_entries (parent_key, subkey, subvalue) VALUES (?1, ?2, ?3)
             ON CONFLICT (parent_key, subkey) DO UPDATE SET
                subvalue = excluded.subvalue,
                updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000);",
            params![parent_key, subkey, encoded],
        )?;
        Ok(())
    }

    fn get_entry(&self, key: &str) -> RepoResult<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE key = ?1;"))?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }

        Ok(None)
    }

    fn get_sub_entry(&self, parent_key: &str, subkey: &str) -> RepoResult<Option<SubEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SUB_ENTRY_SELECT_SQL} WHERE parent_key = ?1 AND subkey = ?2;"
        ))?;
        let mut rows = stmt.query([parent_key, subkey])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_sub_entry_row(row)?));
        }

        Ok(None)
    }

    fn list_sub_values(&self, parent_key: &str) -> RepoResult<JsonMap> {
        let mut stmt = self.conn.prepare(
            "SELECT subkey, subvalue FROM sub_entries WHERE parent_key = ?1 ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([parent_key])?;
        let mut values = JsonMap::new();

        while let Some(row) = rows.next()? {
            let subkey: String = row.get("subkey")?;
            let raw: Option<String> = row.get("subvalue")?;
            values.insert(subkey, deserialize(raw.as_deref())?);
        }

        Ok(values)
    }

    fn list_entries(&self) -> RepoResult<Vec<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }

        Ok(entries)
    }

    fn list_sub_entries(&self) -> RepoResult<Vec<SubEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SUB_ENTRY_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut sub_entries = Vec::new();

        while let Some(row) = rows.next()? {
            sub_entries.push(parse_sub_entry_row(row)?);
        }

        Ok(sub_entries)
    }

    fn delete_entry(&self, key: &str) -> RepoResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM entries WHERE key = ?1;", [key])?)
    }

    fn delete_sub_entry(&self, parent_key: &str, subkey: &str) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM sub_entries WHERE parent_key = ?1 AND subkey = ?2;",
            [parent_key, subkey],
        )?)
    }

    fn delete_sub_entries(&self, parent_key: &str) -> RepoResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM sub_entries WHERE parent_key = ?1;",
            [parent_key],
        )?)
    }

    fn entry_exists(&self, key: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entries WHERE key = ?1);",
            [key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn sub_entry_exists(&self, parent_key: &str, subkey: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sub_entries WHERE parent_key = ?1 AND subkey = ?2
            );",
            [parent_key, subkey],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn count_entries(&self) -> RepoResult<u64> {
        count_rows(self.conn, "SELECT COUNT(*) FROM entries;", "entries")
    }

    fn count_sub_entries(&self) -> RepoResult<u64> {
        count_rows(self.conn, "SELECT COUNT(*) FROM sub_entries;", "sub_entries")
    }
}

fn count_rows(conn: &Connection, sql: &str, table: &str) -> RepoResult<u64> {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    u64::try_from(count)
        .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}` for {table}")))
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<Entry> {
    let key: String = row.get("key")?;
    let raw: Option<String> = row.get("value")?;

    Ok(Entry {
        value: deserialize(raw.as_deref())?,
        key,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_sub_entry_row(row: &Row<'_>) -> RepoResult<SubEntry> {
    let raw: Option<String> = row.get("subvalue")?;

    Ok(SubEntry {
        parent_key: row.get("parent_key")?,
        subkey: row.get("subkey")?,
        subvalue: deserialize(raw.as_deref())?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{KvRepository, RepoError, SqliteKvRepository};
    use crate::db::ensure_schema;
    use crate::model::value::JsonValue;
    use rusqlite::Connection;

    fn schema_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        ensure_schema(&mut conn).unwrap();
        conn
    }

    #[test]
    fn overwriting_entry_keeps_sub_entries() {
        let conn = schema_conn();
        let repo = SqliteKvRepository::new(&conn);

        repo.ensure_entry("p").unwrap();
        repo.upsert_sub_entry("p", "s", &JsonValue::from(1)).unwrap();
        repo.upsert_entry("p", &JsonValue::from("scalar")).unwrap();

        assert!(repo.sub_entry_exists("p", "s").unwrap());
        assert_eq!(repo.count_entries().unwrap(), 1);
    }

    #[test]
    fn ensure_entry_reports_creation_once() {
        let conn = schema_conn();
        let repo = SqliteKvRepository::new(&conn);

        assert!(repo.ensure_entry("p").unwrap());
        assert!(!repo.ensure_entry("p").unwrap());
        let entry = repo.get_entry("p").unwrap().unwrap();
        assert_eq!(entry.value, JsonValue::empty_object());
    }

    #[test]
    fn ensure_entry_does_not_clobber_existing_value() {
        let conn = schema_conn();
        let repo = SqliteKvRepository::new(&conn);

        repo.upsert_entry("p", &JsonValue::from(9)).unwrap();
        repo.ensure_entry("p").unwrap();

        assert_eq!(repo.get_entry("p").unwrap().unwrap().value, JsonValue::from(9));
    }

    #[test]
    fn sub_entry_without_parent_violates_foreign_key() {
        let conn = schema_conn();
        let repo = SqliteKvRepository::new(&conn);

        let err = repo
            .upsert_sub_entry("orphan", "s", &JsonValue::Null)
            .unwrap_err();
        assert!(matches!(err, RepoError::Db(_)));
    }

    #[test]
    fn deleting_entry_cascades_to_sub_entries() {
        let conn = schema_conn();
        let repo = SqliteKvRepository::new(&conn);

        repo.ensure_entry("p").unwrap();
        repo.upsert_sub_entry("p", "a", &JsonValue::from(1)).unwrap();
        repo.upsert_sub_entry("p", "b", &JsonValue::from(2)).unwrap();

        assert_eq!(repo.delete_entry("p").unwrap(), 1);
        assert_eq!(repo.count_sub_entries().unwrap(), 0);
    }

    #[test]
    fn undecodable_stored_value_is_reported() {
        let conn = schema_conn();
        conn.execute(
            "INSERT INTO entries (key, value) VALUES ('broken', '{oops');",
            [],
        )
        .unwrap();
        let repo = SqliteKvRepository::new(&conn);

        let err = repo.get_entry("broken").unwrap_err();
        assert!(matches!(err, RepoError::Codec(_)));
    }

    #[test]
    fn null_column_reads_as_null_value() {
        let conn = schema_conn();
        conn.execute("INSERT INTO entries (key, value) VALUES ('n', NULL);", [])
            .unwrap();
        let repo = SqliteKvRepository::new(&conn);

        assert_eq!(repo.get_entry("n").unwrap().unwrap().value, JsonValue::Null);
    }

    #[test]
    fn list_sub_values_is_scoped_to_parent() {
        let conn = schema_conn();
        let repo = SqliteKvRepository::new(&conn);

        repo.ensure_entry("a").unwrap();
        repo.ensure_entry("b").unwrap();
        repo.upsert_sub_entry("a", "x", &JsonValue::from(1)).unwrap();
        repo.upsert_sub_entry("b", "y", &JsonValue::from(2)).unwrap();

        let values = repo.list_sub_values("a").unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("x"), Some(&JsonValue::from(1)));
    }
}
