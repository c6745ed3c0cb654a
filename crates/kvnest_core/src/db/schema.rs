//! Table definitions for the two storage tiers.
//!
//! # Invariants
//! - `(parent_key, subkey)` is unique in `sub_entries`.
//! - Deleting an `entries` row cascades to its `sub_entries`.
//! - Timestamps are unix epoch milliseconds.

use super::DbResult;
use rusqlite::Connection;

pub const ENTRIES_TABLE: &str = "entries";
pub const SUB_ENTRIES_TABLE: &str = "sub_entries";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    value TEXT,
    created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000),
    updated_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
);

CREATE TABLE IF NOT EXISTS sub_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_key TEXT NOT NULL,
    subkey TEXT NOT NULL,
    subvalue TEXT,
    created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000),
    updated_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000),
    FOREIGN KEY (parent_key) REFERENCES entries (key) ON DELETE CASCADE,
    UNIQUE (parent_key, subkey)
);
";

/// Creates both tables if they do not exist yet, atomically.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    tx.commit()?;
    Ok(())
}
