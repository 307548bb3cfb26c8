//! Database schema definitions and creation
//!
//! Three tables back the persistent repository. `id` is the fingerprint's
//! signed 64-bit form. `names` and `tags` carry no uniqueness constraint;
//! duplicate pairs are suppressed by insert-if-absent statements instead.

use crate::error::DbResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Stored objects, one row per fingerprint
const CREATE_OBJECTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
    id INTEGER NOT NULL PRIMARY KEY,
    size INTEGER,
    data BLOB                     -- zlib payload
)
"#;

/// Every path a fingerprint was observed under
const CREATE_NAMES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS names (
    id INTEGER NOT NULL,
    name TEXT
)
"#;

/// Directory segments between scan root and file
const CREATE_TAGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER NOT NULL,
    tag TEXT
)
"#;

/// Running totals that survive reopening the file
const CREATE_REPO_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS repo_info (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
)
"#;

/// Lookup indexes; none of them enforce uniqueness
const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_names_name ON names(name)",
    "CREATE INDEX IF NOT EXISTS idx_names_id ON names(id)",
    "CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag)",
    "CREATE INDEX IF NOT EXISTS idx_tags_id ON tags(id)",
];

/// SQLite pragmas for concurrent readers and durable-enough writes
const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
PRAGMA cache_size = -16000;      -- 16MB cache
"#;

/// Insert a name row unless the exact pair already exists
pub const INSERT_NAME_IF_ABSENT: &str = "INSERT INTO names (id, name)
     SELECT ?1, ?2 WHERE NOT EXISTS (SELECT 1 FROM names WHERE id = ?1 AND name = ?2)";

/// Insert a tag row unless the exact pair already exists
pub const INSERT_TAG_IF_ABSENT: &str = "INSERT INTO tags (id, tag)
     SELECT ?1, ?2 WHERE NOT EXISTS (SELECT 1 FROM tags WHERE id = ?1 AND tag = ?2)";

/// Create tables and indexes if missing; safe to call on every open
pub fn create_database(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(PRAGMAS)?;

    conn.execute(CREATE_OBJECTS_TABLE, [])?;
    conn.execute(CREATE_NAMES_TABLE, [])?;
    conn.execute(CREATE_TAGS_TABLE, [])?;
    conn.execute(CREATE_REPO_INFO_TABLE, [])?;

    create_indexes(conn)?;
    Ok(())
}

/// Create lookup indexes
pub fn create_indexes(conn: &Connection) -> DbResult<()> {
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    Ok(())
}

/// Add `delta` to a running total, creating it at zero if missing
pub fn add_repo_counter(conn: &Connection, key: &str, delta: u64) -> DbResult<()> {
    conn.execute(
        "INSERT INTO repo_info (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = value + excluded.value",
        params![key, delta as i64],
    )?;
    Ok(())
}

/// Read a running total; zero if never written
pub fn get_repo_counter(conn: &Connection, key: &str) -> DbResult<u64> {
    let value: Option<i64> = conn
        .query_row("SELECT value FROM repo_info WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value.unwrap_or(0) as u64)
}

/// Counter keys in `repo_info`
pub mod keys {
    pub const ORIGINAL_SIZE: &str = "original_size";
    pub const COMPRESSED_SIZE: &str = "compressed_size";
}
