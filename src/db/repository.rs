//! SQLite-backed repository
//!
//! The connection is opened and the schema created lazily, exactly once per
//! handle. If that fails the error is kept and every later call fails fast
//! with it until the handle is recreated.
//!
//! The connection and the init state live behind one mutex, so a whole `add`
//! (one transaction) is atomic with respect to every other call on the
//! handle. Adds take the write lock up front (`IMMEDIATE`), so two handles on
//! the same file serialize instead of failing on a stale read snapshot.
//!
//! The size totals are kept in `repo_info` and updated inside the add
//! transaction, so the summary describes the whole file like the counts do.
//!
//! Unlike a plain `INSERT OR IGNORE` into `objects`, `add` re-reads the
//! stored size and rejects a same-fingerprint/different-size pair with the
//! same collision error as the in-memory backend.

use crate::content::{ContentObject, Fingerprint};
use crate::db::schema::{self, keys, INSERT_NAME_IF_ABSENT, INSERT_TAG_IF_ABSENT};
use crate::error::{DbError, DbResult, RepoError, RepoResult};
use crate::repo::{validate_object, RepoSummary, Repository};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// How long an add waits for another handle's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

enum InitState {
    Pending,
    Ready(Connection),
    Failed(String),
}

/// Persistent repository stored in a single SQLite file
pub struct SqliteRepository {
    path: PathBuf,
    state: Mutex<InitState>,
}

impl SqliteRepository {
    /// Create a handle; nothing is opened until the first operation
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(InitState::Pending),
        }
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Force initialization, returning the sticky error if it failed
    pub fn ensure_ready(&self) -> RepoResult<()> {
        self.with_conn(|_| Ok(()))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> RepoResult<T>) -> RepoResult<T> {
        let mut guard = self.state.lock();
        let init = &mut *guard;

        if matches!(init, InitState::Pending) {
            *init = match open_database(&self.path) {
                Ok(conn) => {
                    debug!(path = %self.path.display(), "Opened repository database");
                    InitState::Ready(conn)
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Repository database unavailable"
                    );
                    InitState::Failed(e.to_string())
                }
            };
        }

        match init {
            InitState::Ready(conn) => f(conn),
            InitState::Failed(reason) => Err(RepoError::Database(DbError::InitFailed {
                path: self.path.clone(),
                reason: reason.clone(),
            })),
            InitState::Pending => Err(RepoError::Database(DbError::InitFailed {
                path: self.path.clone(),
                reason: "database was never opened".into(),
            })),
        }
    }
}

fn open_database(path: &Path) -> DbResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    schema::create_database(&conn)?;
    Ok(conn)
}

fn load_strings(conn: &Connection, sql: &str, id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map([id], |row| row.get(0))?;
    rows.collect()
}

fn load_object(conn: &Connection, fingerprint: Fingerprint) -> RepoResult<Option<ContentObject>> {
    let id = fingerprint.as_i64();
    let row: Option<(i64, Vec<u8>)> = conn
        .query_row(
            "SELECT size, data FROM objects WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((size, data)) = row else {
        return Ok(None);
    };

    let mut object = ContentObject::new(fingerprint, size as u64, data);
    for name in load_strings(conn, "SELECT DISTINCT name FROM names WHERE id = ?1", id)? {
        object.add_name(name);
    }
    for tag in load_strings(conn, "SELECT DISTINCT tag FROM tags WHERE id = ?1", id)? {
        object.add_tag(tag);
    }
    Ok(Some(object))
}

fn load_indexed(conn: &Connection, sql: &str, key: &str) -> RepoResult<Vec<ContentObject>> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map([key], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let mut objects = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(object) = load_object(conn, Fingerprint::from_i64(id))? {
            objects.push(object);
        }
    }
    objects.sort_by_key(|o| o.fingerprint());
    Ok(objects)
}

fn count(conn: &Connection, sql: &str) -> RepoResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

impl Repository for SqliteRepository {
    fn add_file(&self, path: &Path, root: &Path) -> RepoResult<()> {
        // Fail before reading the file if the database is unusable
        self.ensure_ready()?;
        let object = ContentObject::from_file(path, root)?;
        self.add(object)
    }

    fn add(&self, object: ContentObject) -> RepoResult<()> {
        validate_object(&object)?;

        self.with_conn(|conn| {
            let fingerprint = object.fingerprint();
            let id = fingerprint.as_i64();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let stored_size: Option<i64> = tx
                .query_row("SELECT size FROM objects WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;

            let inserted = match stored_size {
                Some(size) if size as u64 != object.size() => {
                    let existing = load_strings(
                        &tx,
                        "SELECT DISTINCT name FROM names WHERE id = ?1 ORDER BY name",
                        id,
                    )?;
                    // Dropping tx rolls back
                    return Err(RepoError::Collision {
                        fingerprint,
                        existing,
                        incoming: object.names().iter().cloned().collect(),
                    });
                }
                Some(_) => false,
                None => {
                    tx.execute(
                        "INSERT INTO objects (id, size, data) VALUES (?1, ?2, ?3)",
                        params![id, object.size() as i64, object.payload()],
                    )?;
                    true
                }
            };

            {
                let mut stmt = tx.prepare_cached(INSERT_NAME_IF_ABSENT)?;
                for name in object.names() {
                    stmt.execute(params![id, name])?;
                }

                let mut stmt = tx.prepare_cached(INSERT_TAG_IF_ABSENT)?;
                for tag in object.tags() {
                    stmt.execute(params![id, tag])?;
                }
            }

            schema::add_repo_counter(&tx, keys::ORIGINAL_SIZE, object.size())?;
            if inserted {
                schema::add_repo_counter(&tx, keys::COMPRESSED_SIZE, object.compressed_size())?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    fn remove(&self, fingerprint: Fingerprint) -> RepoResult<()> {
        self.with_conn(|conn| {
            let id = fingerprint.as_i64();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM objects WHERE id = ?1", [id])?;
            tx.execute("DELETE FROM names WHERE id = ?1", [id])?;
            tx.execute("DELETE FROM tags WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    fn object(&self, fingerprint: Fingerprint) -> RepoResult<Option<ContentObject>> {
        self.with_conn(|conn| load_object(conn, fingerprint))
    }

    fn all_names(&self) -> RepoResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT DISTINCT name FROM names ORDER BY name")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            Ok(rows.collect::<rusqlite::Result<_>>()?)
        })
    }

    fn all_tags(&self) -> RepoResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT DISTINCT tag FROM tags ORDER BY tag")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            Ok(rows.collect::<rusqlite::Result<_>>()?)
        })
    }

    fn objects_by_name(&self, name: &str) -> RepoResult<Vec<ContentObject>> {
        self.with_conn(|conn| {
            load_indexed(conn, "SELECT DISTINCT id FROM names WHERE name = ?1", name)
        })
    }

    fn objects_by_tag(&self, tag: &str) -> RepoResult<Vec<ContentObject>> {
        self.with_conn(|conn| {
            load_indexed(conn, "SELECT DISTINCT id FROM tags WHERE tag = ?1", tag)
        })
    }

    fn summary(&self) -> RepoResult<RepoSummary> {
        self.with_conn(|conn| {
            Ok(RepoSummary {
                objects: count(conn, "SELECT COUNT(*) FROM objects")?,
                names: count(conn, "SELECT COUNT(DISTINCT name) FROM names")?,
                tags: count(conn, "SELECT COUNT(DISTINCT tag) FROM tags")?,
                original_size: schema::get_repo_counter(conn, keys::ORIGINAL_SIZE)?,
                compressed_size: schema::get_repo_counter(conn, keys::COMPRESSED_SIZE)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::encode;
    use tempfile::tempdir;

    fn object(content: &[u8], name: &str, tags: &[&str]) -> ContentObject {
        let encoded = encode(content).unwrap();
        let tags = tags.iter().map(|t| t.to_string()).collect();
        ContentObject::from_encoded(encoded, name, tags)
    }

    #[test]
    fn test_add_and_query() {
        let repo = SqliteRepository::new(":memory:");
        let obj = object(b"payload bytes", "/r/a/b/file.bin", &["a", "b"]);
        let fp = obj.fingerprint();

        repo.add(obj.clone()).unwrap();

        assert_eq!(repo.object(fp).unwrap(), Some(obj.clone()));
        assert_eq!(repo.all_names().unwrap(), vec!["/r/a/b/file.bin".to_string()]);
        assert_eq!(repo.all_tags().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(repo.objects_by_tag("b").unwrap(), vec![obj]);
        assert!(repo.objects_by_name("/nope").unwrap().is_empty());
    }

    #[test]
    fn test_merge_suppresses_duplicate_rows() {
        let repo = SqliteRepository::new(":memory:");
        let first = object(b"dup", "/r/x/one", &["x"]);
        let compressed = first.compressed_size();

        repo.add(first.clone()).unwrap();
        repo.add(first).unwrap();
        repo.add(object(b"dup", "/r/y/two", &["y"])).unwrap();

        let summary = repo.summary().unwrap();
        assert_eq!(summary.objects, 1);
        assert_eq!(summary.names, 2);
        assert_eq!(summary.tags, 2);
        assert_eq!(summary.original_size, 9);
        assert_eq!(summary.compressed_size, compressed);

        let stored = repo.objects_by_name("/r/y/two").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].names().len(), 2);
    }

    #[test]
    fn test_collision_parity_with_memory() {
        let repo = SqliteRepository::new(":memory:");
        let fp = Fingerprint::new(u64::MAX);
        repo.add(ContentObject::new(fp, 3, vec![1, 2, 3]).with_name("/r/first"))
            .unwrap();

        let err = repo
            .add(ContentObject::new(fp, 4, vec![9]).with_name("/r/second").with_tag("late"))
            .unwrap_err();
        assert!(err.is_collision());

        // Rolled back: nothing from the rejected object is visible
        assert_eq!(repo.all_names().unwrap(), vec!["/r/first".to_string()]);
        assert!(repo.all_tags().unwrap().is_empty());
        assert_eq!(repo.object(fp).unwrap().unwrap().size(), 3);
        assert_eq!(repo.summary().unwrap().original_size, 3);
    }

    #[test]
    fn test_remove() {
        let repo = SqliteRepository::new(":memory:");
        let obj = object(b"gone soon", "/r/t/gone", &["t"]);
        let fp = obj.fingerprint();
        repo.add(obj).unwrap();

        repo.remove(fp).unwrap();
        assert!(repo.object(fp).unwrap().is_none());
        assert!(repo.all_names().unwrap().is_empty());
        assert!(repo.all_tags().unwrap().is_empty());

        repo.remove(fp).unwrap();
    }

    #[test]
    fn test_sticky_init_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("repo.db");
        let repo = SqliteRepository::new(&path);

        let first = repo.all_names().unwrap_err();
        let second = repo
            .add(object(b"x", "/r/x", &[]))
            .unwrap_err();

        assert!(matches!(first, RepoError::Database(DbError::InitFailed { .. })));
        assert_eq!(first.to_string(), second.to_string());

        // Fails fast without touching the (nonexistent) file
        let third = repo
            .add_file(&dir.path().join("no-such-file"), dir.path())
            .unwrap_err();
        assert!(matches!(third, RepoError::Database(DbError::InitFailed { .. })));

        // Creating the directory does not heal an existing handle
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        assert!(repo.summary().is_err());
        assert!(SqliteRepository::new(&path).summary().is_ok());
    }

    #[test]
    fn test_persists_across_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo.db");
        let obj = object(b"durable", "/r/keep/me", &["keep"]);
        let fp = obj.fingerprint();
        let compressed = obj.compressed_size();

        {
            let repo = SqliteRepository::new(&path);
            repo.add(obj).unwrap();
        }

        let reopened = SqliteRepository::new(&path);
        let stored = reopened.object(fp).unwrap().unwrap();
        assert_eq!(stored.decode().unwrap(), b"durable");
        assert_eq!(reopened.all_tags().unwrap(), vec!["keep".to_string()]);

        // Size totals describe the file, not the handle
        let summary = reopened.summary().unwrap();
        assert_eq!(summary.objects, 1);
        assert_eq!(summary.original_size, 7);
        assert_eq!(summary.compressed_size, compressed);
        assert!(!summary.ratio().is_nan());

        reopened.add(object(b"durable", "/r/again/me", &[])).unwrap();
        let summary = reopened.summary().unwrap();
        assert_eq!(summary.original_size, 14);
        assert_eq!(summary.compressed_size, compressed);
    }

    #[test]
    fn test_two_handles_write_one_file() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let handles: Vec<Arc<SqliteRepository>> =
            (0..2).map(|_| Arc::new(SqliteRepository::new(&path))).collect();
        for handle in &handles {
            handle.ensure_ready().unwrap();
        }

        let workers: Vec<_> = handles
            .iter()
            .enumerate()
            .map(|(i, repo)| {
                let repo = Arc::clone(repo);
                thread::spawn(move || {
                    for j in 0..40 {
                        let content = format!("shared-{}", j % 8);
                        let name = format!("/r/h{i}/f{j}");
                        repo.add(object(content.as_bytes(), &name, &[])).unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        let summary = handles[0].summary().unwrap();
        assert_eq!(summary.objects, 8);
        assert_eq!(summary.names, 80);
        assert_eq!(summary, handles[1].summary().unwrap());
    }
}
