//! Backend registry
//!
//! Maps a backend name to a zero-argument constructor. The registry is an
//! explicit object built once at startup and passed by reference; the
//! built-in backends are installed behind a single-use latch on first use,
//! so racing `register`/`create` calls can never observe a half-built map.

use crate::db::SqliteRepository;
use crate::repo::{MemoryRepository, Repository};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing::debug;

/// Name of the in-memory backend
pub const MEMORY_BACKEND: &str = "memory";

/// Name of the SQLite backend
pub const SQLITE_BACKEND: &str = "sqlite";

/// Constructor producing a fresh repository handle
pub type BackendConstructor = Arc<dyn Fn() -> Arc<dyn Repository> + Send + Sync>;

/// Name → constructor table
pub struct BackendRegistry {
    builtins: Once,
    db_path: PathBuf,
    constructors: Mutex<HashMap<String, BackendConstructor>>,
}

impl BackendRegistry {
    /// Create a registry whose `sqlite` backend opens `db_path`
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            builtins: Once::new(),
            db_path: db_path.into(),
            constructors: Mutex::new(HashMap::new()),
        }
    }

    /// Database path handed to the `sqlite` constructor
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Register a constructor; the last registration for a name wins
    pub fn register(&self, name: impl Into<String>, constructor: BackendConstructor) {
        self.ensure_builtins();
        let name = name.into();
        debug!(backend = %name, "Registering backend");
        self.constructors.lock().insert(name, constructor);
    }

    /// Build a backend by name; `None` if the name is unknown
    pub fn create(&self, name: &str) -> Option<Arc<dyn Repository>> {
        self.ensure_builtins();
        // Clone out so the constructor runs without holding the lock
        let constructor = self.constructors.lock().get(name).cloned()?;
        Some(constructor())
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<String> {
        self.ensure_builtins();
        let mut names: Vec<String> = self.constructors.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn ensure_builtins(&self) {
        self.builtins.call_once(|| {
            let mut constructors = self.constructors.lock();

            let memory: BackendConstructor =
                Arc::new(|| Arc::new(MemoryRepository::new()) as Arc<dyn Repository>);
            constructors.insert(MEMORY_BACKEND.to_string(), memory);

            let db_path = self.db_path.clone();
            let sqlite: BackendConstructor = Arc::new(move || {
                Arc::new(SqliteRepository::new(db_path.clone())) as Arc<dyn Repository>
            });
            constructors.insert(SQLITE_BACKEND.to_string(), sqlite);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentObject;
    use crate::content::Fingerprint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_builtins_registered() {
        let registry = BackendRegistry::new(":memory:");
        assert_eq!(
            registry.names(),
            vec![MEMORY_BACKEND.to_string(), SQLITE_BACKEND.to_string()]
        );
        assert!(registry.create(MEMORY_BACKEND).is_some());
        assert!(registry.create(SQLITE_BACKEND).is_some());
    }

    #[test]
    fn test_unknown_backend_is_none() {
        let registry = BackendRegistry::new(":memory:");
        assert!(registry.create("postgres").is_none());
    }

    #[test]
    fn test_create_returns_fresh_handles() {
        let registry = BackendRegistry::new(":memory:");
        let a = registry.create(MEMORY_BACKEND).unwrap();
        let b = registry.create(MEMORY_BACKEND).unwrap();

        a.add(ContentObject::new(Fingerprint::new(1), 1, vec![0]).with_name("x"))
            .unwrap();
        assert_eq!(a.summary().unwrap().objects, 1);
        assert_eq!(b.summary().unwrap().objects, 0);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = BackendRegistry::new(":memory:");
        let calls = Arc::new(AtomicUsize::new(0));

        let first_calls = Arc::clone(&calls);
        registry.register(
            "custom",
            Arc::new(move || {
                first_calls.fetch_add(1, Ordering::SeqCst);
                Arc::new(MemoryRepository::new()) as Arc<dyn Repository>
            }),
        );
        let second_calls = Arc::clone(&calls);
        registry.register(
            "custom",
            Arc::new(move || {
                second_calls.fetch_add(100, Ordering::SeqCst);
                Arc::new(MemoryRepository::new()) as Arc<dyn Repository>
            }),
        );

        registry.create("custom").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_override_builtin_before_first_use() {
        let registry = BackendRegistry::new(":memory:");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register(
            SQLITE_BACKEND,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(MemoryRepository::new()) as Arc<dyn Repository>
            }),
        );

        registry.create(SQLITE_BACKEND).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use() {
        let registry = Arc::new(BackendRegistry::new(":memory:"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        registry.register(
                            format!("extra-{i}"),
                            Arc::new(|| Arc::new(MemoryRepository::new()) as Arc<dyn Repository>),
                        );
                    }
                    registry.create(MEMORY_BACKEND).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(registry.names().len(), 2 + 4);
    }
}
