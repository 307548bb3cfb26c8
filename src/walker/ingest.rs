//! Concurrent ingestion pipeline
//!
//! Every valid root gets one walker thread. Walkers feed regular files to the
//! shared repository and report each outcome through an [`EventSink`]. The
//! repository's own lock is the only coordination between them.
//!
//! ```text
//!   roots ──► validate ──► walker-0 ─┐
//!                      ──► walker-1 ─┼──► Repository::add_file (locked)
//!                      ──► walker-N ─┘          │
//!                             │                 ▼
//!                             └──────► EventSink (LOG / ERR)
//! ```

use crate::config::is_excluded;
use crate::content::clean_path;
use crate::error::{IngestError, WorkerError};
use crate::repo::Repository;
use crate::walker::sink::EventSink;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Per-worker counters
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Files accepted by the repository
    pub files_added: AtomicU64,

    /// Entries that failed (walk, I/O, codec, collision)
    pub files_failed: AtomicU64,

    /// Entries pruned by an exclusion
    pub entries_excluded: AtomicU64,

    /// Symlinks and special files left alone
    pub entries_skipped: AtomicU64,
}

impl WorkerStats {
    fn record_added(&self) {
        self.files_added.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_excluded(&self) {
        self.entries_excluded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.entries_skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Aggregate result of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub roots_walked: u64,
    pub roots_failed: u64,
    pub files_added: u64,
    pub files_failed: u64,
    pub entries_excluded: u64,
    pub entries_skipped: u64,
    pub duration: Duration,
}

impl IngestStats {
    fn absorb(&mut self, worker: &WorkerStats) {
        self.files_added += worker.files_added.load(Ordering::Relaxed);
        self.files_failed += worker.files_failed.load(Ordering::Relaxed);
        self.entries_excluded += worker.entries_excluded.load(Ordering::Relaxed);
        self.entries_skipped += worker.entries_skipped.load(Ordering::Relaxed);
    }
}

struct Walker {
    root: PathBuf,
    handle: JoinHandle<()>,
    stats: Arc<WorkerStats>,
}

/// Walks roots into a repository
pub struct Ingestor {
    repo: Arc<dyn Repository>,
    excludes: Arc<Vec<String>>,
}

impl Ingestor {
    pub fn new(repo: Arc<dyn Repository>, excludes: Vec<String>) -> Self {
        Self {
            repo,
            excludes: Arc::new(excludes),
        }
    }

    /// Walk every root concurrently and block until all walkers are done
    ///
    /// Root and file failures are reported through `sink` and never abort
    /// the run. `sink` is dropped on return, along with every clone handed
    /// to a walker.
    pub fn run<S>(&self, roots: &[PathBuf], sink: S) -> IngestStats
    where
        S: EventSink + Clone + 'static,
    {
        let start = Instant::now();
        let mut stats = IngestStats::default();
        info!(roots = roots.len(), excludes = self.excludes.len(), "Starting ingestion");

        let mut walkers = Vec::with_capacity(roots.len());
        for (id, root) in roots.iter().enumerate() {
            if let Err(e) = validate_root(root) {
                warn!(root = %root.display(), error = %e, "Skipping root");
                sink.error(e.to_string());
                stats.roots_failed += 1;
                continue;
            }

            match self.spawn_walker(id, root.clone(), sink.clone()) {
                Ok(walker) => walkers.push(walker),
                Err(e) => {
                    sink.error(e.to_string());
                    stats.roots_failed += 1;
                }
            }
        }

        for walker in walkers {
            match walker.handle.join() {
                Ok(()) => stats.roots_walked += 1,
                Err(_) => {
                    let e = WorkerError::Panicked { root: walker.root };
                    warn!("{}", e);
                    sink.error(e.to_string());
                    stats.roots_failed += 1;
                }
            }
            // Whatever a panicked walker managed to record still counts
            stats.absorb(&walker.stats);
        }

        stats.duration = start.elapsed();
        info!(
            roots_walked = stats.roots_walked,
            roots_failed = stats.roots_failed,
            files_added = stats.files_added,
            files_failed = stats.files_failed,
            entries_skipped = stats.entries_skipped,
            elapsed_ms = stats.duration.as_millis() as u64,
            "Ingestion finished"
        );
        stats
    }

    fn spawn_walker<S>(&self, id: usize, root: PathBuf, sink: S) -> Result<Walker, WorkerError>
    where
        S: EventSink + Clone + 'static,
    {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);
        let repo = Arc::clone(&self.repo);
        let excludes = Arc::clone(&self.excludes);
        let thread_root = root.clone();

        let handle = thread::Builder::new()
            .name(format!("walker-{}", id))
            .spawn(move || {
                debug!(root = %thread_root.display(), "Walker started");
                walk_root(&thread_root, repo.as_ref(), &excludes, &sink, &stats_clone);
                debug!(root = %thread_root.display(), "Walker finished");
            })
            .map_err(|e| WorkerError::SpawnFailed {
                root: root.clone(),
                reason: e.to_string(),
            })?;

        Ok(Walker {
            root,
            handle,
            stats,
        })
    }
}

fn validate_root(root: &Path) -> Result<(), IngestError> {
    let metadata = fs::metadata(root).map_err(|e| IngestError::RootNotFound {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !metadata.is_dir() {
        return Err(IngestError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

fn walk_root<S: EventSink>(
    root: &Path,
    repo: &dyn Repository,
    excludes: &[String],
    sink: &S,
    stats: &WorkerStats,
) {
    // Pruning an excluded directory skips exactly the paths that would
    // have matched one by one
    let entries = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if is_excluded(excludes, entry.path()) {
                debug!(path = %entry.path().display(), "Excluded");
                stats.record_excluded();
                false
            } else {
                true
            }
        });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                let err = IngestError::Walk {
                    path,
                    reason: e.to_string(),
                };
                stats.record_failure();
                sink.error(err.to_string());
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            debug!(path = %entry.path().display(), "Skipping non-regular file");
            stats.record_skip();
            continue;
        }

        match repo.add_file(entry.path(), root) {
            Ok(()) => {
                stats.record_added();
                sink.info(format!("added: {}", clean_path(entry.path()).display()));
            }
            Err(source) => {
                stats.record_failure();
                let err = IngestError::File {
                    path: entry.path().to_path_buf(),
                    source,
                };
                sink.error(err.to_string());
            }
        }
    }
}
