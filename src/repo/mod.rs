//! Content-addressed repository engine
//!
//! A repository maps a [`Fingerprint`] to one stored [`ContentObject`] and
//! keeps two inverted indices over it: name → fingerprints and
//! tag → fingerprints. Two backends implement the same [`Repository`]
//! contract:
//!
//! ```text
//!                 ┌────────────────────────────┐
//!                 │      BackendRegistry       │
//!                 │  "memory"  │  "sqlite"     │
//!                 └─────┬──────┴──────┬────────┘
//!                       │             │
//!             ┌─────────▼───┐   ┌─────▼──────────────┐
//!             │ MemoryRepo  │   │ SqliteRepository   │
//!             │ Mutex<maps> │   │ Mutex<Connection>  │
//!             └─────────────┘   │ 1 tx per add       │
//!                               └────────────────────┘
//! ```
//!
//! # Add semantics
//!
//! - Unknown fingerprint: insert, index every name and tag, count both the
//!   original and the compressed size.
//! - Known fingerprint, different size: hash collision, rejected untouched.
//! - Known fingerprint, same size: merge names and tags, count the original
//!   size again (another file was observed) but not the compressed size.

pub mod memory;
pub mod registry;

pub use memory::MemoryRepository;
pub use registry::{BackendConstructor, BackendRegistry, MEMORY_BACKEND, SQLITE_BACKEND};

use crate::content::{ContentObject, Fingerprint};
use crate::error::{RepoError, RepoResult};
use std::fmt;
use std::path::Path;

/// Capability interface shared by every storage backend
pub trait Repository: Send + Sync {
    /// Fingerprint and compress a file, then [`add`](Repository::add) it
    fn add_file(&self, path: &Path, root: &Path) -> RepoResult<()> {
        let object = ContentObject::from_file(path, root)?;
        self.add(object)
    }

    /// Insert or merge an object
    fn add(&self, object: ContentObject) -> RepoResult<()>;

    /// Delete an object and prune it from every index; no-op if absent
    fn remove(&self, fingerprint: Fingerprint) -> RepoResult<()>;

    /// Look up a single object
    fn object(&self, fingerprint: Fingerprint) -> RepoResult<Option<ContentObject>>;

    /// Every indexed name, sorted
    fn all_names(&self) -> RepoResult<Vec<String>>;

    /// Every indexed tag, sorted
    fn all_tags(&self) -> RepoResult<Vec<String>>;

    /// Objects currently indexed under `name`, ordered by fingerprint
    fn objects_by_name(&self, name: &str) -> RepoResult<Vec<ContentObject>>;

    /// Objects currently indexed under `tag`, ordered by fingerprint
    fn objects_by_tag(&self, tag: &str) -> RepoResult<Vec<ContentObject>>;

    /// Totals snapshot
    fn summary(&self) -> RepoResult<RepoSummary>;
}

/// Reject objects that cannot have come from an observed file
pub(crate) fn validate_object(object: &ContentObject) -> RepoResult<()> {
    if object.names().is_empty() {
        return Err(RepoError::InvalidArgument(format!(
            "object {} carries no names",
            object.fingerprint()
        )));
    }
    Ok(())
}

/// Repository totals
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RepoSummary {
    pub objects: u64,
    pub names: u64,
    pub tags: u64,
    /// Sum of sizes over every accepted add, merges included
    pub original_size: u64,
    /// Sum of payload sizes over inserted objects only
    pub compressed_size: u64,
}

impl RepoSummary {
    /// Original over compressed size; NaN for an empty repository
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return f64::NAN;
        }
        self.original_size as f64 / self.compressed_size as f64
    }
}

impl fmt::Display for RepoSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20}: {}", "Total Objects", self.objects)?;
        writeln!(f, "{:<20}: {}", "Total Names", self.names)?;
        writeln!(f, "{:<20}: {}", "Total Tags", self.tags)?;
        writeln!(f, "{:<20}: {}", "Original Size", self.original_size)?;
        writeln!(f, "{:<20}: {}", "Compressed Size", self.compressed_size)?;
        write!(f, "{:<20}: {:.6}", "Compression Ratio", self.ratio())
    }
}
