//! consolidate - Deduplicating File Consolidation Index
//!
//! Walks one or more source folders, stores every distinct file content once
//! and remembers every path and path-derived tag that produced it.
//!
//! # Features
//!
//! - **Content Addressing**: each file is hashed (xxh64) and zlib-compressed
//!   in a single streaming pass; identical content is stored once.
//!
//! - **Merge on Duplicate**: a second path with the same bytes only adds its
//!   name and tags to the existing object.
//!
//! - **Collision Detection**: a fingerprint seen with a different size is
//!   rejected instead of silently merged.
//!
//! - **Pluggable Backends**: an in-memory map or a SQLite file, selected by
//!   name at startup through a registry.
//!
//! - **Parallel Ingestion**: one walker thread per source root, with all
//!   console output serialized through a single consumer thread.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │  walker-0    │ │  walker-1    │ │  walker-N    │
//! │  (root 0)    │ │  (root 1)    │ │  (root N)    │
//! └──────┬───────┘ └──────┬───────┘ └──────┬───────┘
//!        │ read + hash + compress          │
//!        ▼                ▼                ▼
//! ┌─────────────────────────────────────────────────┐
//! │             Repository (one lock)               │
//! │  objects: fingerprint → ContentObject           │
//! │  names:   path → {fingerprint}                  │
//! │  tags:    segment → {fingerprint}               │
//! └───────────────┬─────────────────────────────────┘
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!   MemoryRepository   SqliteRepository
//! ```
//!
//! # Example
//!
//! ```bash
//! # Index two trees into .consolidate.db
//! consolidate -s ~/photos -s /mnt/old-laptop/photos
//!
//! # Dry run in memory, skipping VCS metadata, with per-file output
//! consolidate -s ./project -x .git -b memory -V
//!
//! # Which paths share content?
//! sqlite3 .consolidate.db "SELECT id, COUNT(*) FROM names GROUP BY id HAVING COUNT(*) > 1"
//! ```

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod progress;
pub mod repo;
pub mod walker;

pub use config::{CliArgs, IngestConfig};
pub use content::{ContentObject, Fingerprint};
pub use error::{ConsolidateError, RepoError, Result};
pub use repo::{BackendRegistry, RepoSummary, Repository};
pub use walker::{IngestStats, Ingestor};
