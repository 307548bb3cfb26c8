//! Error types for consolidate
//!
//! This module defines the error hierarchy that covers:
//! - Codec errors (reading, compressing and decoding content)
//! - Repository errors (invalid input, hash collisions, backend failures)
//! - SQLite database errors for the persistent backend
//! - Configuration and CLI errors
//! - Ingestion errors (per-root and per-file) and worker thread errors
//!
//! Only configuration errors are fatal to a run. Everything else is reported
//! through the ingestion sink and the walk carries on.

use crate::content::Fingerprint;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the consolidate application
#[derive(Error, Debug)]
pub enum ConsolidateError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Repository errors
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),

    /// Ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while fingerprinting, compressing or decoding content
#[derive(Error, Debug)]
pub enum CodecError {
    /// Source file could not be opened or fully read
    #[error("Failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stream error without a known path
    #[error("Stream error: {0}")]
    Io(#[from] std::io::Error),

    /// Compressed payload is corrupt
    #[error("Failed to decode payload: {0}")]
    Decode(#[source] std::io::Error),
}

/// Repository errors shared by every backend
#[derive(Error, Debug)]
pub enum RepoError {
    /// Object rejected before touching the repository
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Same fingerprint, different size
    #[error("Hash collision on {fingerprint}: {existing:?} and {incoming:?}")]
    Collision {
        fingerprint: Fingerprint,
        existing: Vec<String>,
        incoming: Vec<String>,
    },

    /// Codec failure while building an object
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Persistent backend failure
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl RepoError {
    /// Check if this error is a fingerprint collision
    pub fn is_collision(&self) -> bool {
        matches!(self, RepoError::Collision { .. })
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(e: rusqlite::Error) -> Self {
        RepoError::Database(DbError::Sqlite(e))
    }
}

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection or schema initialization failed; sticky for the handle
    #[error("Failed to initialize database at '{}': {reason}", .path.display())]
    InitFailed { path: PathBuf, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No -s/--source given
    #[error("no source folders specified")]
    NoSources,

    /// Backend name not present in the registry
    #[error("Unknown backend '{name}' (available: {})", .known.join(", "))]
    UnknownBackend { name: String, known: Vec<String> },

    /// Database path error
    #[error("Invalid database path '{}': {reason}", .path.display())]
    InvalidDatabasePath { path: PathBuf, reason: String },
}

/// Per-root and per-file ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    /// Root could not be stat'ed
    #[error("error {:?}: {reason}", .path.display().to_string())]
    RootNotFound { path: PathBuf, reason: String },

    /// Root exists but is not a directory
    #[error("{:?} is not a folder", .path.display().to_string())]
    NotADirectory { path: PathBuf },

    /// Directory traversal failed for an entry
    #[error("walk error at {}: {reason}", .path.display())]
    Walk { path: PathBuf, reason: String },

    /// Adding a single file failed
    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: RepoError,
    },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Thread could not be spawned
    #[error("Failed to spawn walker for '{}': {reason}", .root.display())]
    SpawnFailed { root: PathBuf, reason: String },

    /// Worker panicked
    #[error("Walker for '{}' panicked", .root.display())]
    Panicked { root: PathBuf },
}

/// Result type alias for ConsolidateError
pub type Result<T> = std::result::Result<T, ConsolidateError>;

/// Result type alias for RepoError
pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// Result type alias for CodecError
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_detection_helper() {
        let err = RepoError::Collision {
            fingerprint: Fingerprint::new(7),
            existing: vec!["a".into()],
            incoming: vec!["b".into()],
        };
        assert!(err.is_collision());
        assert!(err.to_string().contains("0000000000000007"));

        let other = RepoError::InvalidArgument("empty".into());
        assert!(!other.is_collision());
    }

    #[test]
    fn test_error_conversion() {
        let db_err = DbError::InitFailed {
            path: PathBuf::from("/nope/x.db"),
            reason: "unable to open".into(),
        };
        let repo_err: RepoError = db_err.into();
        assert!(matches!(repo_err, RepoError::Database(_)));

        let top: ConsolidateError = repo_err.into();
        assert!(matches!(top, ConsolidateError::Repo(_)));
    }

    #[test]
    fn test_root_error_messages() {
        let err = IngestError::NotADirectory {
            path: PathBuf::from("file.txt"),
        };
        assert_eq!(err.to_string(), "\"file.txt\" is not a folder");

        assert_eq!(
            ConfigError::NoSources.to_string(),
            "no source folders specified"
        );
    }
}
