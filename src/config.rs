//! Configuration types for consolidate
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::repo::SQLITE_BACKEND;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Default database file for the sqlite backend
pub const DEFAULT_DATABASE: &str = ".consolidate.db";

/// Deduplicating file consolidation index
#[derive(Parser, Debug, Clone)]
#[command(
    name = "consolidate",
    about = "Deduplicating file consolidation index",
    long_about = "Walks one or more source folders, stores every distinct file content once \
                  (zlib-compressed, keyed by a 64-bit fingerprint) and records every path and \
                  path-derived tag that produced it.",
    after_help = "EXAMPLES:\n    \
        consolidate -s ~/photos -s /mnt/backup/photos\n    \
        consolidate -s ./src -x target -x .git -V\n    \
        consolidate -s /data -b memory -p"
)]
pub struct CliArgs {
    /// Source folder to scan (can be repeated)
    #[arg(short = 's', long = "source", value_name = "DIR", action = clap::ArgAction::Append)]
    pub sources: Vec<PathBuf>,

    /// Skip any path containing this substring (can be repeated)
    #[arg(
        short = 'x',
        long = "exclude",
        value_name = "SUBSTRING",
        action = clap::ArgAction::Append
    )]
    pub excludes: Vec<String>,

    /// Verbose output (per-file LOG lines, NAMES and TAGS listings)
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Storage backend
    #[arg(short = 'b', long, default_value = SQLITE_BACKEND, value_name = "NAME")]
    pub backend: String,

    /// Database file for the sqlite backend
    #[arg(short = 'd', long, default_value = DEFAULT_DATABASE, value_name = "FILE")]
    pub database: PathBuf,

    /// Show a progress spinner
    #[arg(short = 'p', long)]
    pub progress: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Roots to walk, in command-line order
    pub sources: Vec<PathBuf>,

    /// Exclusion substrings
    pub excludes: Vec<String>,

    /// Verbose output
    pub verbose: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Registry name of the backend
    pub backend: String,

    /// Database path for the sqlite backend
    pub database: PathBuf,
}

impl IngestConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        // Validate database path
        if let Some(parent) = args.database.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConfigError::InvalidDatabasePath {
                    path: args.database.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        let excludes = args
            .excludes
            .into_iter()
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            sources: args.sources,
            excludes,
            verbose: args.verbose,
            show_progress: args.progress,
            backend: args.backend,
            database: args.database,
        })
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        is_excluded(&self.excludes, path)
    }
}

/// Substring match of `path` against every exclusion
pub fn is_excluded(excludes: &[String], path: &Path) -> bool {
    if excludes.is_empty() {
        return false;
    }
    let path = path.to_string_lossy();
    excludes.iter().any(|e| path.contains(e.as_str()))
}
