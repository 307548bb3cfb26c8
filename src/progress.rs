//! Progress reporting and console output
//!
//! Provides an optional spinner driven by the log consumer plus the run
//! header and final summary.

use crate::config::IngestConfig;
use crate::repo::RepoSummary;
use crate::walker::IngestStats;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing running added/failed counts
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let spinner = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(spinner);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, added: u64, failed: u64) {
        self.bar.set_message(format!(
            "Added: {} | Failed: {}",
            format_number(added),
            format_number(failed),
        ));
    }

    /// Hide the spinner while `f` writes elsewhere
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print the repository totals and ingestion statistics
pub fn print_summary(summary: &RepoSummary, stats: &IngestStats) {
    let duration_secs = stats.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        stats.files_added as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Consolidation Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("{summary}");
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} -> {}",
        style("Stored:").bold(),
        format_size(summary.original_size, BINARY),
        format_size(summary.compressed_size, BINARY)
    );
    println!(
        "  {} {} walked, {} failed",
        style("Roots:").bold(),
        stats.roots_walked,
        stats.roots_failed
    );
    println!(
        "  {} {} ({} excluded, {} skipped)",
        style("Files:").bold(),
        format_number(stats.files_added),
        format_number(stats.entries_excluded),
        format_number(stats.entries_skipped)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(stats.files_failed)
        );
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(config: &IngestConfig) {
    println!();
    println!(
        "{} {}",
        style("consolidate").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    for source in &config.sources {
        println!("  {} {}", style("Source:").bold(), source.display());
    }
    if !config.excludes.is_empty() {
        println!("  {} {}", style("Exclude:").bold(), config.excludes.join(", "));
    }
    println!("  {} {}", style("Backend:").bold(), config.backend);
    println!("  {} {}", style("Database:").bold(), config.database.display());
    println!();
}
