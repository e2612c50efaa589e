//! CLI output formatting for builds, exports, and route listings.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Built 42 files (1.3 MB)
//!     Added: 3
//!     Edited: 1
//!     Unchanged: 38
//!     Deleted: 2
//!     Missing translations: de 4, fr 1
//! ```
//!
//! ## Route failures
//!
//! ```text
//! 2 routes failed to build
//!     /blog/broken/
//!         template exploded
//!     /about/
//!         No such file or directory (os error 2)
//! ```
//!
//! ## Export
//!
//! ```text
//! Exported to site-publish/
//!     Copied: 4
//!     Removed: 1
//!     Unchanged: 38
//! ```
//!
//! ## Routes
//!
//! ```text
//! /                      document   content/index.md
//! /about/                document   content/about.md
//! /static/site.css       staticDir  static/site.css
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::builder::{BuildResult, RouteFailure};
use crate::export::ExportResult;
use crate::router::RouteEntry;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1000.0;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_summary(result: &BuildResult) -> Vec<String> {
    let metrics = &result.metrics;
    let diff = &result.diff;
    let mut lines = vec![format!(
        "Built {} ({})",
        plural(metrics.total_files(), "file"),
        format_bytes(metrics.total_bytes())
    )];
    lines.push(format!("{}Added: {}", indent(1), diff.adds.len()));
    lines.push(format!("{}Edited: {}", indent(1), diff.edits.len()));
    lines.push(format!("{}Unchanged: {}", indent(1), diff.no_changes.len()));
    lines.push(format!("{}Deleted: {}", indent(1), diff.deletes.len()));

    let missing: Vec<String> = metrics
        .missing_translations
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(locale, n)| format!("{locale} {n}"))
        .collect();
    if !missing.is_empty() {
        lines.push(format!(
            "{}Missing translations: {}",
            indent(1),
            missing.join(", ")
        ));
    }
    lines
}

pub fn print_build_summary(result: &BuildResult) {
    for line in format_build_summary(result) {
        println!("{line}");
    }
}

pub fn format_route_failures(failures: &[RouteFailure]) -> Vec<String> {
    let mut lines = vec![format!(
        "{} failed to build",
        plural(failures.len(), "route")
    )];
    for failure in failures {
        lines.push(format!("{}{}", indent(1), failure.url_path));
        lines.push(format!("{}{}", indent(2), failure.message));
    }
    lines
}

/// Route failures go to stderr.
pub fn print_route_failures(failures: &[RouteFailure]) {
    for line in format_route_failures(failures) {
        eprintln!("{line}");
    }
}

// ============================================================================
// Export
// ============================================================================

pub fn format_export_summary(result: &ExportResult, export_dir: &Path) -> Vec<String> {
    vec![
        format!("Exported to {}", export_dir.display()),
        format!("{}Copied: {}", indent(1), result.copied),
        format!("{}Removed: {}", indent(1), result.removed),
        format!("{}Unchanged: {}", indent(1), result.diff.no_changes.len()),
    ]
}

pub fn print_export_summary(result: &ExportResult, export_dir: &Path) {
    for line in format_export_summary(result, export_dir) {
        println!("{line}");
    }
}

// ============================================================================
// Routes
// ============================================================================

/// One aligned row per route: trie path, kind, source relative to `root`.
pub fn format_routes(entries: &[RouteEntry], root: &Path) -> Vec<String> {
    let width = entries.iter().map(|e| e.path.len()).max().unwrap_or(0);
    entries
        .iter()
        .map(|entry| {
            let source = entry
                .route
                .source_path()
                .map(|s| s.strip_prefix(root).unwrap_or(s).display().to_string())
                .unwrap_or_else(|| "-".to_string());
            let kind = entry.route.kind().to_string();
            format!("{:<width$}  {:<9}  {}", entry.path, kind, source)
                .trim_end()
                .to_string()
        })
        .collect()
}

pub fn print_routes(entries: &[RouteEntry], root: &Path) {
    for line in format_routes(entries, root) {
        println!("{line}");
    }
}
