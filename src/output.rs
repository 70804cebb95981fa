//! CLI output formatting for every admin command.
//!
//! # Entity Display
//!
//! Gallery entries are shown by identity first (id and title), with the
//! store location and sizes as indented context lines:
//!
//! ```text
//! #3 Ana Ruiz [Ponentes]
//!     Source: speakers/ponentes-ana-ruiz-1718000000000.webp
//!     Optimized: 2.4 MB → 183.21 KB (92.5% smaller)
//! ```
//!
//! ## Batch
//!
//! ```text
//! optimized  about/hero.jpg → about/hero.webp (1.2 MB → 240.5 KB)
//! skipped    speakers/ana.webp (already optimized)
//! failed     hero/broken.png (decode: Failed to decode image: ...)
//!
//! 3 files: 1 optimized, 1 skipped, 1 errors
//! Saved 983.5 KB (average 80.4% smaller)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::batch::{BatchReport, ItemResult, ItemStatus};
use crate::imaging::{Analysis, OptimizationResult};
use crate::ingest::IngestOutcome;
use crate::manifest::{GalleryEntry, ManifestStats, ValidationReport};
use crate::manifest_store::ReconcileReport;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable size in 1024 steps, at most two decimals.
///
/// ```text
/// 0       → 0 Bytes
/// 1536    → 1.5 KB
/// 1048576 → 1 MB
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Like [`format_file_size`] but signed, for savings that can go negative.
fn format_signed_size(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_file_size(bytes.unsigned_abs()))
    } else {
        format_file_size(bytes as u64)
    }
}

fn format_ratio(ratio: f64) -> String {
    if ratio < 0.0 {
        format!("{:.1}% larger", -ratio)
    } else {
        format!("{ratio:.1}% smaller")
    }
}

fn size_change(original: u64, optimized: u64, ratio: f64) -> String {
    format!(
        "{} → {} ({})",
        format_file_size(original),
        format_file_size(optimized),
        format_ratio(ratio)
    )
}

/// Header line for an entry: `#id title [Category]`.
fn entry_header(entry: &GalleryEntry) -> String {
    let title = if entry.title.is_empty() {
        "(untitled)"
    } else {
        entry.title.as_str()
    };
    if entry.category.is_empty() {
        format!("#{} {}", entry.id, title)
    } else {
        format!("#{} {} [{}]", entry.id, title, entry.category.display_name())
    }
}

// ============================================================================
// Analyze / optimize
// ============================================================================

pub fn format_analysis(name: &str, analysis: &Analysis) -> Vec<String> {
    let mut lines = vec![name.to_string()];
    lines.push(format!(
        "{}Dimensions: {}×{} ({} MP, aspect {})",
        indent(1),
        analysis.width,
        analysis.height,
        analysis.megapixels,
        analysis.aspect_ratio
    ));
    lines.push(format!(
        "{}Size: {}",
        indent(1),
        format_file_size(analysis.byte_size)
    ));
    lines.push(format!(
        "{}Needs optimization: {}",
        indent(1),
        if analysis.needs_optimization { "yes" } else { "no" }
    ));
    lines
}

pub fn print_analysis(name: &str, analysis: &Analysis) {
    for line in format_analysis(name, analysis) {
        println!("{}", line);
    }
}

/// One line describing an encode result, e.g. for `thumbnail`.
pub fn format_optimization(result: &OptimizationResult) -> String {
    format!(
        "{} {}×{}: {}",
        result.format.extension(),
        result.dimensions.width,
        result.dimensions.height,
        size_change(
            result.original_size,
            result.optimized_size,
            result.compression_ratio
        )
    )
}

// ============================================================================
// Ingest
// ============================================================================

pub fn format_ingest_outcome(outcome: &IngestOutcome) -> Vec<String> {
    let mut lines = vec![entry_header(&outcome.entry)];
    lines.push(format!("{}Stored: {}", indent(1), outcome.path));
    lines.push(format!(
        "{}Dimensions: {}×{}",
        indent(1),
        outcome.analysis.width,
        outcome.analysis.height
    ));
    match &outcome.optimization {
        Some(result) => lines.push(format!(
            "{}Optimized: {}",
            indent(1),
            size_change(
                result.original_size,
                result.optimized_size,
                result.compression_ratio
            )
        )),
        None => lines.push(format!(
            "{}Stored as-is: {}",
            indent(1),
            format_file_size(outcome.analysis.byte_size)
        )),
    }
    lines
}

pub fn print_ingest_outcome(outcome: &IngestOutcome) {
    for line in format_ingest_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

fn format_item(item: &ItemResult) -> String {
    let target = match &item.path {
        Some(path) if path != &item.name => format!("{} → {}", item.name, path),
        _ => item.name.clone(),
    };
    let sizes = match (item.original_size, item.optimized_size, item.compression_ratio) {
        (Some(original), Some(optimized), Some(ratio)) => {
            format!(" ({})", size_change(original, optimized, ratio))
        }
        _ => String::new(),
    };
    match &item.status {
        ItemStatus::Optimized => format!("{:<10} {target}{sizes}", "optimized"),
        ItemStatus::Stored => format!("{:<10} {target}{sizes}", "stored"),
        ItemStatus::Simulated => format!("{:<10} {target}{sizes}", "dry-run"),
        ItemStatus::Skipped { reason } => format!("{:<10} {target} ({reason})", "skipped"),
        ItemStatus::Failed { kind, message } => {
            format!("{:<10} {target} ({kind}: {message})", "failed")
        }
    }
}

pub fn format_batch_report(report: &BatchReport) -> Vec<String> {
    let mut lines: Vec<String> = report.results.iter().map(format_item).collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }

    let progress = &report.progress;
    lines.push(format!(
        "{} files: {} optimized, {} skipped, {} errors",
        progress.total, progress.optimized, progress.skipped, progress.errors
    ));
    if report.cancelled {
        lines.push(format!(
            "Cancelled after {} of {} files",
            progress.processed, progress.total
        ));
    }
    if let Some(average) = report.average_compression() {
        lines.push(format!(
            "Saved {} (average {})",
            format_signed_size(report.total_saved_bytes()),
            format_ratio(average)
        ));
    }
    lines
}

pub fn print_batch_report(report: &BatchReport) {
    for line in format_batch_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Manifest
// ============================================================================

pub fn format_reconcile_report(report: &ReconcileReport) -> Vec<String> {
    let mut lines = Vec::new();
    for rewrite in &report.rewrites {
        lines.push(format!("#{} {} → {}", rewrite.id, rewrite.from, rewrite.to));
    }
    for src in &report.missing {
        lines.push(format!("missing {src}"));
    }
    if report.changed == 0 {
        lines.push(format!("Checked {} entries, all consistent", report.checked));
    } else {
        lines.push(format!(
            "Checked {} entries, updated {}",
            report.checked, report.changed
        ));
    }
    lines
}

pub fn print_reconcile_report(report: &ReconcileReport) {
    for line in format_reconcile_report(report) {
        println!("{}", line);
    }
}

pub fn format_validation_report(report: &ValidationReport) -> Vec<String> {
    if report.valid {
        return vec!["Manifest is valid".to_string()];
    }
    let mut lines = vec![format!("Manifest has {} problem(s)", report.errors.len())];
    lines.extend(report.errors.iter().map(|e| format!("{}{e}", indent(1))));
    lines
}

pub fn print_validation_report(report: &ValidationReport) {
    for line in format_validation_report(report) {
        println!("{}", line);
    }
}

/// Entry listing. `base_url` turns each `src` into its public URL.
pub fn format_entry_list<'a>(
    entries: impl IntoIterator<Item = &'a GalleryEntry>,
    base_url: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        lines.push(entry_header(entry));
        lines.push(format!(
            "{}Source: {}/{}",
            indent(1),
            base_url.trim_end_matches('/'),
            entry.src
        ));
        if !entry.description.is_empty() {
            lines.push(format!("{}Description: {}", indent(1), entry.description));
        }
        if entry.optimized
            && let (Some(original), Some(optimized)) = (entry.original_size, entry.optimized_size)
        {
            let ratio = entry
                .compression_ratio
                .unwrap_or_else(|| crate::imaging::compression_ratio(original, optimized));
            lines.push(format!(
                "{}Optimized: {}",
                indent(1),
                size_change(original, optimized, ratio)
            ));
        }
    }
    if lines.is_empty() {
        lines.push("No images".to_string());
    }
    lines
}

pub fn print_entry_list<'a>(entries: impl IntoIterator<Item = &'a GalleryEntry>, base_url: &str) {
    for line in format_entry_list(entries, base_url) {
        println!("{}", line);
    }
}

pub fn format_stats(stats: &ManifestStats) -> Vec<String> {
    let mut lines = vec![format!(
        "{} images, {} optimized",
        stats.total, stats.optimized
    )];
    for (category, count) in &stats.by_category {
        lines.push(format!("{}{category}: {count}", indent(1)));
    }
    lines
}

pub fn print_stats(stats: &ManifestStats) {
    for line in format_stats(stats) {
        println!("{}", line);
    }
}
