//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Catalog
//!
//! ```text
//! Summer Pictures
//!     A year outside
//! 001 First steps (June 1, 2021)
//!     Id: 1a2b3c
//!     Size: 3000x4000
//! 002 (9f8e7d)
//!     Id: 9f8e7d
//!     Size: 4000x3000
//!
//! 2 photos
//! ```
//!
//! ## Health
//!
//! ```text
//! Refresh: running since 2024-05-01 12:00:03 UTC (2m ago)
//! Next run: not scheduled
//! Last published: 2024-05-01 11:55:00 UTC (7m ago), 42 photos
//!
//! Log
//!     INFO  2m ago  started run 3
//!     WARN  9m ago  run 2: pre-warm skipped: ...
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! the current time is passed in, never read.

use crate::cache::CacheStats;
use crate::health::HealthReport;
use crate::types::{CatalogSnapshot, DisplayStrings};
use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

/// Coarse distance between `at` and `now`: `just now`, `5m ago`, `in 2h`.
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(at);
    let secs = delta.num_seconds().abs();
    if secs < 60 {
        return "just now".to_string();
    }
    let amount = if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    };
    if delta.num_seconds() >= 0 {
        format!("{amount} ago")
    } else {
        format!("in {amount}")
    }
}

fn timestamp_with_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!(
        "{} ({})",
        at.format(TIMESTAMP_FORMAT),
        format_relative(at, now)
    )
}

// ============================================================================
// Catalog
// ============================================================================

/// Format the published catalog: strings header, then one entry per photo.
///
/// Photos are identified by caption, or by id in parens when uncaptioned.
pub fn format_catalog(snapshot: &CatalogSnapshot, strings: &DisplayStrings) -> Vec<String> {
    let mut lines = Vec::new();

    if !strings.title.is_empty() {
        lines.push(strings.title.clone());
    }
    if !strings.subtitle.is_empty() {
        lines.push(format!("{}{}", indent(1), strings.subtitle));
    }

    for (i, photo) in snapshot.photos().iter().enumerate() {
        let label = if photo.caption.is_empty() {
            format!("({})", photo.id)
        } else {
            truncate_text(&photo.caption, 60)
        };
        lines.push(format!("{} {}", format_index(i + 1), label));
        lines.push(format!("{}Id: {}", indent(1), photo.id));
        lines.push(format!("{}Size: {}x{}", indent(1), photo.width, photo.height));
        if photo.rotation.needs_correction() {
            lines.push(format!(
                "{}Rotated: {}°",
                indent(1),
                u32::from(photo.rotation.quarter_turns()) * 90
            ));
        }
    }

    lines.push(String::new());
    lines.push(match snapshot.len() {
        1 => "1 photo".to_string(),
        n => format!("{n} photos"),
    });
    lines
}

pub fn print_catalog(snapshot: &CatalogSnapshot, strings: &DisplayStrings) {
    for line in format_catalog(snapshot, strings) {
        println!("{}", line);
    }
}

// ============================================================================
// Health
// ============================================================================

/// Format a health report, newest log entries first.
pub fn format_health(report: &HealthReport, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(match report.active_since {
        Some(since) => format!(
            "Refresh: running since {}",
            timestamp_with_relative(since, now)
        ),
        None => "Refresh: idle".to_string(),
    });
    lines.push(match report.next_run_at {
        Some(next) => format!("Next run: {}", timestamp_with_relative(next, now)),
        None => "Next run: not scheduled".to_string(),
    });
    lines.push(match report.last_published_at {
        Some(at) => format!(
            "Last published: {}, {} photos",
            timestamp_with_relative(at, now),
            report.photo_count
        ),
        None => "Last published: never".to_string(),
    });

    if !report.logs.is_empty() {
        lines.push(String::new());
        lines.push("Log".to_string());
        for record in &report.logs {
            lines.push(format!(
                "{}{:<5} {:>8}  {}",
                indent(1),
                record.level,
                format_relative(record.at, now),
                record.message
            ));
        }
    }
    lines
}

pub fn print_health(report: &HealthReport) {
    for line in format_health(report, Utc::now()) {
        println!("{}", line);
    }
}

// ============================================================================
// Cache
// ============================================================================

pub fn format_cache_stats(stats: &CacheStats) -> Vec<String> {
    vec![format!("Cache: {}", stats)]
}

pub fn print_cache_stats(stats: &CacheStats) {
    for line in format_cache_stats(stats) {
        println!("{}", line);
    }
}
