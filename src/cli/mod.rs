//! CLI command definitions and terminal output helpers.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

use chrono::{DateTime, TimeDelta, Utc};
use colored::Colorize;

use minly::lastrun::LastRun;
use minly::store::LinkRecord;

/// About text with ANSI styling for clap help output.
pub const ABOUT_STYLED: &str =
    "\x1b[1mminly\x1b[0m \x1b[2m· Upload files to S3-compatible storage and share them through short links.\x1b[0m";

/// Warn on stderr that the previous invocation failed.
pub fn warn_previous_failure(last: &LastRun) {
    eprintln!(
        "  {} The previous run at {} failed: {}",
        "Warning:".yellow(),
        last.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        last.error
    );
    eprintln!();
}

/// Print recorded uploads as an aligned table.
pub fn print_records(records: &[LinkRecord], now: DateTime<Utc>) {
    if records.is_empty() {
        println!("No uploads recorded.");
        return;
    }

    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|r| {
            [
                r.created_at.format("%Y-%m-%d %H:%M").to_string(),
                r.short_link.clone(),
                remaining(r.storage_link_expires_at - now),
                object_key(&r.storage_link),
            ]
        })
        .collect();

    let headers = ["UPLOADED", "SHORT LINK", "EXPIRES IN", "OBJECT"];
    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(headers[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{h:<w$}"))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header_line.trim_end().bold());

    for row in &rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
}

/// Object key from a presigned path-style URL (`/<bucket>/<key>?...`).
pub fn object_key(storage_link: &str) -> String {
    reqwest::Url::parse(storage_link)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| "-".to_string())
}

/// Coarse human rendering of the time left on a link.
pub fn remaining(delta: TimeDelta) -> String {
    if delta <= TimeDelta::zero() {
        return "expired".to_string();
    }
    let days = delta.num_days();
    let hours = delta.num_hours() % 24;
    let minutes = delta.num_minutes() % 60;
    match (days, hours) {
        (0, 0) => format!("{}m", minutes.max(1)),
        (0, h) => format!("{h}h {minutes}m"),
        (d, h) => format!("{d}d {h}h"),
    }
}
