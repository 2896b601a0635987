//! Report document assembly.
//!
//! Turns weekly buckets and the narrative into a [`ReportDocument`] with
//! display-ready values, and derives where the rendered file goes.

use crate::models::{ReportDocument, WeeklyBucket, WeeklyRow};
use crate::scanner::REPORT_SUFFIX;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Marker shown when week-over-week change is undefined.
pub const NOT_APPLICABLE: &str = "N/A";

/// Default document title.
pub const DEFAULT_TITLE: &str = "Weekly Performance Report";

/// Format an amount as currency with 2 decimals.
pub fn format_currency(value: f64) -> String {
    format!("${:.2}", value)
}

/// Format a percentage change, or the N/A marker.
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(pct) => format!("{:.2}%", pct),
        None => NOT_APPLICABLE.to_string(),
    }
}

/// Display rows for the week-over-week table.
pub fn weekly_rows(buckets: &[WeeklyBucket]) -> Vec<WeeklyRow> {
    buckets
        .iter()
        .map(|b| WeeklyRow {
            week_start: b.week_start.format("%Y-%m-%d").to_string(),
            weekly_spend: format_currency(b.weekly_spend),
            wow_change: format_change(b.wow_change_pct),
        })
        .collect()
}

/// Build the document description handed to a renderer.
pub fn assemble(
    title: &str,
    source_name: &str,
    buckets: &[WeeklyBucket],
    narrative: &str,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    ReportDocument {
        title: title.to_string(),
        source_name: source_name.to_string(),
        narrative: narrative.to_string(),
        weekly_rows: weekly_rows(buckets),
        generated_at,
    }
}

/// `<dir>/<stem>_Report.<extension>` next to the source dataset.
pub fn report_path(source: &Path, extension: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dataset".to_string());
    let file_name = format!("{}{}.{}", stem, REPORT_SUFFIX, extension);

    match source.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}
