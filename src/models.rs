//! Data models for the performance pipeline.
//!
//! This module contains the core data structures passed between the
//! pipeline stages: raw records, weekly buckets, anomaly summaries and
//! the report document handed to a renderer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of campaign performance data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Calendar day the metrics were recorded for.
    pub date: NaiveDate,
    /// Campaign identifier.
    pub campaign_id: i64,
    /// Spend for the day (non-negative).
    pub spend: f64,
    /// Impressions served.
    pub impressions: u64,
    /// Conversions attributed.
    pub conversions: u64,
    /// Market / location the campaign ran in.
    pub location: String,
}

impl Record {
    /// Numeric feature vector used by the outlier model.
    pub fn features(&self) -> [f64; 3] {
        [self.spend, self.impressions as f64, self.conversions as f64]
    }
}

/// A complete set of records ingested from one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<Record>> for Dataset {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

/// Total spend for one calendar week and its change against the previous week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    /// Monday the week starts on.
    pub week_start: NaiveDate,
    /// Summed spend for the week.
    pub weekly_spend: f64,
    /// Week-over-week change in percent, rounded to 2 decimals.
    ///
    /// `None` for the first bucket and whenever the previous week's spend was zero.
    pub wow_change_pct: Option<f64>,
}

/// A record together with the outlier model's verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRecord {
    pub record: Record,
    pub is_anomaly: bool,
}

/// Anomalies grouped under one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAnomaly {
    pub location: String,
    pub anomaly_count: usize,
    /// Mean spend of the anomalous records, rounded to 2 decimals.
    pub avg_anomaly_spend: f64,
    /// Earliest anomalous date at this location.
    pub first_date: NaiveDate,
    /// Latest anomalous date at this location.
    pub last_date: NaiveDate,
}

/// Result of anomaly detection over a dataset.
///
/// Rows in `AnomaliesFound` are ordered by count descending, then location ascending,
/// and the vector is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "locations", rename_all = "snake_case")]
pub enum AnomalySummary {
    NoAnomalies,
    AnomaliesFound(Vec<LocationAnomaly>),
}

impl AnomalySummary {
    /// Returns true when the detector found nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, AnomalySummary::NoAnomalies)
    }

    /// Summary rows (empty slice when nothing was found).
    pub fn rows(&self) -> &[LocationAnomaly] {
        match self {
            AnomalySummary::NoAnomalies => &[],
            AnomalySummary::AnomaliesFound(rows) => rows,
        }
    }

    /// The location with the most anomalies.
    pub fn top(&self) -> Option<&LocationAnomaly> {
        self.rows().first()
    }

    /// Total number of anomalous records across all locations.
    pub fn total_anomalies(&self) -> usize {
        self.rows().iter().map(|r| r.anomaly_count).sum()
    }
}

impl fmt::Display for AnomalySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalySummary::NoAnomalies => write!(f, "no anomalies"),
            AnomalySummary::AnomaliesFound(rows) => write!(
                f,
                "{} anomalies in {} location(s)",
                self.total_anomalies(),
                rows.len()
            ),
        }
    }
}

/// One formatted row of the week-over-week table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRow {
    pub week_start: String,
    pub weekly_spend: String,
    pub wow_change: String,
}

/// Structured description of the report, ready for a renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub title: String,
    /// Name of the dataset the report was built from.
    pub source_name: String,
    pub narrative: String,
    pub weekly_rows: Vec<WeeklyRow>,
    pub generated_at: DateTime<Utc>,
}
