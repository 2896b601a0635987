//! Anomaly detection over campaign records.
//!
//! Fits a fresh isolation forest on `{spend, impressions, conversions}`
//! and groups the flagged records by location.

use crate::analysis::aggregator::round2;
use crate::analysis::isolation_forest::{ForestParams, IsolationForest};
use crate::error::DetectError;
use crate::models::{AnomalyRecord, AnomalySummary, Dataset, LocationAnomaly};
use std::collections::HashMap;
use tracing::{debug, info};

/// Label every record as inlier or outlier.
pub fn label_records(
    dataset: &Dataset,
    params: &ForestParams,
) -> Result<Vec<AnomalyRecord>, DetectError> {
    let features: Vec<Vec<f64>> = dataset
        .records()
        .iter()
        .map(|r| r.features().to_vec())
        .collect();

    let forest = IsolationForest::fit(&features, params)?;
    let flags = forest.predict(&features);

    Ok(dataset
        .records()
        .iter()
        .zip(flags)
        .map(|(record, is_anomaly)| AnomalyRecord {
            record: record.clone(),
            is_anomaly,
        })
        .collect())
}

/// Detect anomalies and summarize them by location.
pub fn detect_anomalies(
    dataset: &Dataset,
    params: &ForestParams,
) -> Result<AnomalySummary, DetectError> {
    let labeled = label_records(dataset, params)?;
    let anomalies: Vec<&AnomalyRecord> = labeled.iter().filter(|r| r.is_anomaly).collect();

    if anomalies.is_empty() {
        info!("No anomalies detected");
        return Ok(AnomalySummary::NoAnomalies);
    }

    let rows = summarize_by_location(&anomalies);
    info!(
        "Anomaly detection found {} outlier(s) in {} location(s)",
        anomalies.len(),
        rows.len()
    );
    Ok(AnomalySummary::AnomaliesFound(rows))
}

/// Group flagged records by location: count desc, then location asc.
pub fn summarize_by_location(anomalies: &[&AnomalyRecord]) -> Vec<LocationAnomaly> {
    let mut grouped: HashMap<&str, Vec<&AnomalyRecord>> = HashMap::new();

    for anomaly in anomalies {
        grouped
            .entry(anomaly.record.location.as_str())
            .or_default()
            .push(anomaly);
    }

    let mut rows: Vec<LocationAnomaly> = grouped
        .into_iter()
        .filter_map(|(location, records)| {
            let first_date = records.iter().map(|r| r.record.date).min()?;
            let last_date = records.iter().map(|r| r.record.date).max()?;
            let total: f64 = records.iter().map(|r| r.record.spend).sum();
            Some(LocationAnomaly {
                location: location.to_string(),
                anomaly_count: records.len(),
                avg_anomaly_spend: round2(total / records.len() as f64),
                first_date,
                last_date,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.anomaly_count
            .cmp(&a.anomaly_count)
            .then_with(|| a.location.cmp(&b.location))
    });

    debug!("Summarized anomalies into {} location row(s)", rows.len());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use chrono::{Duration, NaiveDate};

    fn record(day: i64, spend: f64, location: &str) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + Duration::days(day),
            campaign_id: 1,
            spend,
            impressions: 1000 + (day % 5) as u64 * 10,
            conversions: 10 + (day % 3) as u64,
            location: location.to_string(),
        }
    }

    fn typical_dataset(n: i64) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let location = if i % 2 == 0 { "Miami" } else { "Austin" };
                record(i, 100.0 + (i % 4) as f64 * 2.5, location)
            })
            .collect()
    }

    fn flagged(location: &str, day: i64, spend: f64) -> AnomalyRecord {
        AnomalyRecord {
            record: record(day, spend, location),
            is_anomaly: true,
        }
    }

    #[test]
    fn test_injected_outlier_is_flagged() {
        let mut records = typical_dataset(24);
        let mean: f64 = records.iter().map(|r| r.spend).sum::<f64>() / records.len() as f64;
        records[11].spend = mean * 100.0;
        let dataset = Dataset::new(records);

        let labeled = label_records(&dataset, &ForestParams::default()).unwrap();
        assert!(labeled[11].is_anomaly);

        let summary = detect_anomalies(&dataset, &ForestParams::default()).unwrap();
        assert!(summary.rows().iter().any(|r| r.location == "Austin"));
    }

    #[test]
    fn test_zero_contamination_returns_no_anomalies() {
        let mut records = typical_dataset(30);
        records[3].spend = 50_000.0;
        let params = ForestParams {
            contamination: 0.0,
            ..ForestParams::default()
        };

        let summary = detect_anomalies(&Dataset::new(records), &params).unwrap();
        assert_eq!(summary, AnomalySummary::NoAnomalies);
    }

    #[test]
    fn test_empty_dataset_is_insufficient() {
        let err = detect_anomalies(&Dataset::default(), &ForestParams::default()).unwrap_err();
        assert!(matches!(err, DetectError::InsufficientData { rows: 0, .. }));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let mut records = typical_dataset(28);
        records[5].spend = 9_000.0;
        let dataset = Dataset::new(records);

        let first = detect_anomalies(&dataset, &ForestParams::default()).unwrap();
        let second = detect_anomalies(&dataset, &ForestParams::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_summary_sorted_by_count_then_location() {
        let a = flagged("Miami", 0, 100.0);
        let b = flagged("Miami", 3, 200.0);
        let c = flagged("Denver", 1, 50.0);
        let d = flagged("Austin", 2, 75.0);
        let anomalies = vec![&c, &a, &d, &b];

        let rows = summarize_by_location(&anomalies);

        let order: Vec<_> = rows.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(order, vec!["Miami", "Austin", "Denver"]);
        assert_eq!(rows[0].anomaly_count, 2);
        assert_eq!(rows[0].avg_anomaly_spend, 150.0);
        assert_eq!(rows[0].first_date, a.record.date);
        assert_eq!(rows[0].last_date, b.record.date);
    }

    #[test]
    fn test_mean_spend_is_rounded() {
        let a = flagged("Miami", 0, 10.0);
        let b = flagged("Miami", 1, 10.0);
        let c = flagged("Miami", 2, 10.01);

        let rows = summarize_by_location(&[&a, &b, &c]);
        assert_eq!(rows[0].avg_anomaly_spend, 10.0);
    }
}
