//! Weekly spend aggregation and week-over-week change.
//!
//! Records are bucketed into calendar weeks starting on Monday. Only
//! weeks that contain data produce a bucket, and change is always
//! computed against the chronologically preceding bucket.

use crate::models::{Dataset, WeeklyBucket};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change from `previous` to `current`, rounded to 2 decimals.
///
/// Undefined (None) when there is no usable baseline.
pub fn pct_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() {
        return None;
    }
    let change = round2((current / previous - 1.0) * 100.0);
    change.is_finite().then_some(change)
}

/// Sum spend per week, ascending by week start.
pub fn aggregate_weekly(dataset: &Dataset) -> Vec<WeeklyBucket> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for record in dataset.records() {
        *totals.entry(week_start(record.date)).or_default() += record.spend;
    }

    let mut buckets = Vec::with_capacity(totals.len());
    let mut previous: Option<f64> = None;

    for (week_start, weekly_spend) in totals {
        let wow_change_pct = previous.and_then(|prev| pct_change(prev, weekly_spend));
        buckets.push(WeeklyBucket {
            week_start,
            weekly_spend,
            wow_change_pct,
        });
        previous = Some(weekly_spend);
    }

    debug!("Aggregated {} weekly bucket(s)", buckets.len());
    buckets
}

/// Week with the largest absolute change, if any change is defined.
pub fn largest_swing(buckets: &[WeeklyBucket]) -> Option<&WeeklyBucket> {
    buckets
        .iter()
        .filter(|b| b.wow_change_pct.is_some())
        .max_by(|a, b| {
            let a = a.wow_change_pct.unwrap_or(0.0).abs();
            let b = b.wow_change_pct.unwrap_or(0.0).abs();
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(day: NaiveDate, spend: f64) -> Record {
        Record {
            date: day,
            campaign_id: 1,
            spend,
            impressions: 1000,
            conversions: 10,
            location: "Miami".to_string(),
        }
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-03-04 is a Monday
        assert_eq!(week_start(date(2024, 3, 4)), date(2024, 3, 4));
        assert_eq!(week_start(date(2024, 3, 7)), date(2024, 3, 4));
        assert_eq!(week_start(date(2024, 3, 10)), date(2024, 3, 4));
        assert_eq!(week_start(date(2024, 3, 11)), date(2024, 3, 11));
    }

    #[test]
    fn test_empty_dataset_gives_no_buckets() {
        assert!(aggregate_weekly(&Dataset::default()).is_empty());
    }

    #[test]
    fn test_buckets_are_chronological_regardless_of_input_order() {
        let dataset = Dataset::new(vec![
            record(date(2024, 3, 20), 300.0),
            record(date(2024, 3, 5), 100.0),
            record(date(2024, 3, 12), 200.0),
            record(date(2024, 3, 6), 100.0),
        ]);

        let buckets = aggregate_weekly(&dataset);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].week_start, date(2024, 3, 4));
        assert_eq!(buckets[0].weekly_spend, 200.0);
        assert_eq!(buckets[0].wow_change_pct, None);
        assert_eq!(buckets[1].wow_change_pct, Some(0.0));
        assert_eq!(buckets[2].wow_change_pct, Some(50.0));
    }

    #[test]
    fn test_empty_weeks_are_skipped() {
        let dataset = Dataset::new(vec![
            record(date(2024, 3, 4), 100.0),
            record(date(2024, 3, 25), 150.0),
        ]);

        let buckets = aggregate_weekly(&dataset);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].week_start, date(2024, 3, 25));
        assert_eq!(buckets[1].wow_change_pct, Some(50.0));
    }

    #[test]
    fn test_zero_previous_week_is_undefined() {
        let dataset = Dataset::new(vec![
            record(date(2024, 3, 4), 0.0),
            record(date(2024, 3, 11), 120.0),
            record(date(2024, 3, 18), 0.0),
        ]);

        let buckets = aggregate_weekly(&dataset);

        assert_eq!(buckets[1].wow_change_pct, None);
        // A drop to zero is a real -100%, not undefined
        assert_eq!(buckets[2].wow_change_pct, Some(-100.0));
    }

    #[test]
    fn test_change_is_rounded() {
        assert_eq!(pct_change(3.0, 4.0), Some(33.33));
        assert_eq!(pct_change(3.0, 2.0), Some(-33.33));
        assert_eq!(pct_change(0.0, 2.0), None);
    }

    #[test]
    fn test_change_unaffected_by_scaling() {
        let spends = [120.0, 95.5, 310.25, 42.0];
        let build = |factor: f64| {
            Dataset::new(
                spends
                    .iter()
                    .enumerate()
                    .map(|(i, s)| record(date(2024, 1, 1) + Duration::weeks(i as i64), s * factor))
                    .collect(),
            )
        };

        let base: Vec<_> = aggregate_weekly(&build(1.0))
            .into_iter()
            .map(|b| b.wow_change_pct)
            .collect();
        let scaled: Vec<_> = aggregate_weekly(&build(7.5))
            .into_iter()
            .map(|b| b.wow_change_pct)
            .collect();

        assert_eq!(base, scaled);
    }

    #[test]
    fn test_largest_swing() {
        let dataset = Dataset::new(vec![
            record(date(2024, 3, 4), 100.0),
            record(date(2024, 3, 11), 150.0),
            record(date(2024, 3, 18), 30.0),
        ]);
        let buckets = aggregate_weekly(&dataset);

        let swing = largest_swing(&buckets).unwrap();
        assert_eq!(swing.week_start, date(2024, 3, 18));
        assert_eq!(swing.wow_change_pct, Some(-80.0));
        assert!(largest_swing(&buckets[..1]).is_none());
    }
}
