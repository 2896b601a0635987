//! Analytical stages: weekly aggregation and anomaly detection.

pub mod aggregator;
pub mod detector;
pub mod isolation_forest;

pub use aggregator::{aggregate_weekly, largest_swing};
pub use detector::{detect_anomalies, label_records};
pub use isolation_forest::{ForestParams, IsolationForest};
