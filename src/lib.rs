//! AdPulse - weekly ad-spend trends and anomaly reports.
//!
//! Reads campaign performance CSVs, aggregates spend by week with
//! week-over-week change, flags outlier records with a seeded isolation
//! forest, explains the top anomaly with an LLM and renders a report
//! next to the input file.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod ingest;
pub mod models;
pub mod narrative;
pub mod pipeline;
pub mod report;
pub mod scanner;

pub use error::{PipelineError, Stage};
pub use models::{AnomalySummary, Dataset, LocationAnomaly, Record, WeeklyBucket};
pub use pipeline::{Artifacts, Pipeline, PipelineConfig, PipelineOutput};
