//! Error types for each pipeline stage.

use crate::models::{AnomalySummary, WeeklyBucket};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Aggregate,
    Detect,
    Enrich,
    Narrate,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "ingest"),
            Stage::Aggregate => write!(f, "aggregate"),
            Stage::Detect => write!(f, "detect"),
            Stage::Enrich => write!(f, "enrich"),
            Stage::Narrate => write!(f, "narrate"),
            Stage::Render => write!(f, "render"),
        }
    }
}

/// Input file does not match the expected schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Anomaly detection could not run.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Insufficient data: need at least 1 row and 1 feature, got {rows} row(s) and {features} feature(s)")]
    InsufficientData { rows: usize, features: usize },

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// The context provider failed to produce a description.
#[derive(Debug, Error)]
#[error("Context lookup failed for {location}: {message}")]
pub struct ContextError {
    pub location: String,
    pub message: String,
}

/// The text-generation service could not produce a narrative.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API key not configured")]
    MissingCredential,

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Response(String),
}

/// The report document could not be written.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A failure that terminated a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[{}] schema validation failed: {0}", Stage::Ingest)]
    Schema(#[from] SchemaError),

    #[error("[{}] {0}", Stage::Detect)]
    Detect(#[from] DetectError),

    /// Rendering failed after the analytical results were computed.
    #[error("[{}] {source}", Stage::Render)]
    Render {
        #[source]
        source: RenderError,
        weekly: Vec<WeeklyBucket>,
        anomalies: AnomalySummary,
    },
}

impl PipelineError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Schema(_) => Stage::Ingest,
            PipelineError::Detect(_) => Stage::Detect,
            PipelineError::Render { .. } => Stage::Render,
        }
    }
}
