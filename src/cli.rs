//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::report::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// AdPulse - weekly ad-spend trends and anomaly reports
///
/// Aggregates campaign spend by week, flags outlier records with an
/// isolation forest and writes a report with an AI-written explanation.
///
/// Examples:
///   adpulse --input data/march.csv
///   adpulse --input data/march.csv --format markdown --contamination 0.1
///   adpulse --input-dir data/ --fail-on-anomaly
///   adpulse --input data/march.csv --dry-run --export artifacts.json
///   adpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV dataset to analyze
    ///
    /// Required columns: Date, Campaign_ID, Spend, Impressions, Conversions, Location.
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["input_dir", "init_config"],
        conflicts_with = "input_dir"
    )]
    pub input: Option<PathBuf>,

    /// Analyze every CSV dataset in a directory, one after another
    ///
    /// Hidden files and previously generated *_Report files are skipped.
    #[arg(long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .adpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report format (html, markdown, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Report title
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Expected fraction of anomalous records (0.0 - 0.5)
    #[arg(long, value_name = "RATE")]
    pub contamination: Option<f64>,

    /// Seed for the outlier model
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Gemini model used for the narrative
    #[arg(short, long, env = "ADPULSE_MODEL")]
    pub model: Option<String>,

    /// Gemini API key
    ///
    /// Without a key the report is still produced with a placeholder narrative.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Request timeout in seconds for the narrative call
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write the weekly table and anomaly summary as JSON to this file
    #[arg(long, value_name = "FILE", conflicts_with = "input_dir")]
    pub export: Option<PathBuf>,

    /// Dry run: print the weekly table and anomalies without calling the
    /// text generator or writing a report
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when any anomaly is found
    ///
    /// Useful for scheduled jobs that alert on failure.
    #[arg(long)]
    pub fail_on_anomaly: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .adpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(contamination) = self.contamination {
            if !(0.0..=0.5).contains(&contamination) {
                return Err("Contamination must be between 0.0 and 0.5".to_string());
            }
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if let Some(ref dir) = self.input_dir {
            if !dir.exists() {
                return Err(format!("Input directory does not exist: {}", dir.display()));
            }
            if !dir.is_dir() {
                return Err(format!("Input path is not a directory: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `[general] verbose` value from the config file;
    /// `--quiet` wins over both.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
