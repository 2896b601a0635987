//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.adpulse.toml` files.

use crate::analysis::ForestParams;
use crate::context::ProviderKind;
use crate::narrative::GeminiConfig;
use crate::report::{OutputFormat, DEFAULT_TITLE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".adpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Outlier model settings.
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Text-generation model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Context lookup settings.
    #[serde(default)]
    pub context: ContextConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Isolation forest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Expected fraction of outlier rows.
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Seed for the model's random number generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of trees.
    #[serde(default = "default_estimators")]
    pub n_estimators: usize,

    /// Rows sampled per tree.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            seed: default_seed(),
            n_estimators: default_estimators(),
            max_samples: default_max_samples(),
        }
    }
}

fn default_contamination() -> f64 {
    0.05
}

fn default_seed() -> u64 {
    42
}

fn default_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

impl From<&DetectorConfig> for ForestParams {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_samples: config.max_samples,
            contamination: config.contamination,
            seed: config.seed,
        }
    }
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the generation API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_base_url: default_api_base_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    120
}

impl From<&ModelConfig> for GeminiConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.clone(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rendered document format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Document title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            title: default_title(),
        }
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// Static context lookup settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Context source.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Fixed context text per location.
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load `.adpulse.toml` from `dir` if it exists.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);

        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings when provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(contamination) = args.contamination {
            self.detector.contamination = contamination;
        }
        if let Some(seed) = args.seed {
            self.detector.seed = seed;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref title) = args.title {
            self.report.title = title.clone();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
