//! Pipeline orchestration.
//!
//! Runs aggregation, detection, enrichment, narration and rendering for
//! one dataset, strictly in that order. Every collaborator with side
//! effects is injected so the whole run can be exercised with fakes.

use crate::analysis::{aggregate_weekly, detect_anomalies, ForestParams};
use crate::config::Config;
use crate::context::{enrich, ContextProvider, ProviderKind, StaticContextProvider};
use crate::error::{PipelineError, Stage};
use crate::ingest;
use crate::models::{AnomalySummary, Dataset, WeeklyBucket};
use crate::narrative::{GeminiConfig, NarrativeGenerator};
use crate::report::{assemble, report_path, DocumentRenderer, OutputFormat, DEFAULT_TITLE};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything a run needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub forest: ForestParams,
    pub title: String,
    pub format: OutputFormat,
    pub model: GeminiConfig,
    /// Text-generation credential; `None` yields a placeholder narrative.
    pub api_key: Option<String>,
    pub context_provider: ProviderKind,
    pub context_overrides: HashMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            forest: ForestParams::default(),
            title: DEFAULT_TITLE.to_string(),
            format: OutputFormat::default(),
            model: GeminiConfig::default(),
            api_key: None,
            context_provider: ProviderKind::default(),
            context_overrides: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Build from the loaded configuration file and the credential.
    pub fn from_config(config: &Config, api_key: Option<String>) -> Self {
        Self {
            forest: ForestParams::from(&config.detector),
            title: config.report.title.clone(),
            format: config.report.format,
            model: GeminiConfig::from(&config.model),
            api_key,
            context_provider: config.context.provider,
            context_overrides: config.context.overrides.clone(),
        }
    }
}

/// The analytical results of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifacts {
    pub weekly: Vec<WeeklyBucket>,
    pub anomalies: AnomalySummary,
}

/// Results of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub artifacts: Artifacts,
    /// Where the rendered report was written.
    pub report_path: PathBuf,
}

/// Sequences the stages for one dataset at a time.
pub struct Pipeline {
    forest: ForestParams,
    title: String,
    context_provider: Box<dyn ContextProvider>,
    narrator: NarrativeGenerator,
    renderer: Box<dyn DocumentRenderer>,
}

impl Pipeline {
    /// Wire the default collaborators from `config`.
    pub fn new(config: PipelineConfig) -> Self {
        let provider: Box<dyn ContextProvider> = match config.context_provider {
            ProviderKind::Static => {
                Box::new(StaticContextProvider::with_overrides(config.context_overrides))
            }
        };
        let narrator = NarrativeGenerator::gemini(config.model, config.api_key);
        let renderer = config.format.renderer();

        Self::with_collaborators(
            config.forest,
            config.title,
            provider,
            narrator,
            renderer,
        )
    }

    /// Use explicit collaborators.
    pub fn with_collaborators(
        forest: ForestParams,
        title: String,
        context_provider: Box<dyn ContextProvider>,
        narrator: NarrativeGenerator,
        renderer: Box<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            forest,
            title,
            context_provider,
            narrator,
            renderer,
        }
    }

    /// Whether narratives will come from a real text generator.
    pub fn narrator_configured(&self) -> bool {
        self.narrator.is_configured()
    }

    /// Where the report for `source` will be written.
    pub fn report_path_for(&self, source: &Path) -> PathBuf {
        report_path(source, self.renderer.extension())
    }

    /// Weekly aggregation and anomaly detection only.
    pub fn analyze(&self, dataset: &Dataset) -> Result<Artifacts, PipelineError> {
        debug!("[{}] {} record(s)", Stage::Aggregate, dataset.len());
        let weekly = aggregate_weekly(dataset);
        info!("Aggregated {} week(s)", weekly.len());

        debug!("[{}] fitting outlier model", Stage::Detect);
        let anomalies = detect_anomalies(dataset, &self.forest)?;

        Ok(Artifacts { weekly, anomalies })
    }

    /// Run every stage for `dataset`, writing the report next to `source`.
    pub async fn run(
        &self,
        dataset: &Dataset,
        source: &Path,
    ) -> Result<PipelineOutput, PipelineError> {
        let artifacts = self.analyze(dataset)?;

        debug!("[{}] looking up context", Stage::Enrich);
        let context = enrich(&artifacts.anomalies, self.context_provider.as_ref());

        debug!("[{}] generating narrative", Stage::Narrate);
        let narrative = self.narrator.generate(&artifacts.anomalies, &context).await;

        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let document = assemble(
            &self.title,
            &source_name,
            &artifacts.weekly,
            &narrative,
            Utc::now(),
        );

        let path = self.report_path_for(source);
        debug!("[{}] writing {}", Stage::Render, path.display());
        if let Err(source) = self.renderer.render(&document, &path) {
            return Err(PipelineError::Render {
                source,
                weekly: artifacts.weekly,
                anomalies: artifacts.anomalies,
            });
        }

        Ok(PipelineOutput {
            artifacts,
            report_path: path,
        })
    }

    /// Load a CSV file and run the pipeline on it.
    pub async fn run_file(&self, path: &Path) -> Result<PipelineOutput, PipelineError> {
        debug!("[{}] reading {}", Stage::Ingest, path.display());
        let dataset = ingest::load_csv(path)?;
        self.run(&dataset, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DateWindow;
    use crate::error::{ContextError, GenerationError, RenderError};
    use crate::models::{Record, ReportDocument};
    use crate::narrative::TextGenerator;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    type Log = Arc<Mutex<Vec<String>>>;

    struct RecordingProvider(Log);

    impl ContextProvider for RecordingProvider {
        fn lookup_context(
            &self,
            location: &str,
            _window: DateWindow,
        ) -> Result<String, ContextError> {
            self.0.lock().unwrap().push(format!("context:{location}"));
            Ok(format!("Storm in {location}."))
        }
    }

    struct RecordingGenerator(Log);

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            let context_seen = prompt.contains("Storm in");
            self.0.lock().unwrap().push(format!("narrate:{context_seen}"));
            Ok("**Dallas** overspent during a storm. Pause bidding.".to_string())
        }
    }

    struct RecordingRenderer {
        log: Log,
        documents: Arc<Mutex<Vec<ReportDocument>>>,
        fail: bool,
    }

    impl DocumentRenderer for RecordingRenderer {
        fn extension(&self) -> &'static str {
            "txt"
        }

        fn render_to_string(&self, document: &ReportDocument) -> Result<String, RenderError> {
            Ok(document.narrative.clone())
        }

        fn render(&self, document: &ReportDocument, path: &Path) -> Result<(), RenderError> {
            self.log.lock().unwrap().push("render".to_string());
            self.documents.lock().unwrap().push(document.clone());
            if self.fail {
                return Err(RenderError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            Ok(())
        }
    }

    fn dataset() -> Dataset {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let records = (0..14u32)
            .map(|i| {
                let spend = if i == 9 { 5000.0 } else { 100.0 + i as f64 };
                Record {
                    date: start + chrono::Duration::days(i as i64),
                    campaign_id: 1,
                    spend,
                    impressions: 1000 + i as u64,
                    conversions: 10,
                    location: if i == 9 { "Dallas" } else { "Austin" }.to_string(),
                }
            })
            .collect();
        Dataset::new(records)
    }

    fn pipeline(log: &Log, documents: &Arc<Mutex<Vec<ReportDocument>>>, fail: bool) -> Pipeline {
        Pipeline::with_collaborators(
            ForestParams::default(),
            DEFAULT_TITLE.to_string(),
            Box::new(RecordingProvider(log.clone())),
            NarrativeGenerator::new(Box::new(RecordingGenerator(log.clone()))),
            Box::new(RecordingRenderer {
                log: log.clone(),
                documents: documents.clone(),
                fail,
            }),
        )
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let log: Log = Arc::default();
        let documents = Arc::default();
        let pipeline = pipeline(&log, &documents, false);

        let output = pipeline
            .run(&dataset(), Path::new("/data/march.csv"))
            .await
            .unwrap();

        assert_eq!(output.artifacts.weekly.len(), 2);
        assert_eq!(output.artifacts.anomalies.top().unwrap().location, "Dallas");
        assert_eq!(output.report_path, PathBuf::from("/data/march_Report.txt"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["context:Dallas", "narrate:true", "render"]
        );

        let documents = documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source_name, "march.csv");
        assert_eq!(documents[0].weekly_rows[0].wow_change, "N/A");
        assert!(documents[0].narrative.contains("Pause bidding"));
    }

    #[tokio::test]
    async fn test_unconfigured_narrator_still_renders() {
        let log: Log = Arc::default();
        let documents: Arc<Mutex<Vec<ReportDocument>>> = Arc::default();
        let pipeline = Pipeline::with_collaborators(
            ForestParams::default(),
            DEFAULT_TITLE.to_string(),
            Box::new(RecordingProvider(log.clone())),
            NarrativeGenerator::unconfigured(),
            Box::new(RecordingRenderer {
                log: log.clone(),
                documents: documents.clone(),
                fail: false,
            }),
        );

        pipeline
            .run(&dataset(), Path::new("march.csv"))
            .await
            .unwrap();

        let documents = documents.lock().unwrap();
        assert_eq!(
            documents[0].narrative,
            crate::narrative::MISSING_CREDENTIAL_PLACEHOLDER
        );
    }

    #[tokio::test]
    async fn test_render_failure_keeps_artifacts() {
        let log: Log = Arc::default();
        let documents = Arc::default();
        let pipeline = pipeline(&log, &documents, true);

        let err = pipeline
            .run(&dataset(), Path::new("march.csv"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Render);
        match err {
            PipelineError::Render {
                weekly, anomalies, ..
            } => {
                assert_eq!(weekly.len(), 2);
                assert!(!anomalies.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_dataset_fails_at_detect() {
        let log: Log = Arc::default();
        let documents = Arc::default();
        let pipeline = pipeline(&log, &documents, false);

        let err = pipeline
            .run(&Dataset::default(), Path::new("empty.csv"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Detect);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_file_writes_report() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("spend.csv");
        let mut csv = String::from("Date,Campaign_ID,Spend,Impressions,Conversions,Location\n");
        for record in dataset().records() {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                record.date,
                record.campaign_id,
                record.spend,
                record.impressions,
                record.conversions,
                record.location
            ));
        }
        std::fs::write(&csv_path, csv).unwrap();

        let config = PipelineConfig {
            format: OutputFormat::Markdown,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config);
        assert!(!pipeline.narrator_configured());

        let output = pipeline.run_file(&csv_path).await.unwrap();

        assert_eq!(output.report_path, temp_dir.path().join("spend_Report.md"));
        let report = std::fs::read_to_string(&output.report_path).unwrap();
        assert!(report.contains("GEMINI_API_KEY not set"));
        assert!(report.contains("| 2024-03-04 |"));
    }

    #[test]
    fn test_config_from_file_settings() {
        let mut config = Config::default();
        config.detector.seed = 11;
        config.report.title = "Pulse".to_string();
        config
            .context
            .overrides
            .insert("Miami".to_string(), "Heatwave.".to_string());

        let pipeline_config = PipelineConfig::from_config(&config, Some("key".to_string()));

        assert_eq!(pipeline_config.forest.seed, 11);
        assert_eq!(pipeline_config.title, "Pulse");
        assert_eq!(pipeline_config.api_key.as_deref(), Some("key"));
        assert_eq!(pipeline_config.context_overrides.len(), 1);
        assert!(Pipeline::new(pipeline_config).narrator_configured());
    }

    #[tokio::test]
    async fn test_run_file_missing_column_fails_at_ingest() {
        let temp_dir = TempDir::new().unwrap();
        let csv_path = temp_dir.path().join("bad.csv");
        std::fs::write(&csv_path, "Date,Spend\n2024-03-04,10\n").unwrap();

        let err = Pipeline::new(PipelineConfig::default())
            .run_file(&csv_path)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Ingest);
        assert!(!temp_dir.path().join("bad_Report.html").exists());
    }
}
