//! AdPulse - weekly ad-spend trends and anomaly reports
//!
//! A CLI tool that aggregates campaign spend by week, flags outlier
//! records and writes a report with an AI-written explanation next to
//! each input dataset.
//!
//! Exit codes:
//!   0 - Success (no anomalies, or no --fail-on-anomaly set)
//!   1 - Runtime error (schema, config, render failure, etc.)
//!   2 - Anomalies found while --fail-on-anomaly is set

use adpulse::analysis::largest_swing;
use adpulse::cli::Args;
use adpulse::config::{Config, CONFIG_FILE_NAME};
use adpulse::report::{format_change, format_currency};
use adpulse::{ingest, scanner, Artifacts, Pipeline, PipelineConfig, PipelineError};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the file can raise verbosity
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("AdPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Input: {:?}, input dir: {:?}", args.input, args.input_dir);

    match run(args, config).await {
        Ok(code) => {
            std::process::exit(code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .adpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the detector, model, report format, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(level: Level) {
    let filter = log_filter(level, std::env::var("RUST_LOG").ok().as_deref());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// `RUST_LOG` directives when set and valid, else the verbosity level.
fn log_filter(level: Level, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("Ignoring invalid RUST_LOG: {}", e),
        }
    }
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

/// Run every requested dataset. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let datasets = collect_datasets(&args)?;
    if datasets.is_empty() {
        println!("   No CSV datasets found.");
        return Ok(0);
    }

    let pipeline = Pipeline::new(PipelineConfig::from_config(&config, args.api_key.clone()));

    if args.dry_run {
        return handle_dry_run(&pipeline, &datasets, &args);
    }

    if !args.quiet {
        println!(
            "⚙️  Detector: contamination {}, seed {}",
            config.detector.contamination, config.detector.seed
        );
        if pipeline.narrator_configured() {
            println!("🤖 Narrative model: {}", config.model.name);
        } else {
            println!("🤖 Narrative: placeholder (no GEMINI_API_KEY)");
        }
    }

    let mut failures = 0;
    let mut anomalies_found = false;

    // One dataset at a time; a failure does not stop the batch
    for path in &datasets {
        println!("\n📥 Processing {}", path.display());

        let spinner = start_spinner(args.quiet, "Analyzing and writing report...");
        let result = pipeline.run_file(path).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match result {
            Ok(output) => {
                print_artifacts(&output.artifacts);
                anomalies_found |= !output.artifacts.anomalies.is_empty();

                if let Some(ref export) = args.export {
                    export_artifacts(&output.artifacts, export)?;
                }
                println!("✅ Report saved to: {}", output.report_path.display());
            }
            Err(e) => {
                failures += 1;
                report_failure(path, &e);
            }
        }
    }

    println!(
        "\n📊 Processed {} dataset(s), {} failed, in {:.1}s",
        datasets.len(),
        failures,
        start_time.elapsed().as_secs_f64()
    );

    Ok(exit_code(failures, anomalies_found, args.fail_on_anomaly))
}

/// 1 if any dataset failed, 2 for anomalies under --fail-on-anomaly, else 0.
fn exit_code(failures: usize, anomalies_found: bool, fail_on_anomaly: bool) -> i32 {
    if failures > 0 {
        return 1;
    }

    if fail_on_anomaly && anomalies_found {
        eprintln!("\n⛔ Anomalies found. Failing (exit code 2).");
        return 2;
    }

    0
}

/// Handle --dry-run: analyze without narration or rendering.
fn handle_dry_run(pipeline: &Pipeline, datasets: &[PathBuf], args: &Args) -> Result<i32> {
    println!("\n🔍 Dry run: no text generation, no report written\n");

    let mut failures = 0;
    let mut anomalies_found = false;
    for path in datasets {
        println!("📥 {}", path.display());

        let result = ingest::load_csv(path)
            .map_err(PipelineError::from)
            .and_then(|dataset| pipeline.analyze(&dataset));

        match result {
            Ok(artifacts) => {
                print_artifacts(&artifacts);
                anomalies_found |= !artifacts.anomalies.is_empty();
                if let Some(ref export) = args.export {
                    export_artifacts(&artifacts, export)?;
                }
                println!(
                    "   Report would be written to: {}\n",
                    pipeline.report_path_for(path).display()
                );
            }
            Err(e) => {
                failures += 1;
                report_failure(path, &e);
            }
        }
    }

    println!("✅ Dry run complete. No text-generation calls were made.");
    Ok(exit_code(failures, anomalies_found, args.fail_on_anomaly))
}

fn start_spinner(quiet: bool, message: &'static str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn print_artifacts(artifacts: &Artifacts) {
    println!("   Weekly spend:");
    if artifacts.weekly.is_empty() {
        println!("     (no data)");
    }
    for bucket in &artifacts.weekly {
        println!(
            "     {}  {:>12}  {:>9}",
            bucket.week_start,
            format_currency(bucket.weekly_spend),
            format_change(bucket.wow_change_pct)
        );
    }
    if let Some(swing) = largest_swing(&artifacts.weekly) {
        println!(
            "   Largest swing: week of {} ({})",
            swing.week_start,
            format_change(swing.wow_change_pct)
        );
    }

    println!("   Anomalies: {}", artifacts.anomalies);
    for row in artifacts.anomalies.rows() {
        println!(
            "     📍 {}: {} record(s), avg spend {} ({} to {})",
            row.location,
            row.anomaly_count,
            format_currency(row.avg_anomaly_spend),
            row.first_date,
            row.last_date
        );
    }
}

fn export_artifacts(artifacts: &Artifacts, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(artifacts).context("Failed to serialize artifacts")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write artifacts to {}", path.display()))?;
    println!("💾 Artifacts exported to: {}", path.display());
    Ok(())
}

fn report_failure(path: &Path, e: &PipelineError) {
    error!("{}: {}", path.display(), e);
    eprintln!("❌ {} failed at stage '{}': {}", path.display(), e.stage(), e);

    // Analytics survive a render failure
    if let PipelineError::Render {
        weekly, anomalies, ..
    } = e
    {
        print_artifacts(&Artifacts {
            weekly: weekly.clone(),
            anomalies: anomalies.clone(),
        });
    }
}

/// Resolve the datasets to process from --input or --input-dir.
fn collect_datasets(args: &Args) -> Result<Vec<PathBuf>> {
    if let Some(ref dir) = args.input_dir {
        let datasets = scanner::find_datasets(dir)?;
        info!("Found {} dataset(s) in {}", datasets.len(), dir.display());
        return Ok(datasets);
    }

    Ok(args.input.iter().cloned().collect())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location; a file that exists but does not parse is fatal
    Ok(Config::load_default()?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(0, false, false), 0);
        assert_eq!(exit_code(0, true, false), 0);
        assert_eq!(exit_code(0, true, true), 2);
        assert_eq!(exit_code(1, true, true), 1);
    }

    #[test]
    fn test_log_filter_uses_level() {
        let filter = log_filter(Level::WARN, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_log_filter_prefers_rust_log() {
        let filter = log_filter(Level::INFO, Some("trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

        let filter = log_filter(Level::ERROR, Some("  "));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }
}
