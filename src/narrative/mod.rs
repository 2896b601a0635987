//! Natural-language explanation of detected anomalies.
//!
//! The narrative is produced by an external text generator from a single
//! structured prompt. Generation never fails the pipeline: a missing
//! credential or a failed call yields a clearly labeled placeholder.

pub mod gemini;
pub mod prompt;

pub use gemini::{GeminiConfig, GeminiGenerator};
pub use prompt::{build_prompt, MAX_WORDS};

use crate::error::{GenerationError, Stage};
use crate::models::AnomalySummary;
use async_trait::async_trait;
use tracing::{info, warn};

/// Narrative used when no credential is configured.
pub const MISSING_CREDENTIAL_PLACEHOLDER: &str =
    "AI Analysis placeholder: GEMINI_API_KEY not set. Cannot run analysis.";

/// Narrative used when the generator call fails.
pub fn failure_placeholder(error: &GenerationError) -> String {
    format!(
        "AI Analysis failed. Please check your API key and connection. Error: {}",
        error
    )
}

/// External text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model or service name, for logging.
    fn name(&self) -> &str;

    /// Generate a plain-text response to `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

enum Backend {
    Unconfigured,
    Broken(GenerationError),
    Ready(Box<dyn TextGenerator>),
}

/// Turns an anomaly summary and its context into a bounded narrative.
pub struct NarrativeGenerator {
    backend: Backend,
    max_words: usize,
}

impl NarrativeGenerator {
    /// Use the given text generator.
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            backend: Backend::Ready(generator),
            max_words: MAX_WORDS,
        }
    }

    /// No credential available: every narrative is the placeholder.
    pub fn unconfigured() -> Self {
        Self {
            backend: Backend::Unconfigured,
            max_words: MAX_WORDS,
        }
    }

    /// Build a Gemini-backed generator when a credential is present.
    pub fn gemini(config: GeminiConfig, api_key: Option<String>) -> Self {
        let Some(key) = api_key.filter(|k| !k.trim().is_empty()) else {
            info!("No text-generation credential configured, narrative will be a placeholder");
            return Self::unconfigured();
        };

        match GeminiGenerator::new(config, key) {
            Ok(generator) => Self::new(Box::new(generator)),
            Err(e) => {
                warn!("[{}] Text generator misconfigured: {}", Stage::Narrate, e);
                Self {
                    backend: Backend::Broken(e),
                    max_words: MAX_WORDS,
                }
            }
        }
    }

    /// Whether a real generator will be called.
    pub fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    /// Produce the narrative. Makes at most one generator call.
    pub async fn generate(&self, summary: &AnomalySummary, context: &str) -> String {
        let generator = match &self.backend {
            Backend::Unconfigured => return MISSING_CREDENTIAL_PLACEHOLDER.to_string(),
            Backend::Broken(e) => return failure_placeholder(e),
            Backend::Ready(generator) => generator,
        };

        let prompt = build_prompt(summary, context);
        info!("Requesting narrative from {}", generator.name());

        match generator.generate(&prompt).await {
            Ok(text) => enforce_word_limit(text.trim(), self.max_words),
            Err(e) => {
                warn!("[{}] Narrative generation failed: {}", Stage::Narrate, e);
                failure_placeholder(&e)
            }
        }
    }
}

/// Truncate `text` to at most `max_words` words.
pub fn enforce_word_limit(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }

    warn!(
        "Narrative has {} words, truncating to {}",
        words.len(),
        max_words
    );
    format!("{}…", words[..max_words].join(" "))
}
