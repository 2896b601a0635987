//! Situational context for detected anomalies.
//!
//! The enricher asks a [`ContextProvider`] what was going on at the
//! location and dates of the top anomaly. The bundled provider is a
//! static lookup; real data sources plug in behind the same trait.

use crate::error::{ContextError, Stage};
use crate::models::AnomalySummary;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Context text used when there is nothing to explain.
pub const NO_CONTEXT_NEEDED: &str = "No anomalies detected, no external context needed.";

/// Inclusive range of days an anomaly covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

/// Which context source to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Built-in fixed lookup
    #[default]
    Static,
}

/// Source of auxiliary context for a location and period.
pub trait ContextProvider: Send + Sync {
    /// Describe conditions at `location` during `window`.
    fn lookup_context(&self, location: &str, window: DateWindow) -> Result<String, ContextError>;
}

/// Fixed lookup standing in for an external weather/events feed.
#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    overrides: HashMap<String, String>,
}

impl StaticContextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use fixed texts for specific locations.
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }
}

impl ContextProvider for StaticContextProvider {
    fn lookup_context(&self, location: &str, window: DateWindow) -> Result<String, ContextError> {
        if let Some(text) = self.overrides.get(location) {
            return Ok(text.clone());
        }

        Ok(format!(
            "External data shows that on {} in **{}**, there was a severe thunderstorm warning, \
             often correlated with low foot traffic and reduced ad conversion rates.",
            window, location
        ))
    }
}

/// Produce the context text for an anomaly summary.
///
/// Provider failures do not abort the run; a fallback text is returned instead.
pub fn enrich(summary: &AnomalySummary, provider: &dyn ContextProvider) -> String {
    let Some(top) = summary.top() else {
        debug!("No anomalies, skipping context lookup");
        return NO_CONTEXT_NEEDED.to_string();
    };

    let window = DateWindow {
        start: top.first_date,
        end: top.last_date,
    };

    match provider.lookup_context(&top.location, window) {
        Ok(text) => {
            debug!("Context for {} ({}) resolved", top.location, window);
            text
        }
        Err(e) => {
            warn!("[{}] {}", Stage::Enrich, e);
            format!("External context unavailable for {}.", top.location)
        }
    }
}
