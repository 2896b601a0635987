//! Prompt construction for the analyst narrative.

use crate::models::AnomalySummary;
use serde::Serialize;

/// Word ceiling the narrative must respect.
pub const MAX_WORDS: usize = 100;

const PERSONA: &str = "SYSTEM INSTRUCTION: You are a **Senior Data Analyst**. Your response must be \
extremely concise, professional, and actionable. Your analysis must not exceed 100 words. \
Do not include any titles or introductory phrases like 'Senior Data Analyst:'.";

const FEW_SHOT: &str = "FEW-SHOT EXAMPLE:
Input: Anomalies detected in Location: Dallas, Avg_Anomaly_Spend: $500. External Context: Local \
sports team won a championship, leading to high consumer spending but low campaign-specific conversions.
Output: Dallas showed an unexpected spending spike (+15%) paired with suppressed conversions. This \
correlates with major local sporting events diverting user attention. **Actionable Insight:** Pause \
non-event-related campaigns immediately during major local events to conserve budget.";

const TASK: &str = "TASK: Write a 1-paragraph explanation of the detected anomaly, correlating the \
performance drop (or spike) with the external context. Focus on the 'why' and end with one clear, \
concrete recommended action.";

#[derive(Debug, Serialize)]
struct PromptRow<'a> {
    #[serde(rename = "Location")]
    location: &'a str,
    #[serde(rename = "Anomaly_Count")]
    anomaly_count: usize,
    #[serde(rename = "Avg_Anomaly_Spend")]
    avg_anomaly_spend: f64,
    #[serde(rename = "First_Date")]
    first_date: String,
    #[serde(rename = "Last_Date")]
    last_date: String,
}

/// Row-oriented JSON encoding of the anomaly summary.
pub fn summary_json(summary: &AnomalySummary) -> String {
    let rows: Vec<PromptRow<'_>> = summary
        .rows()
        .iter()
        .map(|r| PromptRow {
            location: &r.location,
            anomaly_count: r.anomaly_count,
            avg_anomaly_spend: r.avg_anomaly_spend,
            first_date: r.first_date.to_string(),
            last_date: r.last_date.to_string(),
        })
        .collect();

    serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
}

/// Build the single prompt sent to the text generator.
pub fn build_prompt(summary: &AnomalySummary, context: &str) -> String {
    format!(
        "{PERSONA}\n\n{FEW_SHOT}\n\nCURRENT DATA:\n\
         Performance Anomalies (JSON Summary): {}\n\
         Correlated External Data (Weather/Context): {}\n\n{TASK}",
        summary_json(summary),
        context
    )
}
