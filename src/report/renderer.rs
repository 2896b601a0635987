//! Document rendering.
//!
//! Renderers turn a [`ReportDocument`] into markup and write it to disk.
//! HTML is the default; Markdown and JSON are available for pipelines
//! that post-process the report.

use crate::error::RenderError;
use crate::models::{ReportDocument, WeeklyRow};
use std::path::Path;
use tracing::info;

/// Writes a report document to durable storage.
pub trait DocumentRenderer: Send + Sync {
    /// File extension of the produced document (without the dot).
    fn extension(&self) -> &'static str;

    /// Render the document to markup.
    fn render_to_string(&self, document: &ReportDocument) -> Result<String, RenderError>;

    /// Render and write the document to `path`.
    fn render(&self, document: &ReportDocument, path: &Path) -> Result<(), RenderError> {
        let content = self.render_to_string(document)?;
        std::fs::write(path, content).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

/// Styled, self-contained HTML document.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

/// GitHub-flavored Markdown document.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

/// Pretty-printed JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

const HTML_STYLE: &str = "body { font-family: Arial, sans-serif; padding: 20px; }
h1 { color: #007bff; border-bottom: 2px solid #eee; padding-bottom: 10px; }
h2 { color: #333; margin-top: 20px; }
.analysis { background-color: #f8f9fa; padding: 15px; border-radius: 5px; }
table { width: 100%; border-collapse: collapse; margin-top: 15px; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
.footer { margin-top: 40px; font-size: 0.8em; color: #777; }";

impl DocumentRenderer for HtmlRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render_to_string(&self, document: &ReportDocument) -> Result<String, RenderError> {
        let mut output = String::new();
        let title = escape_html(&document.title);

        output.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        output.push_str(&format!("<title>{}</title>\n", title));
        output.push_str(&format!("<style>\n{}\n</style>\n</head>\n<body>\n", HTML_STYLE));
        output.push_str(&format!("<h1>📊 {}</h1>\n", title));
        output.push_str(&format!(
            "<p>Source: <code>{}</code></p>\n",
            escape_html(&document.source_name)
        ));

        output.push_str("<h2>🤖 AI Analyst Summary</h2>\n");
        output.push_str(&format!(
            "<div class=\"analysis\">\n<p>{}</p>\n</div>\n",
            emphasize_html(&escape_html(&document.narrative))
        ));

        output.push_str("<h2>📈 Week-over-Week Spend Change</h2>\n");
        output.push_str(&generate_html_table(&document.weekly_rows));

        output.push_str(&format!(
            "<div class=\"footer\">\n<p>Report generated by automated pipeline: {}</p>\n</div>\n",
            document.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str("</body>\n</html>\n");

        Ok(output)
    }
}

fn generate_html_table(rows: &[WeeklyRow]) -> String {
    let mut table = String::new();
    table.push_str("<table>\n<thead>\n");
    table.push_str("<tr><th>Week Starting</th><th>Weekly Spend</th><th>WoW Change %</th></tr>\n");
    table.push_str("</thead>\n<tbody>\n");

    if rows.is_empty() {
        table.push_str("<tr><td colspan=\"3\">No data for this period.</td></tr>\n");
    }
    for row in rows {
        table.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            row.week_start, row.weekly_spend, row.wow_change
        ));
    }

    table.push_str("</tbody>\n</table>\n");
    table
}

impl DocumentRenderer for MarkdownRenderer {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn render_to_string(&self, document: &ReportDocument) -> Result<String, RenderError> {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", document.title));
        output.push_str(&format!("- **Source:** `{}`\n", document.source_name));
        output.push_str(&format!(
            "- **Generated:** {}\n\n",
            document.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        output.push_str("## AI Analyst Summary\n\n");
        output.push_str(&format!("> {}\n\n", document.narrative.replace('\n', "\n> ")));

        output.push_str("## Week-over-Week Spend Change\n\n");
        output.push_str(&generate_markdown_table(&document.weekly_rows));

        output.push_str("---\n\n");
        output.push_str("*Report generated by automated pipeline*\n");

        Ok(output)
    }
}

fn generate_markdown_table(rows: &[WeeklyRow]) -> String {
    if rows.is_empty() {
        return "No data for this period.\n\n".to_string();
    }

    let mut table = String::new();
    table.push_str("| Week Starting | Weekly Spend | WoW Change % |\n");
    table.push_str("|:---|---:|---:|\n");
    for row in rows {
        table.push_str(&format!(
            "| {} | {} | {} |\n",
            row.week_start, row.weekly_spend, row.wow_change
        ));
    }
    table.push('\n');
    table
}

impl DocumentRenderer for JsonRenderer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render_to_string(&self, document: &ReportDocument) -> Result<String, RenderError> {
        serde_json::to_string_pretty(document).map_err(Into::into)
    }
}

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Turn `**bold**` spans from generated text into `<strong>` tags.
fn emphasize_html(text: &str) -> String {
    let parts: Vec<&str> = text.split("**").collect();
    // Unbalanced markers are left as-is
    if parts.len() % 2 == 0 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for (i, part) in parts.iter().enumerate() {
        if i % 2 == 1 {
            out.push_str("<strong>");
            out.push_str(part);
            out.push_str("</strong>");
        } else {
            out.push_str(part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_document() -> ReportDocument {
        ReportDocument {
            title: "Weekly Performance Report".to_string(),
            source_name: "march.csv".to_string(),
            narrative: "**Miami** spiked <sharply>. Pause spend.".to_string(),
            weekly_rows: vec![
                WeeklyRow {
                    week_start: "2024-03-04".to_string(),
                    weekly_spend: "$700.00".to_string(),
                    wow_change: "N/A".to_string(),
                },
                WeeklyRow {
                    week_start: "2024-03-11".to_string(),
                    weekly_spend: "$5600.00".to_string(),
                    wow_change: "700.00%".to_string(),
                },
            ],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_html_report() {
        let html = HtmlRenderer.render_to_string(&create_test_document()).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Weekly Performance Report</title>"));
        assert!(html.contains("<strong>Miami</strong> spiked &lt;sharply&gt;."));
        assert!(html.contains("<tr><td>2024-03-04</td><td>$700.00</td><td>N/A</td></tr>"));
        assert!(html.contains("700.00%"));
        assert!(html.contains("Report generated by automated pipeline"));
    }

    #[test]
    fn test_markdown_report() {
        let markdown = MarkdownRenderer
            .render_to_string(&create_test_document())
            .unwrap();

        assert!(markdown.contains("# Weekly Performance Report"));
        assert!(markdown.contains("## AI Analyst Summary"));
        assert!(markdown.contains("| 2024-03-11 | $5600.00 | 700.00% |"));
    }

    #[test]
    fn test_json_report() {
        let json = JsonRenderer.render_to_string(&create_test_document()).unwrap();

        assert!(json.contains("\"weekly_rows\""));
        assert!(json.contains("\"narrative\""));
    }

    #[test]
    fn test_empty_table() {
        let mut document = create_test_document();
        document.weekly_rows.clear();

        let html = HtmlRenderer.render_to_string(&document).unwrap();
        assert!(html.contains("No data for this period."));
        let markdown = MarkdownRenderer.render_to_string(&document).unwrap();
        assert!(markdown.contains("No data for this period."));
    }

    #[test]
    fn test_html_table_keeps_row_order() {
        let table = generate_html_table(&create_test_document().weekly_rows);

        let first = table.find("2024-03-04").unwrap();
        let second = table.find("2024-03-11").unwrap();
        assert!(first < second);
        assert!(table.starts_with("<table>"));
        assert!(table.ends_with("</table>\n"));
        assert!(!table.contains("No data for this period."));
    }

    #[test]
    fn test_emphasis_requires_balanced_markers() {
        assert_eq!(emphasize_html("a **b** c"), "a <strong>b</strong> c");
        assert_eq!(emphasize_html("a **b c"), "a **b c");
    }

    #[test]
    fn test_render_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("march_Report.html");

        HtmlRenderer.render(&create_test_document(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Week-over-Week"));
    }

    #[test]
    fn test_render_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("report.html");

        let err = HtmlRenderer.render(&create_test_document(), &path).unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}
