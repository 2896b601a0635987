//! CSV ingestion with strict schema enforcement.
//!
//! Input files carry one row per campaign/day with the columns
//! `Date, Campaign_ID, Spend, Impressions, Conversions, Location`.
//! Anything that does not conform is rejected before analysis starts.

use crate::error::SchemaError;
use crate::models::{Dataset, Record};
use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Columns every input file must provide.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Date",
    "Campaign_ID",
    "Spend",
    "Impressions",
    "Conversions",
    "Location",
];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Campaign_ID")]
    campaign_id: i64,
    #[serde(rename = "Spend")]
    spend: f64,
    #[serde(rename = "Impressions")]
    impressions: u64,
    #[serde(rename = "Conversions")]
    conversions: u64,
    #[serde(rename = "Location")]
    location: String,
}

/// Load a dataset from a CSV file on disk.
pub fn load_csv(path: &Path) -> Result<Dataset, SchemaError> {
    let file = std::fs::File::open(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let dataset = read_csv(file)?;
    info!(
        "Ingested {} record(s) from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Parse a dataset from any CSV reader.
pub fn read_csv<R: Read>(input: R) -> Result<Dataset, SchemaError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Row 1 is the first data row after the header.
        let row = index + 1;
        let raw = result.map_err(|e| SchemaError::InvalidRow {
            row,
            message: e.to_string(),
        })?;
        records.push(validate_row(row, raw)?);
    }

    debug!("Parsed {} CSV row(s)", records.len());
    Ok(Dataset::new(records))
}

fn validate_row(row: usize, raw: CsvRow) -> Result<Record, SchemaError> {
    if !raw.spend.is_finite() || raw.spend < 0.0 {
        return Err(SchemaError::InvalidRow {
            row,
            message: format!("Spend must be a non-negative number, got {}", raw.spend),
        });
    }

    if raw.location.is_empty() {
        return Err(SchemaError::InvalidRow {
            row,
            message: "Location must not be empty".to_string(),
        });
    }

    Ok(Record {
        date: raw.date,
        campaign_id: raw.campaign_id,
        spend: raw.spend,
        impressions: raw.impressions,
        conversions: raw.conversions,
        location: raw.location,
    })
}
