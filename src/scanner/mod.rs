//! Dataset discovery for batch runs.
//!
//! Finds CSV files in an input directory so each one can be processed
//! in turn. Only the top level of the directory is scanned.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Suffix appended to generated report file stems.
pub const REPORT_SUFFIX: &str = "_Report";

/// Find dataset files directly inside `dir`, sorted by path.
pub fn find_datasets(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow::anyhow!("Not a directory: {}", dir.display()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry =
            entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        let path = entry.path();

        if !entry.file_type().is_file() || !is_dataset(path) {
            debug!("Skipping {}", path.display());
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Check if a path looks like an input dataset.
fn is_dataset(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    // Hidden files
    if name.starts_with('.') {
        return false;
    }

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let is_report = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(REPORT_SUFFIX));

    is_csv && !is_report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_datasets_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("week_b.csv"), "").unwrap();
        std::fs::write(root.join("week_a.CSV"), "").unwrap();
        std::fs::write(root.join("notes.txt"), "").unwrap();
        std::fs::write(root.join(".hidden.csv"), "").unwrap();
        std::fs::write(root.join("week_a_Report.csv"), "").unwrap();
        std::fs::create_dir(root.join("nested")).unwrap();
        std::fs::write(root.join("nested").join("deep.csv"), "").unwrap();

        let files = find_datasets(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["week_a.CSV", "week_b.csv"]);
    }

    #[test]
    fn test_find_datasets_requires_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.csv");
        std::fs::write(&file, "").unwrap();

        assert!(find_datasets(&file).is_err());
    }
}
