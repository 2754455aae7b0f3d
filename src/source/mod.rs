//! Record loading.
//!
//! The engine never touches files directly: tracks hand it a
//! [`RecordSource`]. The bundled implementation reads delimited text
//! exports; a missing or unparsable file surfaces as
//! [`ReportError::SourceUnavailable`].

use crate::error::{ReportError, Result};
use crate::models::{Record, Value};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Anything that can produce the raw rows of one export.
pub trait RecordSource: Send + Sync {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    /// Loads every row in source order.
    fn load(&self) -> Result<Vec<Record>>;
}

/// Comma-separated export with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<Record>> {
        load_csv(&self.path)
    }
}

/// Interprets one raw cell: blank is missing, finite numbers are numeric,
/// everything else stays text.
pub fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ => Value::Text(raw.to_string()),
    }
}

fn unavailable(path: &Path, reason: impl ToString) -> ReportError {
    ReportError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Reads a CSV file into records keyed by the header row.
///
/// Short rows are padded with missing cells so every record carries every
/// header.
pub fn load_csv(path: &Path) -> Result<Vec<Record>> {
    if !path.is_file() {
        return Err(unavailable(path, "file not found"));
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| unavailable(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| unavailable(path, e))?
        .iter()
        .map(String::from)
        .collect();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| unavailable(path, format!("row {}: {}", line + 1, e)))?;
        records.push(Record::from_pairs(headers.iter().enumerate().map(|(index, header)| {
            let value = row.get(index).map(parse_cell).unwrap_or(Value::Missing);
            (header.clone(), value)
        })));
    }

    debug!(
        "Loaded {} records with {} columns from {}",
        records.len(),
        headers.len(),
        path.display()
    );
    Ok(records)
}

/// Finds every `.csv` file below `dir`, sorted by path.
pub fn discover_pool_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(unavailable(dir, "directory not found"));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();

    files.sort();
    info!("Found {} pool files in {}", files.len(), dir.display());
    Ok(files)
}
