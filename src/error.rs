//! Error types for the report engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while loading sources, computing or persisting reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(
        "group '{group}': representative row {index} for field '{field}' is out of range (group has {len} rows)"
    )]
    RepresentativeOutOfRange {
        group: String,
        field: String,
        index: usize,
        len: usize,
    },
    #[error("group '{group}': field '{field}' is absent from every record")]
    UnknownField { group: String, field: String },
    #[error("source '{}' is unavailable: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Faults caused by a report definition that does not fit its data.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            ReportError::RepresentativeOutOfRange { .. } | ReportError::UnknownField { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
