//! Report assembly, rendering and the track runner.

pub mod assembler;
pub mod generator;

pub use assembler::{assemble_scholarship, assemble_track, ReportSpec};
pub use generator::{generate_run_summary, write_atomic, write_tables};

use crate::cli::OutputFormat;
use crate::config::{ScholarshipConfig, TrackConfig, SCHOLARSHIP_TRACK};
use crate::error::Result;
use crate::models::{ReportStatus, Table, TrackSummary};
use crate::source::{CsvSource, RecordSource};
use futures::future::join_all;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// One independent unit of work.
#[derive(Debug, Clone)]
pub enum TrackJob {
    Track(TrackConfig),
    Scholarship(ScholarshipConfig),
}

impl TrackJob {
    pub fn name(&self) -> &str {
        match self {
            TrackJob::Track(track) => &track.name,
            TrackJob::Scholarship(_) => SCHOLARSHIP_TRACK,
        }
    }

    /// Runs the job to completion and writes its outputs.
    pub fn run(&self, output_dir: &Path, format: OutputFormat) -> TrackSummary {
        match self {
            TrackJob::Track(track) => {
                let source = CsvSource::new(&track.source);
                run_track(track, &source, output_dir, format)
            }
            TrackJob::Scholarship(config) => run_scholarship(config, output_dir, format),
        }
    }
}

fn persist(name: &str, tables: Result<Vec<Table>>, output_dir: &Path, format: OutputFormat) -> ReportStatus {
    let written = tables.and_then(|tables| write_tables(output_dir, &tables, format));

    match written {
        Ok(paths) => ReportStatus {
            name: name.to_string(),
            files: paths.iter().map(|p| display_name(p)).collect(),
            error: None,
        },
        Err(e) => {
            if e.is_configuration_fault() {
                error!("Report '{}' aborted: {}", name, e);
            } else {
                error!("Report '{}' could not be written: {}", name, e);
            }
            ReportStatus {
                name: name.to_string(),
                files: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Runs every report of a track against `source`.
///
/// Reports are computed first, then written one by one; a failing report
/// leaves the others untouched.
pub fn run_track(
    track: &TrackConfig,
    source: &dyn RecordSource,
    output_dir: &Path,
    format: OutputFormat,
) -> TrackSummary {
    let results = match assemble_track(track, source) {
        Ok(results) => results,
        Err(e) => {
            error!("Track '{}' failed: {}", track.name, e);
            return TrackSummary::failed(&track.name, source.describe(), e);
        }
    };

    let reports = results
        .into_iter()
        .map(|result| persist(&result.name, result.tables, output_dir, format))
        .collect();

    let summary = TrackSummary {
        name: track.name.clone(),
        source: source.describe(),
        reports,
        error: None,
    };
    info!(
        "Track '{}': {} files written, {} failures",
        summary.name,
        summary.files_written(),
        summary.failures()
    );
    summary
}

/// Builds and writes the awardee submission history.
pub fn run_scholarship(config: &ScholarshipConfig, output_dir: &Path, format: OutputFormat) -> TrackSummary {
    let source = config.roster.display().to_string();
    match assemble_scholarship(config) {
        Ok(table) => TrackSummary {
            name: SCHOLARSHIP_TRACK.to_string(),
            source,
            reports: vec![persist(&config.name, Ok(vec![table]), output_dir, format)],
            error: None,
        },
        Err(e) => {
            error!("Scholarship report failed: {}", e);
            TrackSummary::failed(SCHOLARSHIP_TRACK, source, e)
        }
    }
}

/// Runs jobs on the blocking pool, concurrently or one at a time.
///
/// Summaries come back in job order either way.
pub async fn run_jobs(
    jobs: Vec<TrackJob>,
    output_dir: PathBuf,
    format: OutputFormat,
    parallel: bool,
    progress: ProgressBar,
) -> Vec<TrackSummary> {
    let spawn = |job: TrackJob| {
        let output_dir = output_dir.clone();
        let progress = progress.clone();
        async move {
            let name = job.name().to_string();
            progress.set_message(name.clone());
            let handle = tokio::task::spawn_blocking(move || job.run(&output_dir, format));
            let summary = match handle.await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!("Track '{}' task did not complete: {}", name, e);
                    TrackSummary::failed(&name, "", e)
                }
            };
            progress.inc(1);
            summary
        }
    };

    if parallel {
        join_all(jobs.into_iter().map(spawn)).await
    } else {
        let mut summaries = Vec::with_capacity(jobs.len());
        for job in jobs {
            summaries.push(spawn(job).await);
        }
        summaries
    }
}
