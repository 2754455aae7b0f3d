//! Table rendering and persistence.
//!
//! Renders abstract [`Table`]s as CSV, JSON or Markdown, writes them into
//! the output directory, and produces the Markdown run summary.

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::models::{RunSummary, Table, TrackSummary};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Render a table as CSV with a header row.
pub fn render_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Render a table as pretty-printed JSON.
pub fn render_json(table: &Table) -> Result<String> {
    Ok(serde_json::to_string_pretty(table)?)
}

fn escape_markdown(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

/// Render a table as a Markdown document with one table.
pub fn render_markdown(table: &Table) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", table.name));

    if table.headers.is_empty() {
        return output;
    }

    let headers: Vec<String> = table.headers.iter().map(|h| escape_markdown(h)).collect();
    output.push_str(&format!("| {} |\n", headers.join(" | ")));
    output.push_str(&format!("|{}\n", ":---|".repeat(headers.len())));

    for row in &table.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| escape_markdown(&cell.to_string()))
            .collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if table.rows.is_empty() {
        output.push_str("\n*No rows.*\n");
    }

    output
}

/// Render a table in the requested format.
pub fn render_table(table: &Table, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Csv => render_csv(table),
        OutputFormat::Json => render_json(table),
        OutputFormat::Markdown => Ok(render_markdown(table)),
    }
}

/// File name for a table: unsafe characters become underscores.
pub fn file_name_for(name: &str, format: OutputFormat) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.{}", stem, format.extension())
}

/// Atomically replace `path` with `content`.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write every table of one report.
///
/// All tables are rendered before the first file is touched, so a rendering
/// failure leaves the output directory unchanged.
pub fn write_tables(dir: &Path, tables: &[Table], format: OutputFormat) -> Result<Vec<PathBuf>> {
    let mut rendered = Vec::with_capacity(tables.len());
    for table in tables {
        let path = dir.join(file_name_for(&table.name, format));
        rendered.push((path, render_table(table, format)?));
    }

    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(rendered.len());
    for (path, content) in rendered {
        write_atomic(&path, &content)?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Generate the Markdown run summary.
pub fn generate_run_summary(summary: &RunSummary) -> String {
    let mut output = String::new();

    output.push_str("# TrackStats Run Summary\n\n");
    output.push_str(&generate_metadata_section(summary));
    output.push_str(&generate_overview_section(&summary.tracks));

    for track in &summary.tracks {
        output.push_str(&generate_track_section(track));
    }

    output.push_str(&generate_failures_section(&summary.tracks));

    output.push_str("---\n\n");
    output.push_str("*Generated by TrackStats*\n");

    output
}

fn generate_metadata_section(summary: &RunSummary) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Output Directory:** `{}`\n", summary.output_dir));
    section.push_str(&format!("- **Format:** {}\n", summary.format));
    section.push_str(&format!("- **Tracks:** {}\n", summary.tracks.len()));
    section.push_str(&format!("- **Files Written:** {}\n", summary.files_written()));
    if summary.failures() > 0 {
        section.push_str(&format!("- **Failures:** {}\n", summary.failures()));
    }
    section.push_str(&format!("- **Duration:** {:.1}s\n", summary.duration_seconds));
    section.push('\n');

    section
}

fn generate_overview_section(tracks: &[TrackSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Tracks\n\n");
    section.push_str("| Track | Source | Reports | Files | Status |\n");
    section.push_str("|:---|:---|:---:|:---:|:---:|\n");
    for track in tracks {
        let status = if track.failures() == 0 { "OK" } else { "FAILED" };
        section.push_str(&format!(
            "| {} | `{}` | {} | {} | {} |\n",
            track.name,
            track.source,
            track.reports.len(),
            track.files_written(),
            status
        ));
    }
    section.push('\n');

    section
}

fn generate_track_section(track: &TrackSummary) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", track.name));

    if let Some(ref error) = track.error {
        section.push_str(&format!("Track aborted: {}\n\n", error));
        return section;
    }

    for report in &track.reports {
        match report.error {
            Some(ref error) => {
                section.push_str(&format!("- **{}**: failed ({})\n", report.name, error));
            }
            None => {
                let files: Vec<String> = report.files.iter().map(|f| format!("`{}`", f)).collect();
                section.push_str(&format!("- **{}**: {}\n", report.name, files.join(", ")));
            }
        }
    }
    section.push('\n');

    section
}

fn generate_failures_section(tracks: &[TrackSummary]) -> String {
    let failures: Vec<String> = tracks
        .iter()
        .flat_map(|track| {
            let track_error = track
                .error
                .iter()
                .map(move |error| format!("{}: {}", track.name, error));
            let report_errors = track.reports.iter().filter_map(move |report| {
                report
                    .error
                    .as_ref()
                    .map(|error| format!("{} / {}: {}", track.name, report.name, error))
            });
            track_error.chain(report_errors)
        })
        .collect();

    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Failures\n\n");
    for (i, failure) in failures.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, failure));
    }
    section.push('\n');

    section
}
