//! Track report assembly.
//!
//! Every submission track (papers, tutorials, workshops) follows the same
//! sequence: load the export, canonicalize it with the track's alias table,
//! then run the configured report steps. The scholarship track instead joins
//! an awardee roster against several years of paper exports. This module
//! only sequences those calls; the computations live in `canonical` and
//! `analysis`.

use crate::analysis::{
    aggregate, cross_tab, distribution, issues_table, per_group_cross_tab, roster_from_records,
    select, validate, Filter, IdentityMatcher, NamedRule, PoolYear, SubmissionPool,
};
use crate::canonical::{canonicalize, normalize_headers};
use crate::config::{ScholarshipConfig, TrackConfig};
use crate::error::Result;
use crate::models::{Record, Table};
use crate::source::{discover_pool_files, CsvSource, RecordSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One named report of a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSpec {
    /// One row per entity with the aggregated columns of `rules`.
    Summary {
        name: String,
        group_key: String,
        rules: Vec<NamedRule>,
    },
    /// Counts of `rows` x `columns`, optionally over a filtered subset.
    CrossTab {
        name: String,
        rows: String,
        columns: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_column: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Filter>,
    },
    /// One cross tab per distinct `split_by` value, named `{name}_{value}`.
    PerGroupCrossTab {
        name: String,
        split_by: String,
        rows: String,
        columns: String,
    },
    /// Share of unique `key` entities per `field` value.
    Distribution {
        name: String,
        key: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Filter>,
    },
    /// Rows missing any of the `required` columns.
    Validate { name: String, required: Vec<String> },
}

impl ReportSpec {
    pub fn name(&self) -> &str {
        match self {
            ReportSpec::Summary { name, .. }
            | ReportSpec::CrossTab { name, .. }
            | ReportSpec::PerGroupCrossTab { name, .. }
            | ReportSpec::Distribution { name, .. }
            | ReportSpec::Validate { name, .. } => name,
        }
    }
}

/// Result of one report: its tables, or the fault that aborted it.
#[derive(Debug)]
pub struct ReportResult {
    pub name: String,
    pub tables: Result<Vec<Table>>,
}

/// Computes the tables of one report over canonicalized records.
pub fn build_report(spec: &ReportSpec, records: &[Record]) -> Result<Vec<Table>> {
    debug!("Building report '{}'", spec.name());

    let tables = match spec {
        ReportSpec::Summary {
            name,
            group_key,
            rules,
        } => {
            let summaries = aggregate(records, group_key, rules)?;
            vec![Table::from_summaries(name, group_key, &summaries)]
        }
        ReportSpec::CrossTab {
            name,
            rows,
            columns,
            total_column,
            filter,
        } => {
            let subset = select(records, filter.as_ref());
            let mut table = cross_tab(subset, rows, columns);
            if table.is_empty() {
                warn!("{}: no record carries both '{}' and '{}'", name, rows, columns);
            } else {
                debug!("{}: {} records tabulated", name, table.total());
            }
            if let Some(total) = total_column {
                table = table.with_total_column(total);
            }
            vec![Table::from_contingency(name, &table)]
        }
        ReportSpec::PerGroupCrossTab {
            name,
            split_by,
            rows,
            columns,
        } => per_group_cross_tab(records, split_by, rows, columns)
            .into_iter()
            .map(|(group, table)| Table::from_contingency(format!("{}_{}", name, group), &table))
            .collect(),
        ReportSpec::Distribution {
            name,
            key,
            field,
            filter,
        } => {
            let subset = select(records, filter.as_ref());
            vec![distribution(subset, key, field).to_table(name)]
        }
        ReportSpec::Validate { name, required } => {
            let issues = validate(records, required);
            if !issues.is_empty() {
                info!("{}: {} rows with missing required values", name, issues.len());
            }
            vec![issues_table(name, &issues)]
        }
    };

    Ok(tables)
}

/// Loads, canonicalizes and runs every report of a track.
///
/// A source failure aborts the whole track. A fault in one report only
/// aborts that report.
pub fn assemble_track(track: &TrackConfig, source: &dyn RecordSource) -> Result<Vec<ReportResult>> {
    info!("Track '{}': loading {}", track.name, source.describe());
    let raw = source.load()?;
    if track.aliases.is_empty() {
        warn!("Track '{}' has no aliases; using export names as-is", track.name);
    }
    let records = canonicalize(&raw, &track.aliases);

    Ok(track
        .reports
        .iter()
        .map(|spec| ReportResult {
            name: spec.name().to_string(),
            tables: build_report(spec, &records),
        })
        .collect())
}

/// Builds the awardee submission history table.
pub fn assemble_scholarship(config: &ScholarshipConfig) -> Result<Table> {
    let roster_records = normalize_headers(&CsvSource::new(&config.roster).load()?);
    let roster = roster_from_records(&roster_records, &config.roster_fields);

    let mut years = Vec::new();
    for pool in &config.pools {
        let raw = CsvSource::new(&pool.path).load()?;
        years.push(PoolYear {
            year: pool.year.clone(),
            records: canonicalize(&raw, &config.aliases),
        });
    }
    if let Some(dir) = &config.pool_dir {
        for path in discover_pool_files(dir)? {
            let raw = CsvSource::new(&path).load()?;
            years.push(PoolYear {
                year: None,
                records: canonicalize(&raw, &config.aliases),
            });
        }
    }

    let pool = SubmissionPool::build(years, &config.fields);
    if pool.is_empty() {
        warn!("Submission pool is empty; every awardee will be reported as not submitted");
    }
    info!(
        "Matching {} awardees against {} submission rows",
        roster.len(),
        pool.len()
    );

    let matcher = IdentityMatcher::new(config.fields.clone(), config.authorship.clone());
    let history = matcher.match_roster(&roster, &pool);

    Ok(Table::from_history(&config.name, &history))
}
