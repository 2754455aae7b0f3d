//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `trackstats.toml` files. The file carries everything that changes from
//! one conference year to the next: source paths, alias tables and the
//! report rule tables of every track.

use crate::analysis::{AuthorshipPolicy, MatchFields, RosterFields};
use crate::cli::OutputFormat;
use crate::models::AliasTable;
use crate::report::ReportSpec;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "trackstats.toml";

/// Track name that selects the scholarship report with `--track`.
pub const SCHOLARSHIP_TRACK: &str = "scholarship";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Submission tracks (papers, tutorials, workshops).
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,

    /// Awardee submission history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scholarship: Option<ScholarshipConfig>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory receiving every output file.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Output file format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Run tracks concurrently.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
            verbose: false,
            parallel: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_true() -> bool {
    true
}

/// One submission track: a source export, its alias table and its reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    pub name: String,

    /// Path of the exported CSV file.
    pub source: PathBuf,

    /// External to internal names, applied to headers and values.
    #[serde(default)]
    pub aliases: AliasTable,

    /// Reports in output order.
    #[serde(default)]
    pub reports: Vec<ReportSpec>,
}

/// A pool file with an optional explicit submission year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSource {
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

/// Awardee roster joined against several years of paper exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarshipConfig {
    /// Output table name.
    #[serde(default = "default_scholarship_name")]
    pub name: String,

    /// Awardee roster CSV.
    pub roster: PathBuf,

    /// Directory scanned for additional pool files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_dir: Option<PathBuf>,

    /// Explicit pool files, pooled before any `pool_dir` files.
    #[serde(default)]
    pub pools: Vec<PoolSource>,

    #[serde(default)]
    pub aliases: AliasTable,

    #[serde(default)]
    pub fields: MatchFields,

    #[serde(default)]
    pub roster_fields: RosterFields,

    #[serde(default)]
    pub authorship: AuthorshipPolicy,
}

impl Default for ScholarshipConfig {
    fn default() -> Self {
        Self {
            name: default_scholarship_name(),
            roster: PathBuf::new(),
            pool_dir: None,
            pools: Vec::new(),
            aliases: AliasTable::default(),
            fields: MatchFields::default(),
            roster_fields: RosterFields::default(),
            authorship: AuthorshipPolicy::default(),
        }
    }
}

fn default_scholarship_name() -> String {
    "ScholarshipsAwardeeSubmissions".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. `--track`
    /// keeps only the named tracks and fails on unknown names.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) -> Result<()> {
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.clone();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.sequential {
            self.general.parallel = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if !args.track.is_empty() {
            for requested in &args.track {
                let known = requested == SCHOLARSHIP_TRACK
                    || self.tracks.iter().any(|track| &track.name == requested);
                if !known {
                    bail!("Unknown track '{}'", requested);
                }
            }
            self.tracks.retain(|track| args.track.contains(&track.name));
            if !args.track.iter().any(|name| name == SCHOLARSHIP_TRACK) {
                self.scholarship = None;
            }
        }

        Ok(())
    }

    /// Checks names that end up as file names.
    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() && self.scholarship.is_none() {
            bail!("Configuration defines no tracks");
        }

        let mut track_names = HashSet::new();
        for track in &self.tracks {
            if track.name.trim().is_empty() {
                bail!("Track with source {} has no name", track.source.display());
            }
            if track.name == SCHOLARSHIP_TRACK {
                bail!("Track name '{}' is reserved", SCHOLARSHIP_TRACK);
            }
            if !track_names.insert(track.name.as_str()) {
                bail!("Duplicate track name '{}'", track.name);
            }

            let mut report_names = HashSet::new();
            for report in &track.reports {
                if report.name().trim().is_empty() {
                    bail!("Track '{}' has a report without a name", track.name);
                }
                if !report_names.insert(report.name()) {
                    bail!("Track '{}' has duplicate report '{}'", track.name, report.name());
                }
            }
        }

        Ok(())
    }

    /// A complete configuration for a papers track and the scholarship
    /// report, used by `--init-config`.
    pub fn example() -> Self {
        use crate::analysis::{AggregationRule, Filter, NamedRule};

        let paper_aliases: AliasTable = [
            ("Main_Subcommittee_Category", "Assigned_Subcommittee"),
            ("Primary_Contact_-_Country", "Origin_Country"),
            ("How_would_you_label_your_submission?", "Org_Type"),
            ("Review_Status", "Abstract_Accept_Reject"),
            ("Would_you_want_to_Birddog_this_Abstract_to_Paper?", "Birddog_Volunteer"),
            ("Comments_for_Birddog_(for_author_feedback)", "Comments_for_Birddog"),
            ("Comments_for_the_Subcommittee_(reviewers)", "Comments_for_Subcommittee"),
            ("Initial Acceptance at Abstract Stage", "Abstract_Accepted"),
            ("Initial Rejection at Abstract Stage", "Abstract_Rejected"),
            ("Education", "ED"),
            ("Training", "TR"),
            ("Simulation", "SIM"),
        ]
        .into_iter()
        .collect();

        let count = |output: &str, equals: &str| {
            NamedRule::new(
                output,
                AggregationRule::CountWhere {
                    field: "Acceptance".to_string(),
                    equals: equals.to_string(),
                },
            )
        };

        let review_summary = ReportSpec::Summary {
            name: "Papers_Abstract_Reviews_Summary".to_string(),
            group_key: "ID".to_string(),
            rules: vec![
                NamedRule::new(
                    "Title",
                    AggregationRule::Representative {
                        field: "Title".to_string(),
                        index: 0,
                    },
                ),
                NamedRule::new(
                    "Assigned_Subcommittee",
                    AggregationRule::Representative {
                        field: "Assigned_Subcommittee".to_string(),
                        index: 0,
                    },
                ),
                NamedRule::new(
                    "Birddog_Volunteers",
                    AggregationRule::ConcatWhere {
                        fields: vec!["ReviewerLastname".to_string(), "ReviewerFirstname".to_string()],
                        separator: ",".to_string(),
                        where_field: "Birddog_Volunteer".to_string(),
                        equals: "Yes".to_string(),
                    },
                ),
                count("Num_Accepts", "Accept"),
                count("Num_Rejects", "Reject"),
                count("Num_Discuss", "Discuss"),
                NamedRule::new(
                    "Mean_Substance_Rating",
                    AggregationRule::Mean {
                        field: "Substance_Rating".to_string(),
                    },
                ),
                NamedRule::new(
                    "Comments_for_Birddog",
                    AggregationRule::FilteredList {
                        field: "Comments_for_Birddog".to_string(),
                    },
                ),
                NamedRule::new(
                    "Comments_for_Subcommittee",
                    AggregationRule::FilteredList {
                        field: "Comments_for_Subcommittee".to_string(),
                    },
                ),
            ],
        };

        let papers = TrackConfig {
            name: "papers".to_string(),
            source: PathBuf::from("data/papers_abstract_reviews.csv"),
            aliases: paper_aliases.clone(),
            reports: vec![
                ReportSpec::Validate {
                    name: "Papers_Missing_Values".to_string(),
                    required: vec!["ID".to_string(), "Assigned_Subcommittee".to_string()],
                },
                review_summary,
                ReportSpec::CrossTab {
                    name: "Papers_Subcommittee_Accept_Reject".to_string(),
                    rows: "Assigned_Subcommittee".to_string(),
                    columns: "Abstract_Accept_Reject".to_string(),
                    total_column: Some("Total".to_string()),
                    filter: None,
                },
                ReportSpec::CrossTab {
                    name: "Papers_Accepted_ByCountry".to_string(),
                    rows: "Origin_Country".to_string(),
                    columns: "Assigned_Subcommittee".to_string(),
                    total_column: Some("Abstract_Accepted".to_string()),
                    filter: Some(Filter::new("Abstract_Accept_Reject", "Abstract_Accepted")),
                },
                ReportSpec::PerGroupCrossTab {
                    name: "Papers_Accept_Reject_ByOrg".to_string(),
                    split_by: "Assigned_Subcommittee".to_string(),
                    rows: "Org_Type".to_string(),
                    columns: "Abstract_Accept_Reject".to_string(),
                },
                ReportSpec::Distribution {
                    name: "Papers_Submissions_ByOrgType".to_string(),
                    key: "ID".to_string(),
                    field: "Org_Type".to_string(),
                    filter: None,
                },
            ],
        };

        let scholarship = ScholarshipConfig {
            roster: PathBuf::from("data/scholarship_awardees.csv"),
            pool_dir: Some(PathBuf::from("data/paper_pools")),
            aliases: [
                ("Initial Acceptance at Abstract Stage", "Abstract_Accepted"),
                ("Initial Rejection at Abstract Stage", "Abstract_Rejected"),
                ("Final Acceptance at Paper Review", "Paper_Accepted"),
                ("Final Rejection at Paper Review", "Paper_Rejected"),
                ("Subcommittee_Category", "Subcommittee"),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };

        Config {
            general: GeneralConfig::default(),
            tracks: vec![papers],
            scholarship: Some(scholarship),
        }
    }

    /// Generate the example configuration file content.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::example()).context("Failed to serialize example config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;

    fn make_args() -> Args {
        Args {
            config: None,
            output_dir: None,
            format: None,
            track: Vec::new(),
            sequential: false,
            dry_run: false,
            init_config: false,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output_dir, PathBuf::from("reports"));
        assert_eq!(config.general.format, OutputFormat::Csv);
        assert!(config.general.parallel);
        assert!(config.tracks.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "out"
format = "json"

[[tracks]]
name = "tutorials"
source = "tutorials.csv"

[tracks.aliases]
"Desired_Room_Setup" = "Room_Type"
"Provisional Acceptance of Tutorial Proposal" = "Proposal_Accepted"

[[tracks.reports]]
kind = "summary"
name = "Tutorial_Reviews"
group_key = "ID"

[[tracks.reports.rules]]
output = "Mean_Alignment"
rule = "mean"
field = "Alignment"

[[tracks.reports]]
kind = "cross_tab"
name = "Tutorial_Room_Types"
rows = "Room_Type"
columns = "Accept_Reject"

[scholarship]
roster = "awardees.csv"
pools = [{ path = "papers_2023.csv", year = "2023" }]

[scholarship.authorship]
policy = "explicit_column"
field = "Author_Order"
equals = "1"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, PathBuf::from("out"));
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(config.general.parallel);

        let track = &config.tracks[0];
        assert_eq!(track.aliases.get("Desired_Room_Setup"), Some("Room_Type"));
        assert_eq!(track.reports.len(), 2);
        assert_eq!(track.reports[1].name(), "Tutorial_Room_Types");
        match &track.reports[0] {
            ReportSpec::Summary { rules, .. } => assert_eq!(rules[0].output, "Mean_Alignment"),
            other => panic!("unexpected report {:?}", other),
        }

        let scholarship = config.scholarship.as_ref().unwrap();
        assert_eq!(scholarship.name, "ScholarshipsAwardeeSubmissions");
        assert_eq!(scholarship.pools[0].year.as_deref(), Some("2023"));
        assert_eq!(scholarship.fields, MatchFields::default());
        assert!(matches!(
            scholarship.authorship,
            AuthorshipPolicy::ExplicitColumn { .. }
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[[tracks]]"));
        assert!(toml_str.contains("[scholarship]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        let example = Config::example();
        assert_eq!(parsed.tracks[0].reports, example.tracks[0].reports);
        assert_eq!(parsed.tracks[0].aliases, example.tracks[0].aliases);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::example();
        let mut args = make_args();
        args.output_dir = Some(PathBuf::from("/tmp/out"));
        args.format = Some(OutputFormat::Markdown);
        args.sequential = true;
        args.track = vec!["papers".to_string()];

        config.merge_with_args(&args).unwrap();

        assert_eq!(config.general.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.general.format, OutputFormat::Markdown);
        assert!(!config.general.parallel);
        assert_eq!(config.tracks.len(), 1);
        assert!(config.scholarship.is_none());
    }

    #[test]
    fn test_merge_rejects_unknown_track() {
        let mut config = Config::example();
        let mut args = make_args();
        args.track = vec!["workshops".to_string()];
        assert!(config.merge_with_args(&args).is_err());
    }

    #[test]
    fn test_validate_duplicate_reports() {
        let mut config = Config::example();
        let duplicate = config.tracks[0].reports[0].clone();
        config.tracks[0].reports.push(duplicate);
        assert!(config.validate().is_err());
    }
}
