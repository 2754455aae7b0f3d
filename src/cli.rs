//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TrackStats - conference submission report generator
///
/// Harmonizes submission-platform exports for every conference track and
/// writes per-submission summaries, acceptance cross tabs and the
/// scholarship awardee history.
///
/// Examples:
///   trackstats
///   trackstats --config trackstats.toml --format markdown
///   trackstats --track papers --track scholarship --output-dir out
///   trackstats --dry-run
///   trackstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for trackstats.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "TRACKSTATS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for the generated reports
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format (csv, json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Only run the named track (repeatable)
    ///
    /// Use "scholarship" to select the awardee history report.
    #[arg(short, long, value_name = "NAME")]
    pub track: Vec<String>,

    /// Run tracks one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Dry run: load and canonicalize every source without writing reports
    #[arg(long)]
    pub dry_run: bool,

    /// Generate an example trackstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the generated tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values (default)
    #[default]
    Csv,
    /// Pretty-printed JSON
    Json,
    /// Markdown tables
    Markdown,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref config) = self.config {
            if !config.is_file() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        if let Some(ref dir) = self.output_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(format!("Output path is not a directory: {}", dir.display()));
            }
        }

        if self.track.iter().any(|name| name.trim().is_empty()) {
            return Err("Track names must not be empty".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `[general] verbose` setting; `--quiet` wins
    /// over both.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

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
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "trackstats",
            "--format",
            "markdown",
            "--track",
            "papers",
            "-t",
            "scholarship",
            "--sequential",
        ])
        .unwrap();

        assert_eq!(args.format, Some(OutputFormat::Markdown));
        assert_eq!(args.track, vec!["papers", "scholarship"]);
        assert!(args.sequential);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_validation_missing_config() {
        let mut args = make_args();
        args.config = Some(PathBuf::from("/nonexistent/trackstats.toml"));
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_output_dir_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, "").unwrap();

        let mut args = make_args();
        args.output_dir = Some(file);
        assert!(args.validate().is_err());

        args.output_dir = Some(dir.path().join("fresh"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(OutputFormat::Csv.extension(), "csv");
        assert_eq!(OutputFormat::Markdown.extension(), "md");
    }
}
