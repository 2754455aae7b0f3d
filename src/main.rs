//! TrackStats - conference submission report generator
//!
//! A CLI tool that harmonizes submission-platform exports for every
//! conference track and writes per-submission summaries, acceptance
//! cross tabs and the scholarship awardee history.
//!
//! Exit codes:
//!   0 - Success (every report written)
//!   1 - Runtime error before any report ran (config, arguments)
//!   2 - At least one track or report failed; the others were written

mod analysis;
mod canonical;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod source;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::RunSummary;
use report::TrackJob;
use source::{discover_pool_files, CsvSource, RecordSource};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("TrackStats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {} tracks, scholarship {}", config.tracks.len(), config.scholarship.is_some());

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate an example trackstats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml()?;
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with an example papers track.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to point at your exports and adjust the alias tables.");
    Ok(())
}

/// Initialize logging at the resolved verbosity.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from the explicit path or the default location.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default()? {
        Some(config) => Ok(config),
        None => anyhow::bail!(
            "No {} found. Run with --init-config to create one, or pass --config",
            DEFAULT_CONFIG_FILE
        ),
    }
}

/// Every job the configuration asks for, tracks first.
fn collect_jobs(config: &Config) -> Vec<TrackJob> {
    let mut jobs: Vec<TrackJob> = config.tracks.iter().cloned().map(TrackJob::Track).collect();
    if let Some(ref scholarship) = config.scholarship {
        jobs.push(TrackJob::Scholarship(scholarship.clone()));
    }
    jobs
}

fn create_progress_bar(len: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Run every selected track. Returns exit code (0 or 2).
async fn run(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.merge_with_args(&args)?;
    config.validate()?;

    if args.dry_run {
        return handle_dry_run(&config);
    }

    let output_dir = config.general.output_dir.clone();
    let format = config.general.format;
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let jobs = collect_jobs(&config);
    let mode = if config.general.parallel {
        "parallel"
    } else {
        "sequential"
    };
    println!("📊 Running {} tracks ({})...", jobs.len(), mode);

    let progress = create_progress_bar(jobs.len(), args.quiet);
    let summaries = report::run_jobs(
        jobs,
        output_dir.clone(),
        format,
        config.general.parallel,
        progress.clone(),
    )
    .await;
    progress.finish_and_clear();

    let summary = RunSummary {
        generated_at: Utc::now(),
        output_dir: output_dir.display().to_string(),
        format: format!("{:?}", format).to_lowercase(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
        tracks: summaries,
    };

    let summary_path = output_dir.join("run_summary.md");
    report::write_atomic(&summary_path, &report::generate_run_summary(&summary))
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    println!("\n📝 Run Summary:");
    for track in &summary.tracks {
        let status = if track.failures() == 0 { "✅" } else { "⛔" };
        println!(
            "   {} {}: {} files, {} failures",
            status,
            track.name,
            track.files_written(),
            track.failures()
        );
    }
    println!("   Duration: {:.1}s", summary.duration_seconds);
    println!("\n✅ Reports saved to: {}", output_dir.display());

    if summary.failures() > 0 {
        eprintln!(
            "\n⛔ {} report(s) failed. See {} (exit code 2).",
            summary.failures(),
            summary_path.display()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: load and canonicalize every source, print counts, exit.
fn handle_dry_run(config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: loading sources (no reports written)...\n");

    for track in &config.tracks {
        let source = CsvSource::new(&track.source);
        let raw = source
            .load()
            .with_context(|| format!("Track '{}'", track.name))?;
        let records = canonical::canonicalize(&raw, &track.aliases);
        let fields = records.first().map(|r| r.field_names()).unwrap_or_default();
        debug!("{} canonical fields: {:?}", track.name, fields);
        println!(
            "   📄 {}: {} records, {} fields, {} reports ({})",
            track.name,
            records.len(),
            fields.len(),
            track.reports.len(),
            source.describe()
        );
    }

    if let Some(ref scholarship) = config.scholarship {
        let roster = CsvSource::new(&scholarship.roster)
            .load()
            .context("Scholarship roster")?;
        let mut pool_files = scholarship.pools.len();
        if let Some(ref dir) = scholarship.pool_dir {
            pool_files += discover_pool_files(dir)?.len();
        }
        println!(
            "   🎓 {}: {} awardees, {} pool files",
            config::SCHOLARSHIP_TRACK,
            roster.len(),
            pool_files
        );
    }

    println!("\n✅ Dry run complete. No reports were written.");
    Ok(0)
}
