//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the course catalog crawler.

use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{RunController, SessionManager};
use catalog_harvest::model::{Progress, Semester};
use catalog_harvest::output::{
    clean_records, export_all, export_lecturer, load_statistics, print_statistics, ExportError,
    GroupingOptions, LecturerIndex,
};
use catalog_harvest::storage::{open_storage, Storage, StoreOutcome};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a course catalog crawler
///
/// Crawls a university's course catalog portal for one semester, stores the
/// de-duplicated course records and exports them per lecturer.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version)]
#[command(about = "A course catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Semester to crawl or export, e.g. "Winter 2024/25", "SoSe 2025" or "2024w"
    #[arg(short, long, value_name = "LABEL")]
    semester: Option<String>,

    /// List the semesters offered by the portal and exit
    #[arg(long, conflicts_with_all = ["stats", "dry_run", "export", "export_all"])]
    list_semesters: bool,

    /// Show statistics of stored semesters and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "export_all"])]
    stats: bool,

    /// Export the stored courses of one lecturer
    #[arg(long, value_name = "LECTURER", requires = "semester", conflicts_with = "export_all")]
    export: Option<String>,

    /// Export the stored courses of every lecturer
    #[arg(long, requires = "semester")]
    export_all: bool,

    /// Group only by responsible lecturers when exporting
    #[arg(long)]
    responsible_only: bool,

    /// With --responsible-only, use other lecturers for courses without a responsible one
    #[arg(long, requires = "responsible_only")]
    promote_other_lecturers: bool,

    /// Drop cancelled courses and courses without SWS before exporting
    #[arg(long)]
    clean: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export", "export_all"])]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let semester = cli
        .semester
        .as_deref()
        .map(str::parse::<Semester>)
        .transpose()?;

    if cli.dry_run {
        handle_dry_run(&config, semester);
    } else if cli.list_semesters {
        handle_list_semesters(config).await?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export.is_some() || cli.export_all {
        // clap enforces --semester for both export flags
        let semester = semester.ok_or("--semester is required for export")?;
        handle_export(&config, semester, &cli)?;
    } else if let Some(semester) = semester {
        handle_crawl(config, semester, &config_hash).await?;
    } else {
        return Err("nothing to do: pass --semester, --list-semesters, --stats or --dry-run".into());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, semester: Option<Semester>) {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Portal:");
    println!("  Base URL: {}", config.portal.base_url);
    println!("  Entry path: {}", config.portal.entry_path);
    match &config.portal.token_param {
        Some(param) => println!("  Session token parameter: {}", param),
        None => println!("  Session token parameter: (cookies only)"),
    }
    println!("  Max session idle: {}s", config.portal.max_session_idle_secs);
    println!("  Max session renewals: {}", config.portal.max_session_renewals);

    println!("\nNavigation ({} steps):", config.portal.navigation.len());
    for step in &config.portal.navigation {
        let mut line = format!("  - {}", step.selector);
        if let Some(text) = &step.link_text {
            line.push_str(&format!(" containing '{}'", text));
        }
        if step.semester {
            line.push_str(" [semester]");
        }
        if step.optional {
            line.push_str(" [optional]");
        }
        println!("{}", line);
    }

    println!("\nFetching:");
    println!("  Concurrency: {}", config.fetch.concurrency);
    println!("  Retries: {}", config.fetch.retry_count);
    println!("  Backoff base: {}ms", config.fetch.backoff_base_ms);
    println!("  Timeout: {}s", config.fetch.timeout_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Export directory: {}", config.output.export_dir);

    println!("\n✓ Configuration is valid");
    match semester {
        Some(semester) => println!("✓ Would crawl {} ({})", semester, semester.key()),
        None => println!("  No --semester given"),
    }
}

/// Handles the --list-semesters mode: asks the portal what it offers
async fn handle_list_semesters(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let manager = SessionManager::new(Arc::new(config));
    let semesters = manager.available_semesters().await?;

    if semesters.is_empty() {
        println!("The portal offers no recognizable semesters.");
        return Ok(());
    }

    println!("Semesters offered by the portal:");
    for semester in semesters {
        println!("  {} ({})", semester, semester.key());
    }
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --export and --export-all for a stored semester
fn handle_export(
    config: &Config,
    semester: Semester,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let mut records = storage.load(semester)?;
    if records.is_empty() {
        return Err(ExportError::NothingStored(semester).into());
    }

    if cli.clean {
        let before = records.len();
        records = clean_records(&records);
        tracing::info!("Cleaning dropped {} of {} courses", before - records.len(), before);
    }

    let index = LecturerIndex::build(
        &records,
        GroupingOptions {
            responsible_only: cli.responsible_only,
            promote_other_lecturers: cli.promote_other_lecturers,
        },
    );
    let dir = Path::new(&config.output.export_dir);

    if let Some(name) = &cli.export {
        let courses = index
            .courses_of(name)
            .ok_or_else(|| ExportError::UnknownLecturer(name.clone()))?;
        let path = export_lecturer(dir, semester, name, courses)?;
        println!("✓ Exported {} courses to: {}", courses.len(), path.display());
    } else {
        let written = export_all(dir, semester, &index)?;
        println!("✓ Exported {} lecturers to: {}", written.len(), dir.display());
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    semester: Semester,
    config_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let database_path = PathBuf::from(&config.output.database_path);

    let controller = RunController::new(config).with_progress(|progress: Progress| {
        match progress.total_known {
            Some(total) => tracing::debug!(
                "Progress: {} of {} known pages",
                progress.pages_visited,
                total
            ),
            None => tracing::debug!("Progress: {} pages", progress.pages_visited),
        }
    });

    let stop = controller.stop_signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received; finishing the current batch");
                stop.stop();
            }
            Err(e) => tracing::error!("Unable to listen for interrupt: {}", e),
        }
    });

    let result = match controller.run_for(semester).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Crawl finished: {} courses, {} pages, {} failures{}",
        result.records.len(),
        result.pages_visited,
        result.failure_count(),
        if result.stopped { " (stopped early)" } else { "" }
    );
    for failure in &result.failures {
        tracing::debug!("Failed [{}] {}: {}", failure.stage, failure.url, failure.reason);
    }

    let mut storage = open_storage(&database_path)?;
    match storage.store(semester, &result, config_hash)? {
        StoreOutcome::Replaced { records } => {
            println!("✓ Stored {} courses for {}", records, semester);
        }
        StoreOutcome::SkippedEmpty => {
            println!("✗ No courses found for {}; stored data left unchanged", semester);
        }
        StoreOutcome::SkippedStopped => {
            println!(
                "✗ Crawl of {} was stopped early; stored data left unchanged",
                semester
            );
        }
    }

    Ok(())
}
