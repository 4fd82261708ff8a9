//! driftnet CLI
//!
//! Entry point for the periodic collectors. Each subcommand is one
//! scheduler-driven run; the scheduler (cron or a process supervisor for
//! `stream`) owns periodicity and mutual exclusion per platform.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use driftnet::{
    config::load_terms,
    error::Result,
    models::{Config, ContentType},
    pipeline::{self, Backoff, StreamIngester},
    services::{HttpBoardClient, HttpSearchClient, HttpStreamSource},
    storage::{CollectStorage, LocalStorage},
    utils::{http, time},
};

/// driftnet - Social-media research data collectors
#[derive(Parser, Debug)]
#[command(
    name = "driftnet",
    version,
    about = "Periodic collectors for social-media research data"
)]
struct Cli {
    /// Path to data directory containing config and term files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest keyword-search results for one platform
    Harvest {
        /// Search source to run (e.g. reddit, meta, fb_ads)
        #[arg(long)]
        platform: String,

        /// Item kind to fetch (submission, comment, post, ad)
        #[arg(long)]
        content_type: String,

        /// Start of the window (YYYY-MM-DD); default resumes from the
        /// committed watermark, or yesterday on a first run
        #[arg(long)]
        start_date: Option<String>,

        /// End of the window (YYYY-MM-DD, exclusive); default is today
        #[arg(long)]
        end_date: Option<String>,
    },

    /// Sweep the board archive for newly finalized threads
    Archive,

    /// Capture one live-board catalog snapshot
    Catalog,

    /// Run the streaming ingester (long-lived; restart via supervisor)
    Stream,

    /// Mine collected text for keyword-expansion candidates
    Snowball {
        /// Iteration label, used as the output folder name
        #[arg(long)]
        iteration: String,

        /// First day of collected data to mine (YYYY-MM-DD)
        #[arg(long)]
        start_date: String,

        /// Last day of collected data to mine (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end_date: String,
    },

    /// Validate configuration and term files
    Validate,

    /// Show committed watermarks and checkpoints
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve a configured path against the data directory.
fn resolve(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

fn parse_optional_day(day: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    day.map(time::parse_day).transpose()
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("driftnet starting...");

    let config_path = cli.data_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    let storage = LocalStorage::new(&cli.data_dir);

    match cli.command {
        Command::Harvest {
            platform,
            content_type,
            start_date,
            end_date,
        } => {
            let content_type: ContentType = content_type.parse()?;
            let terms = load_terms(resolve(&cli.data_dir, &config.paths.keywords_file))?;

            let source = config.source(&platform)?.clone();
            let client = HttpSearchClient::new(http::create_client(&config.http)?, source);

            let start = parse_optional_day(start_date.as_deref())?;
            // Default stop: today 00:00 UTC, i.e. collect through yesterday.
            let stop = parse_optional_day(end_date.as_deref())?.unwrap_or(time::backfill_start(0));

            let outcome = pipeline::run_harvest(
                &config,
                &storage,
                &client,
                &platform,
                content_type,
                &terms,
                start,
                Some(stop),
            )
            .await?;

            log::info!(
                "Harvest complete: {} items, watermark {}",
                outcome.items,
                outcome.final_watermark
            );
        }

        Command::Archive => {
            let client = HttpBoardClient::new(http::create_client(&config.http)?, config.board.clone());
            let outcome = pipeline::run_archive_sweep(&config, &storage, &client).await?;
            log::info!(
                "Archive sweep complete: {} new, {} fetched, {} failed",
                outcome.discovered,
                outcome.fetched,
                outcome.failed
            );
        }

        Command::Catalog => {
            let client = HttpBoardClient::new(http::create_client(&config.http)?, config.board.clone());
            pipeline::run_catalog_poll(&config, &storage, &client).await?;
            log::info!("Catalog snapshot complete");
        }

        Command::Stream => {
            let filters = load_terms(resolve(&cli.data_dir, &config.paths.filters_file))?;
            let source =
                HttpStreamSource::new(http::create_stream_client(&config.http)?, config.stream.clone());
            let rotator = storage.stream_rotator(&config.stream.platform).await?;

            let backoff = Backoff::new(
                std::time::Duration::from_secs(config.stream.initial_backoff_secs),
                std::time::Duration::from_secs(config.stream.max_backoff_secs),
            );
            let mut ingester = StreamIngester::new(&source, rotator, filters, backoff);

            // Never returns under normal operation.
            ingester.run().await?;
        }

        Command::Snowball {
            iteration,
            start_date,
            end_date,
        } => {
            let keywords = load_terms(resolve(&cli.data_dir, &config.paths.keywords_file))?;
            let start = time::parse_day(&start_date)?;
            let end = time::parse_day(&end_date)?;

            let path =
                pipeline::run_snowball(&config, &storage, &iteration, &keywords, start, end)
                    .await?;
            log::info!("Snowball complete: {}", path.display());
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!("✓ Config OK ({} search sources)", config.sources.len());

            let keywords = load_terms(resolve(&cli.data_dir, &config.paths.keywords_file))?;
            log::info!("✓ Keywords OK ({} terms)", keywords.len());

            match load_terms(resolve(&cli.data_dir, &config.paths.filters_file)) {
                Ok(filters) => log::info!("✓ Stream filters OK ({} entries)", filters.len()),
                Err(e) => log::warn!("Stream filters unavailable: {e}"),
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Data directory: {}", cli.data_dir.display());

            for source in &config.sources {
                for endpoint in &source.endpoints {
                    match storage
                        .load_watermark(&source.platform, endpoint.content_type)
                        .await?
                    {
                        Some(mark) => log::info!(
                            "{}/{}: watermark {} (updated {})",
                            source.platform,
                            endpoint.content_type,
                            mark.committed,
                            mark.updated_at
                        ),
                        None => log::info!(
                            "{}/{}: no watermark yet",
                            source.platform,
                            endpoint.content_type
                        ),
                    }
                }
            }

            match storage.load_listing(&config.board.platform).await? {
                Some(listing) => log::info!(
                    "{}: {} archived threads as of {}",
                    config.board.platform,
                    listing.len(),
                    listing.captured_at
                ),
                None => log::info!("{}: no archive listing yet", config.board.platform),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
