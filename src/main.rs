//! # Beatport Charts
//!
//! Scrapes Beatport genre "top 100" charts into structured track records
//! (id, title, artists, artist URL, track URL).
//!
//! ## Usage
//!
//! ```sh
//! beatport_charts top --genre techno --deep-limit 20
//! beatport_charts serve --listen 0.0.0.0:8000
//! ```
//!
//! ## Architecture
//!
//! The chart run is a linear pipeline:
//! 1. **Listing**: fetch the genre's chart page and harvest track links
//! 2. **Detail**: fetch each selected track page (a few at a time)
//! 3. **Extraction**: embedded page data first, markup heuristics second
//! 4. **Report**: one record per attempted link, failures degraded to
//!    records derived from the link itself

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod server;
mod utils;

use aggregate::Aggregator;
use cli::{Cli, Command};
use fetch::HttpFetcher;
use outputs::json;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("beatport_charts starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let settings = match args.settings() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        origin = %settings.origin,
        genres = %settings.genres.allowed(),
        concurrency = settings.concurrency,
        "Loaded settings"
    );
    let aggregator = Aggregator::new(HttpFetcher::new(), settings);

    match args.command {
        Command::Top {
            genre,
            deep_limit,
            json_output_dir,
        } => {
            // Fail before scraping if the report cannot be saved.
            if let Some(dir) = &json_output_dir {
                if let Err(e) = ensure_writable_dir(dir).await {
                    error!(
                        path = %dir,
                        error = %e,
                        "JSON output directory is not writable (fix perms or choose a different path)"
                    );
                    return Err(e);
                }
            }

            let report = aggregator.aggregate(&genre, deep_limit).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let (true, Some(dir)) = (report.ok, &json_output_dir) {
                if let Err(e) = json::write_report(&report, dir).await {
                    error!(error = %e, "Failed to write JSON report");
                }
            }

            let elapsed = start_time.elapsed();
            info!(
                ok = report.ok,
                count = report.count,
                secs = elapsed.as_secs(),
                millis = elapsed.subsec_millis(),
                "Execution complete"
            );
            if !report.ok {
                return Err(report
                    .error
                    .unwrap_or_else(|| "chart run failed".to_string())
                    .into());
            }
        }
        Command::Serve { listen } => {
            server::serve(&listen, aggregator).await?;
        }
    }

    Ok(())
}
