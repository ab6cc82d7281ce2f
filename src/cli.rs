//! Command-line interface definitions for Beatport Charts.
//!
//! Global options configure the scraper and can also be set through
//! environment variables. Subcommands pick between a one-shot chart run and
//! the HTTP service.

use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::config::{DEFAULT_ORIGIN, GenreMap, Settings};
use crate::error::ConfigError;
use crate::models::DEFAULT_DEEP_LIMIT;

/// Command-line arguments for the Beatport Charts application.
///
/// # Examples
///
/// ```sh
/// # Print the hard techno chart with artist details for the top 10
/// beatport_charts top --genre hard-techno --deep-limit 10
///
/// # Also keep a dated copy on disk
/// beatport_charts top -g techno -j ./json
///
/// # Serve POST /execute and GET /health
/// beatport_charts serve --listen 127.0.0.1:8000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Site origin used to resolve relative links
    #[arg(long, env = "BEATPORT_ORIGIN", default_value = DEFAULT_ORIGIN, global = true)]
    pub origin: String,

    /// YAML file mapping genre names to chart listing URLs (replaces the built-in map)
    #[arg(long, env = "BEATPORT_GENRE_MAP", global = true)]
    pub genre_map: Option<String>,

    /// Detail pages fetched concurrently (1 = one at a time)
    #[arg(long, env = "BEATPORT_CONCURRENCY", default_value_t = 4, global = true)]
    pub concurrency: usize,

    /// Wall-clock budget for one chart run in seconds (0 disables)
    #[arg(long, env = "BEATPORT_BATCH_DEADLINE_SECS", default_value_t = 90, global = true)]
    pub batch_deadline_secs: u64,

    /// Extra attempts for the chart listing page
    #[arg(long, env = "BEATPORT_LISTING_RETRIES", default_value_t = 0, global = true)]
    pub listing_retries: usize,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Aggregator settings from the global options, loading the genre map
    /// file if one was given.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let genres = match &self.genre_map {
            Some(path) => GenreMap::load(path)?,
            None => GenreMap::builtin(),
        };
        Ok(Settings {
            genres,
            concurrency: self.concurrency.max(1),
            batch_deadline: (self.batch_deadline_secs > 0)
                .then(|| Duration::from_secs(self.batch_deadline_secs)),
            listing_retries: self.listing_retries,
            ..Settings::default()
        }
        .with_origin(&self.origin))
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Scrape one genre chart and print the report as JSON
    Top {
        /// Genre to scrape
        #[arg(short, long, default_value = "hard-techno")]
        genre: String,

        /// Maximum number of track detail pages to visit
        #[arg(short, long, default_value_t = DEFAULT_DEEP_LIMIT)]
        deep_limit: usize,

        /// Optional directory to also write `<date>/<genre>.json` into
        #[arg(short, long)]
        json_output_dir: Option<String>,
    },
    /// Run the HTTP service
    Serve {
        /// Address to listen on
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
        listen: String,
    },
}
