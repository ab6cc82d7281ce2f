//! Runtime settings: site origin, genre chart URLs, timeouts and batch limits.
//!
//! The genre map is the set of allowed genres. It defaults to the built-in
//! Beatport chart URLs and can be replaced by a YAML file of
//! `genre: listing_url` pairs.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_ORIGIN: &str = "https://www.beatport.com";

/// Connect and read timeouts for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Timeouts {
    /// Profile for the (single, required) chart listing page.
    pub const LISTING: Timeouts = Timeouts {
        connect: Duration::from_secs(4),
        read: Duration::from_secs(6),
    };

    /// Tighter profile for track detail pages.
    pub const DETAIL: Timeouts = Timeouts {
        connect: Duration::from_secs(3),
        read: Duration::from_secs(5),
    };
}

/// Allowed genres and the chart listing URL for each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreMap(BTreeMap<String, String>);

impl GenreMap {
    pub fn builtin() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            "techno".to_string(),
            "https://www.beatport.com/genre/techno-peak-time-driving/6/top-100?per_page=150"
                .to_string(),
        );
        map.insert(
            "hard-techno".to_string(),
            "https://www.beatport.com/genre/hard-techno/2/top-100?per_page=150".to_string(),
        );
        GenreMap(map)
    }

    /// Parse a YAML mapping of genre to listing URL. Genres are lower-cased.
    pub fn from_yaml(text: &str, path: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, String> =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                path: path.to_string(),
                source,
            })?;
        if raw.is_empty() {
            return Err(ConfigError::EmptyGenreMap {
                path: path.to_string(),
            });
        }
        Ok(GenreMap(
            raw.into_iter()
                .map(|(genre, url)| (genre.trim().to_lowercase(), url.trim().to_string()))
                .collect(),
        ))
    }

    #[instrument(level = "info")]
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let map = Self::from_yaml(&text, path)?;
        info!(genres = %map.allowed(), "Loaded genre map");
        Ok(map)
    }

    /// Listing URL for an already-normalized genre.
    pub fn listing_url(&self, genre: &str) -> Option<&str> {
        self.0.get(genre).map(String::as_str)
    }

    /// Comma-separated allowed genres, for error messages.
    pub fn allowed(&self) -> String {
        self.0.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}

/// Everything the aggregator needs to run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Site origin without trailing slash, e.g. `https://www.beatport.com`.
    pub origin: String,
    pub genres: GenreMap,
    pub listing_timeouts: Timeouts,
    pub detail_timeouts: Timeouts,
    /// Detail pages fetched at once. 1 means strictly sequential.
    pub concurrency: usize,
    /// Wall-clock budget for a whole aggregation.
    pub batch_deadline: Option<Duration>,
    pub listing_retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            genres: GenreMap::builtin(),
            listing_timeouts: Timeouts::LISTING,
            detail_timeouts: Timeouts::DETAIL,
            concurrency: 4,
            batch_deadline: Some(Duration::from_secs(90)),
            listing_retries: 0,
        }
    }
}

impl Settings {
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }
}
