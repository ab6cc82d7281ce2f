//! Data models for chart requests and their extracted results.
//!
//! - [`TrackRecord`]: one track's metadata as scraped from its detail page
//! - [`ChartRequest`]: what the caller asked for
//! - [`AggregationReport`]: the complete (possibly partial) answer
//!
//! All of these are request-scoped values. String fields are never absent:
//! a field that could not be determined is an empty string.

use serde::{Deserialize, Serialize};

/// Identifies where every report's data came from.
pub const SOURCE: &str = "beatport";

/// Default number of detail pages visited per request.
pub const DEFAULT_DEEP_LIMIT: usize = 20;

/// Upper bound on items in any report.
pub const MAX_ITEMS: usize = 100;

/// Metadata for a single track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Numeric track id as a string.
    #[serde(rename = "id", default)]
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    /// Unique artist names in first-seen order, joined with `", "`.
    #[serde(default)]
    pub artist: String,
    /// Absolute URL of the (first) artist page.
    #[serde(rename = "artist_url", default)]
    pub artist_url: String,
    /// Absolute URL of the track's detail page.
    #[serde(rename = "url", default)]
    pub detail_url: String,
}

/// A request for one genre chart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartRequest {
    #[serde(default = "ChartRequest::default_genre")]
    pub genre: String,
    #[serde(default = "ChartRequest::default_deep_limit")]
    pub deep_limit: usize,
}

impl ChartRequest {
    fn default_genre() -> String {
        "hard-techno".to_string()
    }

    fn default_deep_limit() -> usize {
        DEFAULT_DEEP_LIMIT
    }
}

impl Default for ChartRequest {
    fn default() -> Self {
        Self {
            genre: Self::default_genre(),
            deep_limit: Self::default_deep_limit(),
        }
    }
}

/// Result of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub ok: bool,
    pub source: String,
    pub genre: String,
    pub count: usize,
    pub items: Vec<TrackRecord>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl AggregationReport {
    /// Successful report; `count` always follows `items`.
    pub fn success(genre: &str, mut items: Vec<TrackRecord>) -> Self {
        items.truncate(MAX_ITEMS);
        Self {
            ok: true,
            source: SOURCE.to_string(),
            genre: genre.to_string(),
            count: items.len(),
            items,
            error: None,
        }
    }

    pub fn failure(genre: &str, error: impl ToString) -> Self {
        Self {
            ok: false,
            source: SOURCE.to_string(),
            genre: genre.to_string(),
            count: 0,
            items: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}
