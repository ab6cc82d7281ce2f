//! Chart aggregation: listing page -> track links -> detail pages -> report.
//!
//! # Pipeline
//!
//! 1. **Validate**: genre must be in the configured map, `deep_limit > 0`
//! 2. **List**: fetch the genre's chart page (the only failure that aborts)
//! 3. **Harvest**: collect up to 100 unique track links
//! 4. **Detail**: fetch and extract the first `deep_limit` links, a few at a
//!    time, keeping link order
//! 5. **Report**: every attempted link yields exactly one item
//!
//! A detail page that fails to load, or misses the batch deadline, is
//! replaced by a synthetic record built from its URL.

use crate::config::Settings;
use crate::error::{FetchError, ValidationError};
use crate::fetch::{Fetch, RetryFetch};
use crate::models::{AggregationReport, TrackRecord};
use crate::scrapers::{detail, links};
use crate::utils::{title_from_slug, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

/// Runs chart aggregations against a [`Fetch`] implementation.
#[derive(Debug)]
pub struct Aggregator<F> {
    fetcher: F,
    settings: Settings,
}

impl<F: Fetch> Aggregator<F> {
    pub fn new(fetcher: F, settings: Settings) -> Self {
        Self { fetcher, settings }
    }

    /// Lower-case the genre and resolve its listing URL.
    ///
    /// Only case is normalized; surrounding whitespace makes a genre unknown.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownGenre`] when the genre is not in the
    /// configured map, [`ValidationError::ZeroDeepLimit`] when `deep_limit`
    /// is 0.
    pub fn validate<'a>(
        &'a self,
        genre: &str,
        deep_limit: usize,
    ) -> Result<(String, &'a str), ValidationError> {
        let genre = genre.to_lowercase();
        let url = self
            .settings
            .genres
            .listing_url(&genre)
            .ok_or_else(|| ValidationError::UnknownGenre {
                genre: genre.clone(),
                allowed: self.settings.genres.allowed(),
            })?;
        if deep_limit == 0 {
            return Err(ValidationError::ZeroDeepLimit);
        }
        Ok((genre, url))
    }

    /// Build the chart report for `genre`, visiting at most `deep_limit`
    /// detail pages.
    ///
    /// # Arguments
    ///
    /// * `genre` - Genre name, matched case-insensitively against the
    ///   configured genre map
    /// * `deep_limit` - Maximum number of track detail pages to fetch
    ///
    /// # Returns
    ///
    /// Always a report, never an error. `ok` is `false` only when the request
    /// is invalid (no request is made) or the listing page cannot be fetched
    /// before the batch deadline. Otherwise `items` holds exactly one record
    /// per selected link, in chart order; links whose detail page failed get
    /// a record derived from the link itself.
    #[instrument(level = "info", skip(self))]
    pub async fn aggregate(&self, genre: &str, deep_limit: usize) -> AggregationReport {
        let t0 = Instant::now();
        let (genre, listing_url) = match self.validate(genre, deep_limit) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Rejected chart request");
                return AggregationReport::failure(&genre.to_lowercase(), e);
            }
        };
        let deadline = self.settings.batch_deadline.map(|d| t0 + d);

        let listing = RetryFetch::new(
            &self.fetcher,
            self.settings.listing_retries,
            Duration::from_millis(500),
        );
        let body = match with_deadline(
            deadline,
            listing_url,
            listing.fetch(listing_url, self.settings.listing_timeouts),
        )
        .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, url = %listing_url, "Listing page fetch failed");
                return AggregationReport::failure(&genre, e);
            }
        };

        let mut selected = links::harvest(&body, &self.settings.origin);
        let harvested = selected.len();
        selected.truncate(deep_limit);
        info!(harvested, selected = selected.len(), "Harvested chart links");

        let items: Vec<TrackRecord> = stream::iter(selected)
            .map(|link| async move { self.track_for(&link, deadline).await })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let report = AggregationReport::success(&genre, items);
        info!(
            count = report.count,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Chart aggregation complete"
        );
        report
    }

    /// One detail page, degraded to a synthetic record on any failure.
    async fn track_for(&self, link: &str, deadline: Option<Instant>) -> TrackRecord {
        let fetched = with_deadline(
            deadline,
            link,
            self.fetcher.fetch(link, self.settings.detail_timeouts),
        )
        .await;
        match fetched {
            Ok(body) => {
                let record = detail::extract_detail(&body, &self.settings.origin);
                debug!(%link, title = %truncate_for_log(&record.title, 80), "Extracted track");
                complete_from_link(record, link)
            }
            Err(e) => {
                warn!(%link, error = %e, "Detail page failed; using synthetic record");
                synthetic_record(link)
            }
        }
    }
}

async fn with_deadline(
    deadline: Option<Instant>,
    url: &str,
    fut: impl Future<Output = Result<String, FetchError>>,
) -> Result<String, FetchError> {
    match deadline {
        Some(at) if Instant::now() >= at => Err(FetchError::Deadline {
            url: url.to_string(),
        }),
        Some(at) => timeout_at(at, fut)
            .await
            .unwrap_or_else(|_| Err(FetchError::Deadline { url: url.to_string() })),
        None => fut.await,
    }
}

fn slug_title(link: &str) -> String {
    links::slug_of(link).map(title_from_slug).unwrap_or_default()
}

/// Fill URL and title from the link the page was fetched with.
pub fn complete_from_link(mut record: TrackRecord, link: &str) -> TrackRecord {
    if record.detail_url.is_empty() {
        record.detail_url = link.to_string();
    }
    if record.title.is_empty() {
        record.title = slug_title(link);
    }
    record
}

/// Minimal record derived from a track link alone.
pub fn synthetic_record(link: &str) -> TrackRecord {
    TrackRecord {
        identifier: detail::trailing_id(link).unwrap_or_default(),
        title: slug_title(link),
        detail_url: link.to_string(),
        ..TrackRecord::default()
    }
}
