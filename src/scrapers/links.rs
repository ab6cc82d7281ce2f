//! Chart listing link harvesting.
//!
//! The chart grid is large, so the raw page text is scanned for
//! `href="/track/<slug>/<id>"` instead of building a DOM.

use crate::models::MAX_ITEMS;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

static TRACK_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="(/track/[A-Za-z0-9-]+/\d+)""#).expect("static regex"));

/// Collect track links from a chart listing page.
///
/// # Arguments
///
/// * `body` - Raw HTML of the listing page
/// * `origin` - Site origin prefixed to each relative `/track/<slug>/<id>` href
///
/// # Returns
///
/// Absolute track URLs in document order, first occurrence wins, at most
/// [`MAX_ITEMS`]. Empty when the page has no track links.
#[instrument(level = "debug", skip_all, fields(bytes = body.len()))]
pub fn harvest(body: &str, origin: &str) -> Vec<String> {
    let links: Vec<String> = TRACK_HREF
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .unique()
        .take(MAX_ITEMS)
        .map(|path| format!("{origin}{path}"))
        .collect();
    debug!(count = links.len(), "Harvested track links");
    links
}

/// The `<slug>` segment of a track URL, if it has one.
pub fn slug_of(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.find(|s| *s == "track")?;
    segments.next()
}
