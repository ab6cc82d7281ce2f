//! Track detail page extraction.
//!
//! A [`TrackRecord`] is filled by a cascade of stages. The embedded page data
//! runs first; each later stage reads the markup and only fills fields that
//! are still empty:
//!
//! 1. embedded track object (title, artists, id, canonical URL)
//! 2. artist link inside an `Artists` block
//! 3. first `<h1>` as title
//! 4. `<link rel="canonical">` as detail URL
//! 5. trailing digits of the detail URL as id

use super::structured::{find_track_node, id_field, locate, str_field};
use crate::models::TrackRecord;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

static ARTISTS_BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="Artists"]"#).expect("static selector"));
static ARTIST_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/artist/"]"#).expect("static selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));
static CANONICAL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="canonical"]"#).expect("static selector"));
static TRAILING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)/?$").expect("static regex"));

/// Extract a track record from a detail page body.
///
/// Embedded page data is tried first. Artist, title and URL fall back to the
/// markup in that order, and the identifier falls back to the trailing digits
/// of the resolved URL.
///
/// # Arguments
///
/// * `body` - Raw HTML of a track detail page
/// * `origin` - Site origin used to absolutize relative artist and track links
///
/// # Returns
///
/// A [`TrackRecord`]; never fails. Fields that cannot be determined stay empty.
pub fn extract_detail(body: &str, origin: &str) -> TrackRecord {
    let document = Html::parse_document(body);
    let record = from_structured(&document, TrackRecord::default(), origin);
    let record = artist_from_markup(&document, record, origin);
    let record = title_from_markup(&document, record);
    let record = url_from_canonical(&document, record, origin);
    id_from_url(record)
}

/// Stage 1: the embedded track object, if any.
pub fn from_structured(document: &Html, record: TrackRecord, origin: &str) -> TrackRecord {
    match locate(document) {
        Some(blob) => match find_track_node(&blob) {
            Some(node) => fill_from_track_node(node, record, origin),
            None => record,
        },
        None => record,
    }
}

fn fill_from_track_node(
    node: &Map<String, Value>,
    mut record: TrackRecord,
    origin: &str,
) -> TrackRecord {
    if record.title.is_empty() {
        if let Some(title) = str_field(node, &["name", "title"]) {
            record.title = title.to_string();
        }
    }

    let artists: Vec<&Map<String, Value>> = node
        .get("artists")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();

    if record.artist.is_empty() {
        record.artist = artists
            .iter()
            .filter_map(|a| str_field(a, &["name", "title"]))
            .unique()
            .join(", ");
    }

    if record.artist_url.is_empty() {
        if let Some(href) = artists
            .iter()
            .filter(|a| str_field(a, &["name", "title"]).is_some())
            .find_map(|a| artist_href(a, origin))
        {
            record.artist_url = href;
        }
    }

    if record.identifier.is_empty() {
        if let Some(id) = id_field(node, &["id", "trackId", "track_id"]) {
            record.identifier = id;
        }
    }

    if record.detail_url.is_empty() {
        record.detail_url = track_url(node, origin).unwrap_or_default();
    }

    record
}

fn artist_href(artist: &Map<String, Value>, origin: &str) -> Option<String> {
    if let Some(href) = str_field(artist, &["url", "href"]) {
        return Some(absolutize(href, origin));
    }
    let slug = str_field(artist, &["slug"])?;
    let id = id_field(artist, &["id"])?;
    Some(format!("{origin}/artist/{slug}/{id}"))
}

fn track_url(node: &Map<String, Value>, origin: &str) -> Option<String> {
    if let Some(url) = str_field(node, &["url"]).filter(|u| is_absolute(u)) {
        return Some(url.to_string());
    }
    if let Some(url) = str_field(node, &["shareUrl", "share_url"]) {
        return Some(absolutize(url, origin));
    }
    let slug = str_field(node, &["slug"])?;
    let id = id_field(node, &["id", "trackId", "track_id"])?;
    Some(format!("{origin}/track/{slug}/{id}"))
}

/// Stage 2: first artist link inside an element whose class names an
/// `Artists` block.
pub fn artist_from_markup(document: &Html, mut record: TrackRecord, origin: &str) -> TrackRecord {
    if !record.artist.is_empty() {
        return record;
    }
    let link = document
        .select(&ARTISTS_BLOCK)
        .find_map(|block| block.select(&ARTIST_LINK).next());
    if let Some(link) = link {
        record.artist = visible_text(link);
        if record.artist_url.is_empty() {
            if let Some(href) = link.value().attr("href") {
                record.artist_url = absolutize(href, origin);
            }
        }
    }
    record
}

/// Stage 3: the page's first `<h1>`.
pub fn title_from_markup(document: &Html, mut record: TrackRecord) -> TrackRecord {
    if record.title.is_empty() {
        if let Some(h1) = document.select(&H1).next() {
            record.title = visible_text(h1);
        }
    }
    record
}

/// Stage 4: `<link rel="canonical">`.
pub fn url_from_canonical(document: &Html, mut record: TrackRecord, origin: &str) -> TrackRecord {
    if record.detail_url.is_empty() {
        if let Some(href) = document
            .select(&CANONICAL)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
        {
            record.detail_url = absolutize(href, origin);
        }
    }
    record
}

/// Stage 5: trailing digits of the detail URL.
pub fn id_from_url(mut record: TrackRecord) -> TrackRecord {
    if record.identifier.is_empty() && !record.detail_url.is_empty() {
        record.identifier = trailing_id(&record.detail_url).unwrap_or_default();
    }
    record
}

/// Trailing run of digits in a URL (`.../track/foo/123` -> `123`).
pub fn trailing_id(url: &str) -> Option<String> {
    TRAILING_DIGITS
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn visible_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).join(" ")
}

fn is_absolute(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

/// Resolve `href` against the site origin; absolute URLs pass through.
pub fn absolutize(href: &str, origin: &str) -> String {
    if is_absolute(href) {
        return href.to_string();
    }
    Url::parse(origin)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}/{}", origin, href.trim_start_matches('/')))
}
