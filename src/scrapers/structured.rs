//! Embedded page data (`__NEXT_DATA__`) lookup.
//!
//! Beatport renders its pages client-side from a JSON document carried in
//! `<script id="__NEXT_DATA__" type="application/json">`. When present it
//! holds the complete track object; when absent or unparseable the caller
//! falls back to markup heuristics.

use crate::error::ExtractionError;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

static BLOB_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script#__NEXT_DATA__[type="application/json"]"#)
        .expect("static selector")
});

/// Find and parse the embedded JSON document. `None` is an expected outcome.
pub fn locate(document: &Html) -> Option<Value> {
    match parse_blob(document) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "No usable embedded data");
            None
        }
    }
}

fn parse_blob(document: &Html) -> Result<Value, ExtractionError> {
    let element = document
        .select(&BLOB_SELECTOR)
        .next()
        .ok_or(ExtractionError::MissingBlob)?;
    let text = element.text().collect::<String>();

    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(_) => {
            // Some pages double-encode the blob.
            let unescaped = html_escape::decode_html_entities(&text);
            Ok(serde_json::from_str(&unescaped)?)
        }
    }
}

/// First key present with a non-empty string value.
pub fn str_field<'a>(node: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| node.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// First key present holding a number or a non-empty string, as text.
pub fn id_field(node: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| node.get(*k)).find_map(|v| match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn is_track_node(node: &Map<String, Value>) -> bool {
    matches!(node.get("artists"), Some(Value::Array(_)))
        && (node.contains_key("name") || node.contains_key("title"))
}

/// Depth-first, pre-order search for the first object shaped like a track:
/// an `artists` array next to a `name` or `title` key.
pub fn find_track_node(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if is_track_node(map) {
                return Some(map);
            }
            map.values().find_map(find_track_node)
        }
        Value::Array(items) => items.iter().find_map(find_track_node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(blob: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><head><script id="__NEXT_DATA__" type="application/json">{blob}</script></head><body></body></html>"#
        ))
    }

    #[test]
    fn test_locate_parses_blob() {
        let doc = page(r#"{"props":{"pageProps":{"track":{"id":1}}}}"#);
        let value = locate(&doc).unwrap();
        assert_eq!(value["props"]["pageProps"]["track"]["id"], json!(1));
    }

    #[test]
    fn test_locate_retries_after_unescaping_entities() {
        let doc = page(r#"{&quot;name&quot;:&quot;Acid &amp; Rain&quot;}"#);
        let value = locate(&doc).unwrap();
        assert_eq!(value["name"], json!("Acid & Rain"));
    }

    #[test]
    fn test_locate_missing_or_broken_is_none() {
        let doc = Html::parse_document("<html><body><h1>Hi</h1></body></html>");
        assert!(locate(&doc).is_none());

        let doc = page("{not json");
        assert!(locate(&doc).is_none());
    }

    #[test]
    fn test_locate_requires_json_type() {
        let doc = Html::parse_document(
            r#"<script id="__NEXT_DATA__" type="text/javascript">{"a":1}</script>"#,
        );
        assert!(locate(&doc).is_none());
    }

    #[test]
    fn test_find_track_node_first_in_document_order() {
        let value = json!({
            "props": {
                "related": [
                    {"name": "First", "artists": [{"name": "A"}]},
                    {"name": "Second", "artists": [{"name": "B"}]}
                ],
                "track": {"name": "Third", "artists": []}
            }
        });
        let node = find_track_node(&value).unwrap();
        assert_eq!(node["name"], json!("First"));
    }

    #[test]
    fn test_find_track_node_prefers_parent_over_children() {
        let value = json!({
            "title": "Outer",
            "artists": [{"name": "A", "artists": [], "title": "Inner"}]
        });
        let node = find_track_node(&value).unwrap();
        assert_eq!(node["title"], json!("Outer"));
    }

    #[test]
    fn test_find_track_node_requires_artist_array() {
        let value = json!({
            "a": {"name": "No artists"},
            "b": {"name": "Artists not a list", "artists": "X"},
            "c": [[{"title": "Deep", "artists": []}]]
        });
        let node = find_track_node(&value).unwrap();
        assert_eq!(node["title"], json!("Deep"));

        assert!(find_track_node(&json!({"artists": []})).is_none());
        assert!(find_track_node(&json!("scalar")).is_none());
    }

    #[test]
    fn test_id_field_accepts_numbers_and_strings() {
        let node = json!({"id": 123, "trackId": "456"});
        let map = node.as_object().unwrap();
        assert_eq!(id_field(map, &["id", "trackId"]).as_deref(), Some("123"));
        assert_eq!(id_field(map, &["trackId"]).as_deref(), Some("456"));
        assert_eq!(id_field(map, &["missing"]), None);
    }
}
