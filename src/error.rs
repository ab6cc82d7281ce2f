//! Error types for the chart pipeline.
//!
//! Only a [`FetchError`] on the listing page aborts an aggregation. Every
//! other failure is either reported up front ([`ValidationError`]) or absorbed
//! where it happens ([`ExtractionError`], detail-page [`FetchError`]s).

use thiserror::Error;

/// Failure of a single outbound page request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("GET {url} timed out")]
    Timeout { url: String },
    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url} abandoned: batch deadline elapsed")]
    Deadline { url: String },
}

impl FetchError {
    /// Map a reqwest error onto the taxonomy, keeping timeouts distinct.
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = source.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Client errors will not change on a second attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Status { status, .. } if (400..500).contains(status))
    }
}

/// Bad caller input, detected before any network access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported genre `{genre}` (allowed: {allowed})")]
    UnknownGenre { genre: String, allowed: String },
    #[error("deep_limit must be a positive integer")]
    ZeroDeepLimit,
}

/// Why the embedded page data could not be used.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no embedded data element in page")]
    MissingBlob,
    #[error("embedded data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Problems loading runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid genre map in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("genre map in {path} has no entries")]
    EmptyGenreMap { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_not_retryable() {
        let e = FetchError::Status {
            url: "https://example.com".to_string(),
            status: 404,
        };
        assert!(!e.is_retryable());

        let e = FetchError::Status {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert!(e.is_retryable());

        let e = FetchError::Timeout {
            url: "https://example.com".to_string(),
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn test_unknown_genre_message_lists_allowed() {
        let e = ValidationError::UnknownGenre {
            genre: "jazz".to_string(),
            allowed: "hard-techno, techno".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "unsupported genre `jazz` (allowed: hard-techno, techno)"
        );
    }
}
