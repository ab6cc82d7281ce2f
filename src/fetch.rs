//! Outbound page fetching.
//!
//! # Architecture
//!
//! - [`Fetch`]: the transport seam; one GET returning the body text
//! - [`HttpFetcher`]: `reqwest` implementation with browser-like headers
//! - [`RetryFetch`]: decorator adding exponential backoff to any [`Fetch`]
//!
//! # Retry Strategy
//!
//! - Exponential backoff starting at 500ms, capped at 10 seconds
//! - Random jitter (0-250ms) added to every delay
//! - 4xx responses are returned immediately

use crate::config::Timeouts;
use crate::error::FetchError;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const ACCEPT_LANG: &str = "en-US,en;q=0.9";

/// A source of page bodies.
///
/// Implementors must fail with [`FetchError`] on a non-2xx status or an
/// elapsed timeout.
pub trait Fetch: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        timeouts: Timeouts,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

impl<T: Fetch> Fetch for &T {
    fn fetch(
        &self,
        url: &str,
        timeouts: Timeouts,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        (**self).fetch(url, timeouts)
    }
}

/// `reqwest`-backed fetcher.
///
/// Connect and read timeouts live on the client, so one client is built per
/// timeout profile and reused for every request with that profile.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    clients: Mutex<Vec<(Timeouts, reqwest::Client)>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANG));
        headers
    }

    fn client_for(&self, url: &str, timeouts: Timeouts) -> Result<reqwest::Client, FetchError> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((_, client)) = clients.iter().find(|(t, _)| *t == timeouts) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(Self::default_headers())
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        debug!(?timeouts, "Built HTTP client for timeout profile");
        clients.push((timeouts, client.clone()));
        Ok(client)
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str, timeouts: Timeouts) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let client = self.client_for(url, timeouts)?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
#[derive(Debug)]
pub struct RetryFetch<F> {
    inner: F,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<F: Fetch> RetryFetch<F> {
    pub fn new(inner: F, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<F: Fetch> Fetch for RetryFetch<F> {
    async fn fetch(&self, url: &str, timeouts: Timeouts) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url, timeouts).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries || !e.is_retryable() {
                        if self.max_retries > 0 {
                            error!(
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_total = total_dt.as_millis() as u64,
                                error = %e,
                                "fetch() gave up"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with the given status a fixed number of times, then succeeds.
    struct Flaky {
        failures: usize,
        status: u16,
        calls: AtomicUsize,
    }

    impl Fetch for Flaky {
        async fn fetch(&self, url: &str, _timeouts: Timeouts) -> Result<String, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: self.status,
                })
            } else {
                Ok("body".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_errors() {
        let inner = Flaky {
            failures: 2,
            status: 503,
            calls: AtomicUsize::new(0),
        };
        let fetcher = RetryFetch::new(&inner, 3, Duration::from_millis(10));
        let body = fetcher
            .fetch("https://example.com", Timeouts::LISTING)
            .await
            .unwrap();
        assert_eq!(body, "body");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let inner = Flaky {
            failures: 10,
            status: 500,
            calls: AtomicUsize::new(0),
        };
        let fetcher = RetryFetch::new(&inner, 2, Duration::from_millis(10));
        let err = fetcher
            .fetch("https://example.com", Timeouts::LISTING)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_client_errors() {
        let inner = Flaky {
            failures: 10,
            status: 404,
            calls: AtomicUsize::new(0),
        };
        let fetcher = RetryFetch::new(&inner, 5, Duration::from_millis(10));
        assert!(
            fetcher
                .fetch("https://example.com", Timeouts::LISTING)
                .await
                .is_err()
        );
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let fetcher = RetryFetch::new(HttpFetcher::new(), 20, Duration::from_secs(1));
        let delay = fetcher.delay_for(12);
        assert!(delay >= Duration::from_secs(10));
        assert!(delay <= Duration::from_millis(10_250));
    }

    #[test]
    fn test_client_cached_per_profile() {
        let fetcher = HttpFetcher::new();
        fetcher.client_for("https://example.com", Timeouts::LISTING).unwrap();
        fetcher.client_for("https://example.com", Timeouts::LISTING).unwrap();
        fetcher.client_for("https://example.com", Timeouts::DETAIL).unwrap();
        assert_eq!(fetcher.clients.lock().unwrap().len(), 2);
    }

    async fn echo_headers(headers: axum::http::HeaderMap) -> String {
        ["user-agent", "accept", "accept-language"]
            .iter()
            .map(|name| {
                headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Local site with an echo route, a 410 route and a route that stalls.
    async fn spawn_site() -> String {
        use axum::http::StatusCode;
        use axum::routing::get;

        let app = axum::Router::new()
            .route("/echo", get(echo_headers))
            .route("/gone", get(|| async { (StatusCode::GONE, "gone") }))
            .route(
                "/slow",
                get(|| async {
                    sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_fetcher_sends_browser_headers() {
        let base = spawn_site().await;
        let body = HttpFetcher::new()
            .fetch(&format!("{base}/echo"), Timeouts::LISTING)
            .await
            .unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines, vec![USER_AGENT, ACCEPT_HTML, ACCEPT_LANG]);
    }

    #[tokio::test]
    async fn test_http_fetcher_maps_non_success_status() {
        let base = spawn_site().await;
        let err = HttpFetcher::new()
            .fetch(&format!("{base}/gone"), Timeouts::DETAIL)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 410, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_http_fetcher_maps_read_timeout() {
        let base = spawn_site().await;
        let timeouts = Timeouts {
            connect: Duration::from_secs(1),
            read: Duration::from_millis(300),
        };
        let err = HttpFetcher::new()
            .fetch(&format!("{base}/slow"), timeouts)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "{err:?}");
    }
}
