//! Delivery of form-encoded hits to the collection endpoint.
//!
//! [`DirectTransport`] makes exactly one request per hit. Retry policy is
//! layered on top by wrapping any transport in a [`RetryingTransport`].

use crate::errors::TransportError;
use crate::metrics_defs::{HITS_RETRIED, counter};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tokio::time::{Duration, sleep};
use url::Url;

#[async_trait]
pub trait HitTransport: Send + Sync {
    /// Posts `body` as `application/x-www-form-urlencoded`. Any non-2xx
    /// response is an error; the response body is ignored.
    async fn post_form(&self, url: &Url, body: &[(String, String)]) -> Result<(), TransportError>;
}

#[derive(Clone, Default)]
pub struct DirectTransport {
    client: reqwest::Client,
}

impl DirectTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HitTransport for DirectTransport {
    async fn post_form(&self, url: &Url, body: &[(String, String)]) -> Result<(), TransportError> {
        let response = self.client.post(url.clone()).form(body).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        Ok(())
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_retry_on_status() -> Vec<u16> {
    vec![
        408, // Request Timeout
        429, // Too Many Requests
        500, // Internal Server Error
        502, // Bad Gateway
        503, // Service Unavailable
        504, // Gateway Timeout
    ]
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Attempts after the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_retry_on_status")]
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_on_status: default_retry_on_status(),
        }
    }
}

impl RetryConfig {
    /// Exponential delay for the given retry (0-based), capped, with up to 50%
    /// random jitter subtracted.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(retry))
            .min(self.max_backoff_ms);
        let jitter = if exp > 1 {
            rand::thread_rng().gen_range(0..=exp / 2)
        } else {
            0
        };
        Duration::from_millis(exp - jitter)
    }
}

/// Retries retriable failures of the wrapped transport with exponential
/// backoff. The last error is returned once retries are exhausted.
pub struct RetryingTransport<T> {
    inner: T,
    config: RetryConfig,
}

impl<T: HitTransport> RetryingTransport<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        RetryingTransport { inner, config }
    }
}

#[async_trait]
impl<T: HitTransport> HitTransport for RetryingTransport<T> {
    async fn post_form(&self, url: &Url, body: &[(String, String)]) -> Result<(), TransportError> {
        let mut retries = 0;

        loop {
            let err = match self.inner.post_form(url, body).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if retries >= self.config.max_retries
                || !err.is_retriable(&self.config.retry_on_status)
            {
                tracing::error!(error = %err, attempts = retries + 1, "Giving up delivering hit");
                return Err(err);
            }

            let delay = self.config.backoff(retries);
            tracing::warn!(error = %err, retry = retries + 1, ?delay, "Retrying hit delivery");
            counter!(HITS_RETRIED).increment(1);

            sleep(delay).await;
            retries += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            ..Default::default()
        }
    }

    fn body() -> Vec<(String, String)> {
        vec![
            ("t".into(), "event".into()),
            ("ea".into(), "en US".into()),
        ]
    }

    /// Fails with the given statuses in order, then succeeds.
    struct ScriptedTransport {
        failures: Vec<StatusCode>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HitTransport for ScriptedTransport {
        async fn post_form(&self, _: &Url, _: &[(String, String)]) -> Result<(), TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.get(call) {
                Some(status) => Err(TransportError::Status(*status)),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig::default();
        for retry in 0..10 {
            let delay = config.backoff(retry);
            assert!(delay <= Duration::from_millis(config.max_backoff_ms));
        }
        let first = config.backoff(0);
        assert!(first >= Duration::from_millis(250) && first <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_direct_single_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/collect"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("t=event&ea=en+US"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/collect", mock_server.uri())).unwrap();
        DirectTransport::new().post_form(&url, &body()).await.unwrap();
    }

    #[tokio::test]
    async fn test_direct_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/collect", mock_server.uri())).unwrap();
        let result = DirectTransport::new().post_form(&url, &body()).await;
        assert!(matches!(
            result,
            Err(TransportError::Status(StatusCode::SERVICE_UNAVAILABLE))
        ));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = RetryingTransport::new(
            ScriptedTransport {
                failures: vec![StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS],
                calls: calls.clone(),
            },
            fast_retries(3),
        );

        let url = Url::parse("http://127.0.0.1/collect").unwrap();
        transport.post_form(&url, &body()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/collect", mock_server.uri())).unwrap();
        let transport = RetryingTransport::new(DirectTransport::new(), fast_retries(2));
        let result = transport.post_form(&url, &body()).await;
        assert!(matches!(
            result,
            Err(TransportError::Status(StatusCode::BAD_GATEWAY))
        ));
    }

    #[tokio::test]
    async fn test_non_retriable_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = RetryingTransport::new(
            ScriptedTransport {
                failures: vec![StatusCode::BAD_REQUEST],
                calls: calls.clone(),
            },
            fast_retries(3),
        );

        let url = Url::parse("http://127.0.0.1/collect").unwrap();
        assert!(transport.post_form(&url, &body()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
