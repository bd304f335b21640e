use std::sync::Arc;
use std::time::Duration;

use log::{error, warn};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

/// Status and body of a completed HTTP exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between the fetch policy and the wire.
///
/// `Err` carries a description of a transport-level failure (DNS, timeout,
/// reset, truncated body). Any response with a status line is `Ok`, whatever
/// the status.
#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, String>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn get(&self, url: &str) -> Result<HttpResponse, String> {
        (**self).get(url).await
    }
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("waypoint-launcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }
}

impl HttpTransport for NetworkClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("GET {url} failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Ok(HttpResponse {
                status: status.as_u16(),
                body: Vec::new(),
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("reading body of {url} failed: {e}"))?;
        Ok(HttpResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

/// Result of a fetch after retries. Failures are never turned into empty data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(Vec<u8>),
    HttpError(u16),
    TransportError(String),
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Fixed pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: crate::config::NETWORK_RETRY_COUNT,
            delay: Duration::from_millis(crate::config::NETWORK_RETRY_DELAY_MS),
        }
    }
}

/// HTTP GET with a bounded number of attempts and a fixed backoff.
pub struct RetryingFetcher<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RetryingFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> FetchOutcome {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return FetchOutcome::Cancelled;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return FetchOutcome::Cancelled,
                result = self.transport.get(url) => result,
            };

            let failure = match result {
                Ok(response) if response.is_success() => {
                    return FetchOutcome::Success(response.body);
                }
                Ok(response) => {
                    warn!(
                        "fetch {url}: attempt {attempt}/{attempts} returned HTTP {}",
                        response.status
                    );
                    FetchOutcome::HttpError(response.status)
                }
                Err(cause) => {
                    warn!("fetch {url}: attempt {attempt}/{attempts} failed: {cause}");
                    FetchOutcome::TransportError(cause)
                }
            };

            if attempt >= attempts {
                error!("fetch {url}: giving up after {attempts} attempt(s)");
                return failure;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return FetchOutcome::Cancelled,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
            attempt += 1;
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::testing::{HangingTransport, ScriptedTransport};
    use super::*;

    const URL: &str = "https://servers.example.com/manifest.xml";

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 2,
            delay: Duration::from_millis(500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_one_failure_waiting_once() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail(URL, "connection reset")
                .respond(URL, 200, "payload"),
        );
        let fetcher = RetryingFetcher::new(transport.clone(), policy());

        let started = Instant::now();
        let outcome = fetcher.fetch(URL, &CancellationToken::new()).await;

        assert_eq!(outcome, FetchOutcome::Success(b"payload".to_vec()));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(500), "waited {waited:?}");
        assert!(waited < Duration::from_millis(1000), "waited {waited:?}");
        assert_eq!(transport.call_count(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_http_errors_then_succeeds() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(URL, 503, "")
                .respond(URL, 200, "ok"),
        );
        let fetcher = RetryingFetcher::new(transport.clone(), policy());

        let outcome = fetcher.fetch(URL, &CancellationToken::new()).await;
        assert_eq!(outcome, FetchOutcome::Success(b"ok".to_vec()));
        assert_eq!(transport.call_count(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_on_transport_failure() {
        let transport = Arc::new(ScriptedTransport::new().fail(URL, "dns failure"));
        let fetcher = RetryingFetcher::new(transport.clone(), policy());

        let outcome = fetcher.fetch(URL, &CancellationToken::new()).await;
        assert_eq!(outcome, FetchOutcome::TransportError("dns failure".into()));
        assert_eq!(transport.call_count(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_on_http_failure() {
        let transport = Arc::new(ScriptedTransport::new().respond(URL, 404, ""));
        let fetcher = RetryingFetcher::new(
            transport.clone(),
            RetryPolicy {
                attempts: 3,
                delay: Duration::from_millis(10),
            },
        );

        let outcome = fetcher.fetch(URL, &CancellationToken::new()).await;
        assert_eq!(outcome, FetchOutcome::HttpError(404));
        assert_eq!(transport.call_count(URL), 3);
    }

    #[tokio::test]
    async fn does_not_touch_network_when_already_cancelled() {
        let transport = Arc::new(ScriptedTransport::new().respond(URL, 200, "x"));
        let fetcher = RetryingFetcher::new(transport.clone(), policy());
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(fetcher.fetch(URL, &cancel).await, FetchOutcome::Cancelled);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_retry_wait() {
        let transport = Arc::new(ScriptedTransport::new().respond(URL, 500, ""));
        let fetcher = RetryingFetcher::new(
            transport.clone(),
            RetryPolicy {
                attempts: 2,
                delay: Duration::from_secs(60),
            },
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        assert_eq!(fetcher.fetch(URL, &cancel).await, FetchOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(transport.call_count(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_pending_request() {
        let fetcher = RetryingFetcher::new(HangingTransport, policy());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        assert_eq!(fetcher.fetch(URL, &cancel).await, FetchOutcome::Cancelled);
    }
}
