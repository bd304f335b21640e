use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::networking::{FetchOutcome, HttpTransport, RetryingFetcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionDecision {
    Proceed,
    /// The server advertises a different launcher version.
    Blocked { remote_version: String },
}

/// Compares the running launcher version with the token published at
/// `version_url`. Anything that prevents a comparison lets startup continue.
pub struct VersionGate<'a, T> {
    fetcher: &'a RetryingFetcher<T>,
    version_url: &'a str,
}

impl<'a, T: HttpTransport> VersionGate<'a, T> {
    pub fn new(fetcher: &'a RetryingFetcher<T>, version_url: &'a str) -> Self {
        Self {
            fetcher,
            version_url,
        }
    }

    pub async fn check(&self, local_version: &str, cancel: &CancellationToken) -> VersionDecision {
        let bytes = match self.fetcher.fetch(self.version_url, cancel).await {
            FetchOutcome::Success(bytes) => bytes,
            other => {
                warn!("version check: could not fetch remote version ({other:?}); not blocking");
                return VersionDecision::Proceed;
            }
        };

        let Ok(text) = String::from_utf8(bytes) else {
            warn!("version check: remote version is not UTF-8; not blocking");
            return VersionDecision::Proceed;
        };
        let remote = normalize_version(&text);
        if remote.is_empty() {
            warn!("version check: remote version is empty; not blocking");
            return VersionDecision::Proceed;
        }

        if versions_match(local_version, remote) {
            info!("version check: launcher {local_version} is current");
            VersionDecision::Proceed
        } else {
            warn!("version check: launcher {local_version} differs from published {remote}");
            VersionDecision::Blocked {
                remote_version: remote.to_owned(),
            }
        }
    }
}

fn normalize_version(version: &str) -> &str {
    version.trim()
}

/// Ordinal, case-insensitive equality of two version tokens.
fn versions_match(local: &str, remote: &str) -> bool {
    normalize_version(local).to_lowercase() == normalize_version(remote).to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::networking::RetryPolicy;
    use crate::networking::testing::ScriptedTransport;

    const URL: &str = "https://launcher.example.com/version.txt";

    fn gate_fetcher(transport: ScriptedTransport) -> RetryingFetcher<Arc<ScriptedTransport>> {
        RetryingFetcher::new(
            Arc::new(transport),
            RetryPolicy {
                attempts: 2,
                delay: Duration::ZERO,
            },
        )
    }

    async fn check(transport: ScriptedTransport, local: &str) -> VersionDecision {
        let fetcher = gate_fetcher(transport);
        VersionGate::new(&fetcher, URL)
            .check(local, &CancellationToken::new())
            .await
    }

    #[test]
    fn matches_ignoring_case_and_whitespace() {
        assert!(versions_match("1.2.0-RC1", " 1.2.0-rc1\r\n"));
        assert!(!versions_match("1.2.0", "1.2.1"));
        assert!(!versions_match("1.2", "1.2.0"));
    }

    #[tokio::test]
    async fn proceeds_when_versions_match() {
        let transport = ScriptedTransport::new().respond(URL, 200, "0.2.0-Beta\n");
        assert_eq!(check(transport, "0.2.0-beta").await, VersionDecision::Proceed);
    }

    #[tokio::test]
    async fn blocks_on_different_version() {
        let transport = ScriptedTransport::new().respond(URL, 200, "  0.3.0 \n");
        assert_eq!(
            check(transport, "0.2.0").await,
            VersionDecision::Blocked {
                remote_version: "0.3.0".into()
            }
        );
    }

    #[tokio::test]
    async fn fails_open_when_unreachable() {
        let transport = ScriptedTransport::new().fail(URL, "timed out");
        assert_eq!(check(transport, "0.2.0").await, VersionDecision::Proceed);

        let transport = ScriptedTransport::new().respond(URL, 502, "");
        assert_eq!(check(transport, "0.2.0").await, VersionDecision::Proceed);
    }

    #[tokio::test]
    async fn fails_open_on_unusable_body() {
        let transport = ScriptedTransport::new().respond(URL, 200, "   ");
        assert_eq!(check(transport, "0.2.0").await, VersionDecision::Proceed);

        let transport = ScriptedTransport::new().respond(URL, 200, vec![0xff, 0xfe]);
        assert_eq!(check(transport, "0.2.0").await, VersionDecision::Proceed);
    }
}
