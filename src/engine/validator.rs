use log::{debug, info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::engine::models::{ServerEntry, ValidatedSelection};
use crate::integrity;
use crate::manifest::{self, ParseFailure};
use crate::networking::{FetchOutcome, HttpTransport, RetryingFetcher};

/// Why a single server was passed over. None of these stop the validation
/// loop except `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerRejection {
    #[error("manifest unreachable: {0}")]
    Transport(String),
    #[error("manifest request returned HTTP {0}")]
    Http(u16),
    #[error("manifest hash mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("cancelled")]
    Cancelled,
}

/// Picks the first server, in list order, whose manifest can be fetched,
/// matches its declared hash and parses.
pub struct ServerValidator<'a, T> {
    fetcher: &'a RetryingFetcher<T>,
}

impl<'a, T: HttpTransport> ServerValidator<'a, T> {
    pub fn new(fetcher: &'a RetryingFetcher<T>) -> Self {
        Self { fetcher }
    }

    /// Try `servers` in order and return the first that passes. `on_trial`
    /// is called as `(entry, position, total)` before each server is tried;
    /// `position` is 1-based.
    pub async fn validate<F>(
        &self,
        servers: &[ServerEntry],
        cancel: &CancellationToken,
        mut on_trial: F,
    ) -> Option<ValidatedSelection>
    where
        F: FnMut(&ServerEntry, usize, usize),
    {
        let total = servers.len();
        for (idx, server) in servers.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("validation: cancelled before trying {}", server.name);
                return None;
            }
            on_trial(server, idx + 1, total);
            debug!(
                "validation: trying {} ({}/{}) at {}",
                server.name,
                idx + 1,
                total,
                server.manifest_url
            );

            match self.check_server(server, cancel).await {
                Ok(selection) => {
                    info!(
                        "validation: selected {} (manifest {})",
                        server.name, selection.manifest_hash
                    );
                    return Some(selection);
                }
                Err(ServerRejection::Cancelled) => {
                    warn!("validation: cancelled while trying {}", server.name);
                    return None;
                }
                Err(rejection) => {
                    warn!("validation: skipping {}: {rejection}", server.name);
                }
            }
        }

        warn!("validation: none of {total} server(s) passed");
        None
    }

    pub async fn check_server(
        &self,
        server: &ServerEntry,
        cancel: &CancellationToken,
    ) -> Result<ValidatedSelection, ServerRejection> {
        let bytes = match self.fetcher.fetch(&server.manifest_url, cancel).await {
            FetchOutcome::Success(bytes) => bytes,
            FetchOutcome::HttpError(status) => return Err(ServerRejection::Http(status)),
            FetchOutcome::TransportError(cause) => return Err(ServerRejection::Transport(cause)),
            FetchOutcome::Cancelled => return Err(ServerRejection::Cancelled),
        };

        let digest = integrity::digest_hex(&bytes);
        if !integrity::verify_digest(&digest, server.manifest_hash.as_deref()) {
            return Err(ServerRejection::IntegrityMismatch {
                expected: server.manifest_hash.clone().unwrap_or_default(),
                actual: digest,
            });
        }

        let manifest = manifest::parse(&bytes)?;
        Ok(ValidatedSelection {
            server: server.clone(),
            manifest,
            manifest_hash: digest,
        })
    }
}
