use std::path::PathBuf;
use std::time::Duration;

use crate::engine::models::ServerEntry;
use crate::env::LauncherPaths;
use crate::networking::RetryPolicy;

pub const VERSION_URL: &str = "https://launcher.waypoint.example.com/version.txt";
pub const DEFAULT_MANIFEST_URL: &str = "https://launcher.waypoint.example.com/default_manifest.xml";
pub const DEFAULT_SERVER_NAME: &str = "Default";

/// Total attempts per fetch.
pub const NETWORK_RETRY_COUNT: u32 = 2;
pub const NETWORK_RETRY_DELAY_MS: u64 = 500;
pub const HTTP_TIMEOUT_SECS: u64 = 100;
pub const LOG_MAX_BYTES: u64 = 5_000_000;

/// Process exit code after a completed `--uninstall`.
pub const EXIT_CODE_UNINSTALLED: u8 = 3;
/// Exit code when a second Ctrl-C ends the process.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Runtime configuration assembled from compile-time defaults and CLI/env
/// overrides.
#[derive(Clone, Debug)]
pub struct LauncherConfig {
    pub paths: LauncherPaths,
    pub version_url: String,
    /// Tried when the persisted server list is empty.
    pub fallback_servers: Vec<ServerEntry>,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    pub log_max_bytes: u64,
    pub local_version: String,
    /// Replaces the stored install path when set.
    pub install_path_override: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            paths: LauncherPaths::default(),
            version_url: VERSION_URL.to_owned(),
            fallback_servers: vec![ServerEntry::new(
                DEFAULT_SERVER_NAME,
                DEFAULT_MANIFEST_URL,
                None,
            )],
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            log_max_bytes: LOG_MAX_BYTES,
            local_version: env!("CARGO_PKG_VERSION").to_owned(),
            install_path_override: None,
        }
    }
}

impl LauncherConfig {
    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.paths = LauncherPaths::new(dir);
        }
        self
    }

    pub fn with_version_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|url| !url.trim().is_empty()) {
            self.version_url = url.trim().to_owned();
        }
        self
    }

    /// An explicit fallback list replaces the built-in one entirely.
    pub fn with_fallback_manifests(mut self, urls: Vec<String>) -> Self {
        if !urls.is_empty() {
            self.fallback_servers = urls
                .into_iter()
                .enumerate()
                .map(|(idx, url)| ServerEntry::new(format!("Fallback {}", idx + 1), url, None))
                .collect();
        }
        self
    }

    pub fn with_install_path(mut self, path: Option<PathBuf>) -> Self {
        self.install_path_override = path;
        self
    }
}
