use std::env;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";
const SERVERS_FILE: &str = "servers.json";
const LOG_FILE: &str = "launcher.log";

/// Returns the root directory used by the launcher for its own state.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share")),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("waypoint-launcher")
}

/// Locations of every file the launcher owns inside its data directory.
#[derive(Clone, Debug)]
pub struct LauncherPaths {
    root: PathBuf,
}

impl LauncherPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn servers_file(&self) -> PathBuf {
        self.root.join(SERVERS_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// Backup slot the log is renamed to when it grows past the threshold.
    pub fn rotated_log_file(&self) -> PathBuf {
        self.root.join(format!("{LOG_FILE}.1"))
    }

    /// Previous launcher binary left behind by a self-update.
    pub fn legacy_launcher(&self) -> PathBuf {
        let name = if cfg!(target_os = "windows") {
            "waypoint-launcher.old.exe"
        } else {
            "waypoint-launcher.old"
        };
        self.root.join(name)
    }
}

impl Default for LauncherPaths {
    fn default() -> Self {
        Self::new(default_app_dir())
    }
}
