use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::engine::models::{ServerEntry, Settings};
use crate::env::LauncherPaths;
use crate::util::non_empty_trimmed;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unable to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A server as written in `servers.json`, before sanitizing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub manifest_url: Option<String>,
    #[serde(default)]
    pub manifest_hash: Option<String>,
}

impl From<ServerEntry> for ServerRecord {
    fn from(entry: ServerEntry) -> Self {
        Self {
            name: Some(entry.name),
            manifest_url: Some(entry.manifest_url),
            manifest_hash: entry.manifest_hash,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServerListFile {
    #[serde(default)]
    servers: Vec<ServerRecord>,
}

/// Trim every field, drop records without a name or URL, and turn a blank
/// hash into "no verification". Order is preserved.
pub fn sanitize_servers(records: impl IntoIterator<Item = ServerRecord>) -> Vec<ServerEntry> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            let name = non_empty_trimmed(record.name.as_deref());
            let url = non_empty_trimmed(record.manifest_url.as_deref());
            match (name, url) {
                (Some(name), Some(manifest_url)) => Some(ServerEntry {
                    name,
                    manifest_url,
                    manifest_hash: non_empty_trimmed(record.manifest_hash.as_deref()),
                }),
                (name, url) => {
                    warn!(
                        "servers: dropping entry #{} (name={:?}, url={:?}): missing {}",
                        idx + 1,
                        name,
                        url,
                        if name.is_none() { "name" } else { "manifest URL" }
                    );
                    None
                }
            }
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct StorageManager {
    paths: LauncherPaths,
}

impl StorageManager {
    /// The data directory is only created by the first write.
    pub fn new(paths: LauncherPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    /// Missing or unreadable settings count as "nothing stored yet".
    pub async fn read_settings(&self) -> Settings {
        let path = self.paths.settings_file();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("settings: unable to read {}: {err}", path.display());
                }
                return Settings::default();
            }
        };
        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(mut settings) => {
                settings.install_path = settings
                    .install_path
                    .filter(|p| !p.as_os_str().is_empty());
                settings
            }
            Err(err) => {
                warn!("settings: ignoring unparseable {}: {err}", path.display());
                Settings::default()
            }
        }
    }

    pub async fn write_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        let path = self.paths.settings_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    action: "create settings dir",
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let body = serde_json::to_vec_pretty(settings)?;
        fs::write(&path, body)
            .await
            .map_err(|source| StorageError::Io {
                action: "write",
                path,
                source,
            })
    }

    /// Raw records in file order. A missing or unparseable file yields an
    /// empty list.
    pub async fn read_servers(&self) -> Vec<ServerRecord> {
        let path = self.paths.servers_file();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("servers: no list at {}", path.display());
                return Vec::new();
            }
            Err(err) => {
                warn!("servers: unable to read {}: {err}", path.display());
                return Vec::new();
            }
        };
        match serde_json::from_slice::<ServerListFile>(&bytes) {
            Ok(file) => file.servers,
            Err(err) => {
                warn!("servers: ignoring unparseable {}: {err}", path.display());
                Vec::new()
            }
        }
    }

    /// Delete the previous launcher binary if a self-update left one behind.
    /// Never fails; the outcome is only logged.
    pub async fn remove_legacy_launcher(&self) -> bool {
        let path = self.paths.legacy_launcher();
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("cleanup: deleted old launcher {}", path.display());
                true
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("cleanup: no old launcher at {}", path.display());
                false
            }
            Err(err) => {
                warn!("cleanup: failed to delete {}: {err}", path.display());
                false
            }
        }
    }

    /// Remove settings, server list and logs. Game files are left alone.
    /// Returns the files that were actually deleted.
    ///
    /// Log files go last and without log records of their own, since any
    /// record written to the file sink would recreate them.
    pub async fn uninstall(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut removed = Vec::new();
        let mut first_error = None;

        for path in [self.paths.settings_file(), self.paths.servers_file()] {
            match remove_if_present(&path).await {
                Ok(true) => {
                    info!("uninstall: deleted {}", path.display());
                    removed.push(path);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!("uninstall: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }

        for path in [self.paths.log_file(), self.paths.rotated_log_file()] {
            match remove_if_present(&path).await {
                Ok(true) => removed.push(path),
                Ok(false) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(removed),
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StorageError::Io {
            action: "delete",
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, StorageManager) {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(LauncherPaths::new(dir.path()));
        (dir, storage)
    }

    fn record(name: &str, url: &str, hash: Option<&str>) -> ServerRecord {
        ServerRecord {
            name: Some(name.into()),
            manifest_url: Some(url.into()),
            manifest_hash: hash.map(str::to_owned),
        }
    }

    #[test]
    fn sanitizing_trims_and_drops_incomplete_entries() {
        let entries = sanitize_servers(vec![
            record("  Alpha ", " https://a/manifest.xml ", Some(" ABC ")),
            record("", "https://b/manifest.xml", None),
            record("Gamma", "   ", None),
            ServerRecord::default(),
            record("Delta", "https://d/manifest.xml", Some("  ")),
        ]);

        assert_eq!(
            entries,
            vec![
                ServerEntry::new("Alpha", "https://a/manifest.xml", Some("ABC")),
                ServerEntry::new("Delta", "https://d/manifest.xml", None),
            ]
        );
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let (_dir, storage) = storage();
        assert_eq!(storage.read_settings().await, Settings::default());
        assert!(storage.read_servers().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_files_read_as_empty() {
        let (_dir, storage) = storage();
        std::fs::write(storage.paths().settings_file(), "{not json").unwrap();
        std::fs::write(storage.paths().servers_file(), "<ServerList/>").unwrap();
        assert_eq!(storage.read_settings().await, Settings::default());
        assert!(storage.read_servers().await.is_empty());
    }

    #[tokio::test]
    async fn reads_servers_in_file_order() {
        let (_dir, storage) = storage();
        std::fs::write(
            storage.paths().servers_file(),
            r#"{"servers":[
                {"name":"One","manifest_url":"https://1/m.xml","manifest_hash":"aa"},
                {"name":"Two","manifest_url":"https://2/m.xml"}
            ]}"#,
        )
        .unwrap();

        let entries = sanitize_servers(storage.read_servers().await);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "One");
        assert_eq!(entries[0].manifest_hash.as_deref(), Some("aa"));
        assert_eq!(entries[1].name, "Two");
    }

    #[tokio::test]
    async fn settings_round_trip_and_blank_path_is_absent() {
        let (_dir, storage) = storage();
        let settings = Settings {
            install_path: Some(PathBuf::from("/games/waypoint")),
        };
        storage.write_settings(&settings).await.unwrap();
        assert_eq!(storage.read_settings().await, settings);

        std::fs::write(storage.paths().settings_file(), r#"{"install_path":""}"#).unwrap();
        assert_eq!(storage.read_settings().await.install_path, None);
    }

    #[tokio::test]
    async fn uninstall_removes_only_launcher_state() {
        let (dir, storage) = storage();
        let paths = storage.paths().clone();
        std::fs::write(paths.settings_file(), "{}").unwrap();
        std::fs::write(paths.servers_file(), "{}").unwrap();
        std::fs::write(paths.log_file(), "log").unwrap();
        let game_data = dir.path().join("game.dat");
        std::fs::write(&game_data, "keep me").unwrap();

        let removed = storage.uninstall().await.unwrap();
        assert_eq!(removed.len(), 3);
        assert!(!paths.settings_file().exists());
        assert!(!paths.servers_file().exists());
        assert!(!paths.log_file().exists());
        assert!(game_data.exists());

        // Running it again is not an error.
        assert!(storage.uninstall().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_dir_is_created_on_first_write_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("waypoint-launcher");
        let storage = StorageManager::new(LauncherPaths::new(&root));

        assert!(storage.uninstall().await.unwrap().is_empty());
        assert!(!storage.remove_legacy_launcher().await);
        assert_eq!(storage.read_settings().await, Settings::default());
        assert!(!root.exists());

        storage.write_settings(&Settings::default()).await.unwrap();
        assert!(root.join("settings.json").exists());
    }

    #[tokio::test]
    async fn legacy_cleanup_is_best_effort() {
        let (_dir, storage) = storage();
        assert!(!storage.remove_legacy_launcher().await);

        std::fs::write(storage.paths().legacy_launcher(), "old binary").unwrap();
        assert!(storage.remove_legacy_launcher().await);
        assert!(!storage.paths().legacy_launcher().exists());
    }
}
