use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A candidate server as configured locally. Trial order is list order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerEntry {
    pub name: String,
    pub manifest_url: String,
    pub manifest_hash: Option<String>,
}

impl ServerEntry {
    pub fn new(
        name: impl Into<String>,
        manifest_url: impl Into<String>,
        manifest_hash: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            manifest_url: manifest_url.into(),
            manifest_hash: manifest_hash.map(str::to_owned),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchProfile {
    pub name: String,
    pub exec: String,
    pub params: String,
    pub order: i32,
    pub icon: Option<String>,
    pub motd: Option<String>,
    pub website: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestFile {
    pub name: String,
    pub size_bytes: u64,
    pub checksum: Option<String>,
    pub download_urls: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForumLink {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseButton {
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Branding {
    pub forums: Vec<ForumLink>,
    pub webpage: Option<String>,
    pub poster_image: Option<String>,
    pub buttons: Vec<BrowseButton>,
}

/// What a server currently offers. Produced once by the parser and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub label: String,
    /// Sorted by `order`; never empty.
    pub profiles: Vec<LaunchProfile>,
    pub files: Vec<ManifestFile>,
    pub branding: Branding,
}

impl Manifest {
    /// The profile a plain "Play" should use.
    pub fn primary_profile(&self) -> Option<&LaunchProfile> {
        self.profiles.first()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size_bytes).sum()
    }
}

/// The single server that passed fetch, integrity and parse checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedSelection {
    pub server: ServerEntry,
    pub manifest: Manifest,
    /// Digest of the manifest bytes that were accepted.
    pub manifest_hash: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub install_path: Option<PathBuf>,
}

/// Everything handed to the presentation layer once startup succeeds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchContext {
    pub selection: ValidatedSelection,
    pub install_path: PathBuf,
}
