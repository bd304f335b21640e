//! Server manifest parsing.
//!
//! A manifest is an XML document published by each server. It names the
//! launch profiles, the files a client needs and some branding links. The
//! parser either returns a complete [`Manifest`] or a [`ParseFailure`]; it
//! never hands out a half-filled value.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use thiserror::Error;

use crate::engine::models::{
    Branding, BrowseButton, ForumLink, LaunchProfile, Manifest, ManifestFile,
};
use crate::util::non_empty_trimmed;

const ROOT_ELEMENT: &[u8] = b"manifest";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("manifest is not valid UTF-8")]
    Encoding,
    #[error("manifest is empty")]
    Empty,
    #[error("unexpected root element <{0}>, expected <manifest>")]
    UnexpectedRoot(String),
    #[error("malformed manifest: {0}")]
    Malformed(String),
    #[error("manifest is missing {0}")]
    MissingElement(&'static str),
}

#[derive(Debug, Deserialize)]
struct XmlManifest {
    label: String,
    profiles: XmlProfiles,
    filelist: XmlFileList,
    #[serde(default)]
    forums: Option<XmlForums>,
    #[serde(default)]
    webpage: Option<String>,
    #[serde(default)]
    poster_image: Option<XmlPosterImage>,
    #[serde(default)]
    buttonlist: Option<XmlButtonList>,
}

#[derive(Debug, Deserialize)]
struct XmlProfiles {
    #[serde(rename = "launch", default)]
    launches: Vec<XmlLaunch>,
}

#[derive(Debug, Deserialize)]
struct XmlLaunch {
    #[serde(rename = "@exec", default)]
    exec: String,
    #[serde(rename = "@params", default)]
    params: String,
    #[serde(rename = "@order", default)]
    order: i32,
    #[serde(rename = "@icon", default)]
    icon: Option<String>,
    #[serde(rename = "@motd", default)]
    motd: Option<String>,
    #[serde(rename = "@website", default)]
    website: Option<String>,
    #[serde(rename = "$text", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct XmlFileList {
    #[serde(rename = "file", default)]
    files: Vec<XmlFile>,
}

#[derive(Debug, Deserialize)]
struct XmlFile {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@size")]
    size: u64,
    #[serde(rename = "@md5", default)]
    md5: Option<String>,
    #[serde(rename = "url", default)]
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct XmlForums {
    #[serde(rename = "forum", default)]
    forums: Vec<XmlForum>,
}

#[derive(Debug, Deserialize)]
struct XmlForum {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@url", default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct XmlPosterImage {
    #[serde(rename = "@url", default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlButtonList {
    #[serde(rename = "button", default)]
    buttons: Vec<XmlButton>,
}

#[derive(Debug, Deserialize)]
struct XmlButton {
    #[serde(rename = "@url", default)]
    url: String,
    #[serde(rename = "$text", default)]
    label: String,
}

/// Parse raw manifest bytes.
pub fn parse(bytes: &[u8]) -> Result<Manifest, ParseFailure> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseFailure::Encoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }

    check_root(text)?;
    let raw: XmlManifest =
        quick_xml::de::from_str(text).map_err(|e| ParseFailure::Malformed(e.to_string()))?;
    build_manifest(raw)
}

/// The deserializer accepts any root tag, so look at it explicitly.
fn check_root(text: &str) -> Result<(), ParseFailure> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                if name.as_ref() == ROOT_ELEMENT {
                    return Ok(());
                }
                return Err(ParseFailure::UnexpectedRoot(
                    String::from_utf8_lossy(name.as_ref()).into_owned(),
                ));
            }
            Ok(Event::Eof) => return Err(ParseFailure::Empty),
            Ok(_) => continue,
            Err(err) => return Err(ParseFailure::Malformed(err.to_string())),
        }
    }
}

fn build_manifest(raw: XmlManifest) -> Result<Manifest, ParseFailure> {
    let label = non_empty_trimmed(Some(&raw.label)).ok_or(ParseFailure::MissingElement("label"))?;

    if raw.profiles.launches.is_empty() {
        return Err(ParseFailure::MissingElement("a launch profile"));
    }
    let mut profiles = raw
        .profiles
        .launches
        .into_iter()
        .map(build_profile)
        .collect::<Result<Vec<_>, _>>()?;
    profiles.sort_by_key(|profile| profile.order);

    let files = raw
        .filelist
        .files
        .into_iter()
        .map(build_file)
        .collect::<Result<Vec<_>, _>>()?;

    let forums = raw
        .forums
        .map(|forums| forums.forums)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|forum| {
            let url = non_empty_trimmed(Some(&forum.url))?;
            let name = non_empty_trimmed(Some(&forum.name)).unwrap_or_else(|| url.clone());
            Some(ForumLink { name, url })
        })
        .collect();

    let buttons = raw
        .buttonlist
        .map(|list| list.buttons)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|button| {
            let url = non_empty_trimmed(Some(&button.url))?;
            let label = non_empty_trimmed(Some(&button.label)).unwrap_or_else(|| url.clone());
            Some(BrowseButton { label, url })
        })
        .collect();

    Ok(Manifest {
        label,
        profiles,
        files,
        branding: Branding {
            forums,
            webpage: non_empty_trimmed(raw.webpage.as_deref()),
            poster_image: non_empty_trimmed(raw.poster_image.and_then(|p| p.url).as_deref()),
            buttons,
        },
    })
}

fn build_profile(launch: XmlLaunch) -> Result<LaunchProfile, ParseFailure> {
    let exec =
        non_empty_trimmed(Some(&launch.exec)).ok_or(ParseFailure::MissingElement("launch exec"))?;
    Ok(LaunchProfile {
        name: launch.name.trim().to_owned(),
        exec,
        params: launch.params.trim().to_owned(),
        order: launch.order,
        icon: non_empty_trimmed(launch.icon.as_deref()),
        motd: non_empty_trimmed(launch.motd.as_deref()),
        website: non_empty_trimmed(launch.website.as_deref()),
    })
}

fn build_file(file: XmlFile) -> Result<ManifestFile, ParseFailure> {
    let name = non_empty_trimmed(Some(&file.name)).ok_or(ParseFailure::MissingElement("file name"))?;
    let download_urls: Vec<String> = file
        .urls
        .iter()
        .filter_map(|url| non_empty_trimmed(Some(url)))
        .collect();
    if download_urls.is_empty() {
        return Err(ParseFailure::MissingElement("file url"));
    }
    Ok(ManifestFile {
        name,
        size_bytes: file.size,
        checksum: non_empty_trimmed(file.md5.as_deref()),
        download_urls,
    })
}
