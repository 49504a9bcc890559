//! Media source resolution for the playback controller.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A bundled asset identified by file stem and extension, e.g. `clip` + `mp4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalResource {
    pub name: String,
    pub ext: String,
}

impl LocalResource {
    pub fn new(name: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ext: ext.into(),
        }
    }
}

impl FromStr for LocalResource {
    type Err = Error;

    /// Parse `name.ext`. The split happens at the last dot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((name, ext)) if !name.is_empty() && !ext.is_empty() => Ok(Self::new(name, ext)),
            _ => Err(Error::Resource(s.to_string())),
        }
    }
}

impl fmt::Display for LocalResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.ext)
    }
}

/// Where a media engine should read content from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// HTTP/HTTPS stream
    Remote(String),
    /// Local file on disk
    File(PathBuf),
}

impl Locator {
    /// Parse a URL string into the appropriate locator.
    ///
    /// HTTP/HTTPS URLs become `Remote`, `file://` URLs and everything else are
    /// treated as local paths.
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("http://") || url.starts_with("https://") {
            Locator::Remote(url.to_string())
        } else if let Some(path) = url.strip_prefix("file://") {
            Locator::File(path.into())
        } else {
            Locator::File(url.into())
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Remote(url) => f.write_str(url),
            Locator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The content a playback session is bound to.
///
/// Resolved once when a controller is built and never re-resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaSource {
    /// An explicit URL, passed through verbatim.
    Remote { url: String },
    /// A bundled asset that was found by the asset lookup.
    Local {
        resource: LocalResource,
        path: PathBuf,
    },
    /// Nothing playable. The engine gets no content and playback is a no-op.
    Empty,
}

impl MediaSource {
    pub fn locator(&self) -> Option<Locator> {
        match self {
            MediaSource::Remote { url } => Some(Locator::from_url(url)),
            MediaSource::Local { path, .. } => Some(Locator::File(path.clone())),
            MediaSource::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MediaSource::Empty)
    }
}

/// Finds bundled assets on behalf of the resolver.
pub trait AssetLookup {
    /// Return the file backing `name.ext`, or `None` if no such asset exists.
    fn locate(&self, name: &str, ext: &str) -> Option<PathBuf>;
}

impl<F> AssetLookup for F
where
    F: Fn(&str, &str) -> Option<PathBuf>,
{
    fn locate(&self, name: &str, ext: &str) -> Option<PathBuf> {
        self(name, ext)
    }
}

/// Assets stored as plain files in one directory.
#[derive(Debug, Clone)]
pub struct BundleDir {
    root: PathBuf,
}

impl BundleDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data dir>/loopplay/assets`, falling back to `./assets` when the
    /// platform has no data directory.
    pub fn default_location() -> Self {
        let root = dirs::data_dir()
            .map(|dir| dir.join("loopplay").join("assets"))
            .unwrap_or_else(|| PathBuf::from("assets"));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetLookup for BundleDir {
    fn locate(&self, name: &str, ext: &str) -> Option<PathBuf> {
        let path = self.root.join(format!("{name}.{ext}"));
        path.is_file().then_some(path)
    }
}

/// Pick the source for a session: explicit URL, then bundled asset, then nothing.
pub fn resolve(
    explicit_url: Option<&str>,
    local: Option<&LocalResource>,
    assets: &impl AssetLookup,
) -> MediaSource {
    if let Some(url) = explicit_url.filter(|url| !url.is_empty()) {
        return MediaSource::Remote {
            url: url.to_string(),
        };
    }

    if let Some(resource) = local {
        if let Some(path) = assets.locate(&resource.name, &resource.ext) {
            return MediaSource::Local {
                resource: resource.clone(),
                path,
            };
        }
        log::debug!("Asset {} not found, using empty source", resource);
    }

    MediaSource::Empty
}
