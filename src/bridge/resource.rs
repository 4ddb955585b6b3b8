use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::audio::{AudioError, MediaSource};

/// A sound as named by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    /// Absolute or working-directory relative path.
    File { path: PathBuf },
    /// `name.ext` inside the configured bundle directory.
    Bundle {
        name: String,
        #[serde(rename = "type")]
        ext: String,
    },
    /// Remote resource fetched over HTTP(S), or a `file://` URL.
    Url { url: String },
}

/// Where a resource has to come from before it can be loaded.
#[derive(Debug)]
pub enum Resolved {
    Local(MediaSource),
    Remote(Url),
}

impl Resource {
    /// Identity reported to the host when loading fails before a player exists.
    pub fn identity(&self) -> String {
        match self {
            Resource::File { path } => path.display().to_string(),
            Resource::Bundle { name, ext } => format!("{}.{}", name, ext),
            Resource::Url { url } => url.clone(),
        }
    }

    pub fn resolve(&self, bundle_dir: &Path) -> Result<Resolved, AudioError> {
        match self {
            Resource::File { path } => Ok(Resolved::Local(MediaSource::File(path.clone()))),
            Resource::Bundle { name, ext } => {
                if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
                    return Err(AudioError::ResourceLoad(format!("invalid bundle resource name '{}'", name)));
                }
                if ext.contains(['/', '\\']) {
                    return Err(AudioError::ResourceLoad(format!("invalid bundle resource type '{}'", ext)));
                }
                let path = bundle_dir.join(format!("{}.{}", name, ext.trim_start_matches('.')));
                if !path.is_file() {
                    return Err(AudioError::ResourceLoad(format!(
                        "bundle resource {}.{} not found in {}",
                        name,
                        ext,
                        bundle_dir.display()
                    )));
                }
                Ok(Resolved::Local(MediaSource::File(path)))
            }
            Resource::Url { url } => {
                let parsed = Url::parse(url)
                    .map_err(|e| AudioError::ResourceLoad(format!("invalid URL '{}': {}", url, e)))?;
                match parsed.scheme() {
                    "http" | "https" => Ok(Resolved::Remote(parsed)),
                    "file" => parsed
                        .to_file_path()
                        .map(|path| Resolved::Local(MediaSource::File(path)))
                        .map_err(|_| AudioError::ResourceLoad(format!("invalid file URL '{}'", url))),
                    other => Err(AudioError::ResourceLoad(format!("unsupported URL scheme '{}'", other))),
                }
            }
        }
    }
}
