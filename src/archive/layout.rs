use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;
use tracing::debug;

use crate::{
    io::atomic_write,
    result::{Error, Result},
    types::{ContentItem, ContentKind},
};

pub const INDEX_FILE: &str = "index.json";
pub const METADATA_EXT: &str = "json";
pub const MEDIA_EXT: &str = "mp4";
pub const CHAT_EXT: &str = "chat";

/// Metadata file names: `YYYYMMDD-<id>.json`
const METADATA_NAME_PATTERN: &str = r"^[0-9]{8}-(?P<id>[^/\\]+)\.json$";

static METADATA_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn metadata_name_re() -> &'static Regex {
    METADATA_NAME_RE.get_or_init(|| Regex::new(METADATA_NAME_PATTERN).expect("valid pattern"))
}

/// Content id encoded in a metadata file name, `None` if the name does not
/// follow the metadata naming
pub fn id_from_filename(name: &str) -> Option<&str> {
    metadata_name_re()
        .captures(name)
        .and_then(|cap| cap.name("id"))
        .map(|id| id.as_str())
}

/// Where everything lives under the archive root:
///
/// ```text
/// <root>/index.json
/// <root>/<login>/videos/<YYYYMMDD>-<id>.{json,mp4,chat}
/// <root>/<login>/clips/<YYYYMMDD>-<id>.{json,mp4,chat}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn kind_dir(&self, login: &str, kind: ContentKind) -> PathBuf {
        self.root.join(login).join(kind.dir_name())
    }

    /// Path of a file named in the index
    pub fn file_path(&self, login: &str, kind: ContentKind, filename: &str) -> PathBuf {
        self.kind_dir(login, kind).join(filename)
    }

    pub fn metadata_path(&self, item: &ContentItem) -> PathBuf {
        self.artifact_path(item, METADATA_EXT)
    }

    pub fn media_path(&self, item: &ContentItem) -> PathBuf {
        self.artifact_path(item, MEDIA_EXT)
    }

    pub fn chat_path(&self, item: &ContentItem) -> PathBuf {
        self.artifact_path(item, CHAT_EXT)
    }

    fn artifact_path(&self, item: &ContentItem, ext: &str) -> PathBuf {
        self.kind_dir(&item.info().channel_login, item.kind())
            .join(format!("{}.{ext}", item.file_stem()))
    }

    /// Logins of every channel directory, sorted.
    /// Hidden directories (scratch space) are not channels.
    pub fn channels(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut logins = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    logins.push(name.to_owned());
                }
            }
        }
        logins.sort();
        Ok(logins)
    }

    /// Write the metadata record of an item, replacing any previous one
    pub fn write_metadata(&self, item: &ContentItem) -> Result<PathBuf> {
        let path = self.metadata_path(item);
        let mut json = serde_json::to_vec_pretty(item)?;
        json.push(b'\n');

        debug!("Writing metadata '{}'", path.display());
        atomic_write(&path, &json)?;
        Ok(path)
    }

    pub fn read_metadata(&self, path: &Path) -> Result<ContentItem> {
        let data = fs::read(path)?;
        serde_json::from_slice(&data).map_err(|source| Error::MetadataCorrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}
