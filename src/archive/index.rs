use std::{collections::BTreeMap, fs, io::ErrorKind};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    io::{atomic_write, sorted_files},
    result::Result,
    types::{ContentItem, ContentKind},
};

use super::layout::{id_from_filename, ArchiveLayout};

/// What is archived for one channel, keyed by id, valued by metadata file name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelIndex {
    #[serde(default)]
    pub vods: BTreeMap<String, String>,
    #[serde(default)]
    pub clips: BTreeMap<String, String>,
    /// Clip slug to metadata file name
    #[serde(default)]
    pub slugs: BTreeMap<String, String>,
}

impl ChannelIndex {
    fn is_empty(&self) -> bool {
        self.vods.is_empty() && self.clips.is_empty()
    }
}

/// Where an item was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry<'a> {
    pub login: &'a str,
    pub id: &'a str,
    pub filename: &'a str,
}

/// In-memory picture of the archive, serialized as the snapshot file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexSnapshot {
    channels: BTreeMap<String, ChannelIndex>,
}

impl IndexSnapshot {
    pub fn channels(&self) -> &BTreeMap<String, ChannelIndex> {
        &self.channels
    }

    pub fn channel(&self, login: &str) -> Option<&ChannelIndex> {
        self.channels.get(login)
    }

    pub fn video(&self, login: &str, id: &str) -> Option<&str> {
        self.channel(login)?.vods.get(id).map(String::as_str)
    }

    pub fn clip(&self, login: &str, id: &str) -> Option<&str> {
        self.channel(login)?.clips.get(id).map(String::as_str)
    }

    pub fn clip_by_slug(&self, login: &str, slug: &str) -> Option<&str> {
        self.channel(login)?.slugs.get(slug).map(String::as_str)
    }

    /// Look a video up across every channel
    pub fn find_video(&self, id: &str) -> Option<IndexEntry<'_>> {
        self.channels.iter().find_map(|(login, channel)| {
            channel
                .vods
                .get_key_value(id)
                .map(|(id, filename)| IndexEntry { login, id, filename })
        })
    }

    /// Look a clip up across every channel, by slug or by id
    pub fn find_clip(&self, slug_or_id: &str) -> Option<IndexEntry<'_>> {
        self.channels.iter().find_map(|(login, channel)| {
            let by_slug = channel.slugs.get(slug_or_id).and_then(|filename| {
                let id = id_from_filename(filename)?;
                Some(IndexEntry { login, id, filename })
            });

            by_slug.or_else(|| {
                channel
                    .clips
                    .get_key_value(slug_or_id)
                    .map(|(id, filename)| IndexEntry { login, id, filename })
            })
        })
    }

    /// Whether the item is known, by id or, for clips, by slug
    pub fn contains(&self, kind: ContentKind, key: &str) -> bool {
        match kind {
            ContentKind::Video => self.find_video(key).is_some(),
            ContentKind::Clip => self.find_clip(key).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        self.channels
            .values()
            .map(|c| c.vods.len() + c.clips.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialized form: pretty JSON with keys in sorted order
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut json = serde_json::to_vec_pretty(self)?;
        json.push(b'\n');
        Ok(json)
    }
}

/// Cached view of what is already archived under a root.
///
/// Built by walking the metadata files of every channel, and persisted as
/// `<root>/index.json` so later runs can skip the walk.
#[derive(Debug)]
pub struct ArchiveIndex {
    layout: ArchiveLayout,
    snapshot: Option<IndexSnapshot>,
}

impl ArchiveIndex {
    pub fn open(layout: ArchiveLayout) -> Self {
        Self {
            layout,
            snapshot: None,
        }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// The current index, rebuilt from disk if forced or if no snapshot
    /// exists yet. A rebuilt index is saved.
    pub fn load(&mut self, force_refresh: bool) -> Result<&IndexSnapshot> {
        if force_refresh {
            self.refresh()?;
            self.save()?;
        } else if self.snapshot.is_none() {
            match self.read_snapshot()? {
                Some(snapshot) => self.snapshot = Some(snapshot),
                None => {
                    self.refresh()?;
                    self.save()?;
                }
            }
        }

        Ok(self.snapshot.get_or_insert_with(IndexSnapshot::default))
    }

    fn read_snapshot(&self) -> Result<Option<IndexSnapshot>> {
        let path = self.layout.index_path();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&data) {
            Ok(snapshot) => {
                debug!("Loaded index snapshot '{}'", path.display());
                Ok(Some(snapshot))
            }
            Err(err) => {
                warn!("Ignoring unreadable index snapshot '{}': {err}", path.display());
                Ok(None)
            }
        }
    }

    /// Rebuild the index by walking the archive root
    pub fn refresh(&mut self) -> Result<&IndexSnapshot> {
        info!("Indexing archive '{}'", self.layout.root().display());

        let mut channels = BTreeMap::new();
        for login in self.layout.channels()? {
            let channel = self.index_channel(&login)?;
            if !channel.is_empty() {
                channels.insert(login, channel);
            }
        }

        let snapshot = IndexSnapshot { channels };
        info!("Indexed {} archived items", snapshot.len());
        Ok(self.snapshot.insert(snapshot))
    }

    fn index_channel(&self, login: &str) -> Result<ChannelIndex> {
        let mut channel = ChannelIndex::default();

        for path in sorted_files(&self.layout.kind_dir(login, ContentKind::Video))? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(id) = id_from_filename(name) {
                channel.vods.insert(id.to_owned(), name.to_owned());
            }
        }

        for path in sorted_files(&self.layout.kind_dir(login, ContentKind::Clip))? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(id) = id_from_filename(name) else {
                continue;
            };

            // The slug is only known from the record itself
            if let ContentItem::Clip { slug, .. } = self.layout.read_metadata(&path)? {
                channel.slugs.insert(slug, name.to_owned());
            }
            channel.clips.insert(id.to_owned(), name.to_owned());
        }

        Ok(channel)
    }

    /// Write the snapshot atomically
    pub fn save(&self) -> Result<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        let path = self.layout.index_path();
        debug!("Saving index snapshot '{}'", path.display());
        atomic_write(&path, &snapshot.to_json()?)?;
        Ok(())
    }
}
