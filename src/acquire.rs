use std::{
    fmt::Debug,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    archive::{ArchiveIndex, ArchiveLayout},
    download::{Cancellation, LogProgress, SegmentDownloader, SegmentFetcher},
    io::{publish, sibling_tempfile},
    outside::StreamJoiner,
    remote::{CommentSource, GqlClient, ManifestResolver, TranscriptCapturer},
    result::{bail, Error, Result},
    types::{ContentItem, ContentKind, SegmentManifest},
};

/// Everything the pipeline needs from the platform
pub trait ContentSource: CommentSource + Debug {
    /// Metadata of a video, `None` if it does not exist
    fn video(&self, id: &str) -> Result<Option<ContentItem>>;

    /// Metadata of a clip, `None` if it does not exist
    fn clip(&self, slug: &str) -> Result<Option<ContentItem>>;

    fn video_manifest(&self, id: &str) -> Result<SegmentManifest>;

    fn clip_manifest(&self, slug: &str) -> Result<SegmentManifest>;
}

impl ContentSource for GqlClient {
    fn video(&self, id: &str) -> Result<Option<ContentItem>> {
        GqlClient::video(self, id)
    }

    fn clip(&self, slug: &str) -> Result<Option<ContentItem>> {
        GqlClient::clip(self, slug)
    }

    fn video_manifest(&self, id: &str) -> Result<SegmentManifest> {
        ManifestResolver::new(self).resolve_video(id)
    }

    fn clip_manifest(&self, slug: &str) -> Result<SegmentManifest> {
        ManifestResolver::new(self).resolve_clip(slug)
    }
}

/// Pipeline tuning, usually coming from the settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub scratch_dir: PathBuf,
    pub workers: usize,
    pub retries: u32,
    pub ffmpeg_loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { item: ContentItem, path: PathBuf },
    /// Nothing was done, the index already knows the item
    AlreadyArchived { login: String, filename: String },
}

/// Turns content ids into archived files: resolve, download, join, record
#[derive(Debug)]
pub struct Archiver<'a> {
    source: &'a dyn ContentSource,
    fetcher: &'a dyn SegmentFetcher,
    joiner: &'a dyn StreamJoiner,
    index: ArchiveIndex,
    options: ArchiveOptions,
    cancel: Cancellation,
}

impl<'a> Archiver<'a> {
    pub fn new(
        source: &'a dyn ContentSource,
        fetcher: &'a dyn SegmentFetcher,
        joiner: &'a dyn StreamJoiner,
        layout: ArchiveLayout,
        options: ArchiveOptions,
    ) -> Self {
        Self {
            source,
            fetcher,
            joiner,
            index: ArchiveIndex::open(layout),
            options,
            cancel: Cancellation::new(),
        }
    }

    /// Use the given token, so that the caller can cancel running work
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn index(&mut self) -> &mut ArchiveIndex {
        &mut self.index
    }

    pub fn archive_video(&mut self, id: &str) -> Result<ArchiveOutcome> {
        if let Some(entry) = self.index.load(false)?.find_video(id) {
            info!("Video {id} already archived as '{}/{}'", entry.login, entry.filename);
            return Ok(ArchiveOutcome::AlreadyArchived {
                login: entry.login.to_owned(),
                filename: entry.filename.to_owned(),
            });
        }

        let item = self.source.video(id)?.ok_or_else(|| Error::Authorization {
            id: id.to_owned(),
            reason: "no such video".to_owned(),
        })?;
        info!("Archiving video {id}: '{}'", item.info().title);

        let manifest = self.source.video_manifest(id)?;
        self.acquire(item, &manifest)
    }

    pub fn archive_clip(&mut self, slug: &str) -> Result<ArchiveOutcome> {
        if let Some(entry) = self.index.load(false)?.find_clip(slug) {
            info!("Clip {slug} already archived as '{}/{}'", entry.login, entry.filename);
            return Ok(ArchiveOutcome::AlreadyArchived {
                login: entry.login.to_owned(),
                filename: entry.filename.to_owned(),
            });
        }

        let item = self.source.clip(slug)?.ok_or_else(|| Error::Authorization {
            id: slug.to_owned(),
            reason: "no such clip".to_owned(),
        })?;
        info!("Archiving clip {slug}: '{}'", item.info().title);

        let manifest = self.source.clip_manifest(slug)?;
        self.acquire(item, &manifest)
    }

    /// Capture the chat of an archived video next to its metadata
    pub fn archive_chat(&mut self, id: &str) -> Result<ArchiveOutcome> {
        let layout = self.index.layout().clone();
        let Some(entry) = self.index.load(false)?.find_video(id) else {
            return bail(format!("Video {id} must be archived before its chat"));
        };
        let login = entry.login.to_owned();
        let filename = entry.filename.to_owned();

        let metadata_path = layout.file_path(&login, ContentKind::Video, &filename);
        let mut item = layout.read_metadata(&metadata_path)?;
        let chat_path = layout.chat_path(&item);

        if item.info().has_transcript && chat_path.is_file() {
            info!("Chat of video {id} already archived");
            return Ok(ArchiveOutcome::AlreadyArchived { login, filename });
        }

        let chat = TranscriptCapturer::new(self.source).capture(id, &self.cancel)?;
        chat.write_to(&chat_path)?;

        item.info_mut().has_transcript = true;
        layout.write_metadata(&item)?;

        Ok(ArchiveOutcome::Archived {
            item,
            path: chat_path,
        })
    }

    fn acquire(&mut self, item: ContentItem, manifest: &SegmentManifest) -> Result<ArchiveOutcome> {
        let layout = self.index.layout().clone();
        let scratch = self.options.scratch_dir.join(item.id());
        let media = layout.media_path(&item);

        let downloader =
            SegmentDownloader::new(self.fetcher, self.options.workers, self.options.retries);
        let mut reporter = LogProgress::new();
        let downloaded = downloader.download(manifest, &scratch, &self.cancel, &mut reporter)?;
        let segments = downloaded.ordered_paths(manifest)?;

        match (item.kind(), segments.as_slice()) {
            // Clips come as one ready-to-play file
            (ContentKind::Clip, [single]) => move_into_place(single, &media)?,
            _ => self
                .joiner
                .join(&segments, &media, &self.options.ffmpeg_loglevel)?,
        }

        debug!("Removing scratch directory '{}'", scratch.display());
        if let Err(err) = fs::remove_dir_all(&scratch) {
            warn!("Could not remove scratch directory '{}': {err}", scratch.display());
        }

        layout.write_metadata(&item)?;
        self.index.refresh()?;
        self.index.save()?;

        info!("Archived '{}'", media.display());
        Ok(ArchiveOutcome::Archived { item, path: media })
    }
}

/// Rename `src` to `dest`, copying through a temporary sibling when they
/// are on different file systems
fn move_into_place(src: &Path, dest: &Path) -> Result<()> {
    if let Some(dir) = dest.parent() {
        fs::create_dir_all(dir)?;
    }
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    let mut tmp = sibling_tempfile(dest)?;
    io::copy(&mut File::open(src)?, &mut tmp)?;
    publish(tmp, dest)
}
