mod common;

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
};

use common::{body_of, part_files, ScriptedFetcher};
use time::macros::datetime;
use vodkeep::{
    acquire::{ArchiveOptions, ArchiveOutcome, Archiver, ContentSource},
    archive::{ArchiveIndex, ArchiveLayout},
    io::atomic_write,
    outside::StreamJoiner,
    remote::{CommentPage, CommentSource},
    result::{bail, Result},
    types::{ChatEvent, ContentInfo, ContentItem, SegmentManifest, Speaker, Transcript},
    Error,
};

const BASE: &str = "https://cdn.example/";

fn info(id: &str) -> ContentInfo {
    ContentInfo {
        id: id.to_owned(),
        channel_id: "1".to_owned(),
        channel_login: "alice".to_owned(),
        channel_display_name: "Alice".to_owned(),
        title: format!("stream {id}"),
        created_at: datetime!(2023-04-05 20:00 UTC),
        duration_secs: 3600,
        has_transcript: false,
    }
}

fn video(id: &str) -> ContentItem {
    ContentItem::Video {
        info: info(id),
        chapters: Vec::new(),
    }
}

fn clip(id: &str, slug: &str) -> ContentItem {
    ContentItem::Clip {
        info: info(id),
        slug: slug.to_owned(),
        video_id: Some("100".to_owned()),
        video_offset_secs: Some(42),
    }
}

fn event(name: &str, offset_secs: u64, text: &str) -> ChatEvent {
    ChatEvent {
        speaker: Speaker::new(Some(name), None),
        offset_secs,
        state: 0,
        text: text.to_owned(),
    }
}

#[derive(Debug, Default)]
struct FakeSource {
    videos: HashMap<String, (ContentItem, SegmentManifest)>,
    clips: HashMap<String, (ContentItem, SegmentManifest)>,
    chat: Vec<ChatEvent>,
    lookups: AtomicU32,
}

impl FakeSource {
    fn with_video(mut self, id: &str, segments: &[&str]) -> Self {
        let manifest = SegmentManifest::new(format!("{BASE}{id}/"), segments.iter().copied());
        self.videos.insert(id.to_owned(), (video(id), manifest));
        self
    }

    fn with_clip(mut self, id: &str, slug: &str) -> Self {
        let manifest = SegmentManifest::new(BASE, [format!("{slug}.mp4")]);
        self.clips.insert(slug.to_owned(), (clip(id, slug), manifest));
        self
    }

    fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl CommentSource for FakeSource {
    fn comments(&self, _video_id: &str, cursor: Option<&str>) -> Result<CommentPage> {
        // Two pages, split in the middle
        let half = self.chat.len() / 2;
        Ok(match cursor {
            None => CommentPage {
                events: self.chat[..half].to_vec(),
                next_cursor: Some("page-2".to_owned()),
            },
            Some(_) => CommentPage {
                events: self.chat[half..].to_vec(),
                next_cursor: None,
            },
        })
    }
}

impl ContentSource for FakeSource {
    fn video(&self, id: &str) -> Result<Option<ContentItem>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.videos.get(id).map(|(item, _)| item.clone()))
    }

    fn clip(&self, slug: &str) -> Result<Option<ContentItem>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.clips.get(slug).map(|(item, _)| item.clone()))
    }

    fn video_manifest(&self, id: &str) -> Result<SegmentManifest> {
        match self.videos.get(id) {
            Some((_, manifest)) => Ok(manifest.clone()),
            None => bail(format!("no video {id}")),
        }
    }

    fn clip_manifest(&self, slug: &str) -> Result<SegmentManifest> {
        match self.clips.get(slug) {
            Some((_, manifest)) => Ok(manifest.clone()),
            None => bail(format!("no clip {slug}")),
        }
    }
}

/// Concatenates the segments, or fails like a crashing transcoder
#[derive(Debug, Default)]
struct FakeJoiner {
    fail: bool,
}

impl StreamJoiner for FakeJoiner {
    fn join(&self, segments: &[PathBuf], output: &Path, _loglevel: &str) -> Result<()> {
        if self.fail {
            return Err(Error::JoiningFailed {
                output: output.to_path_buf(),
                status: "exit status: 1".to_owned(),
            });
        }

        let mut joined = Vec::new();
        for segment in segments {
            joined.extend(fs::read(segment)?);
        }
        atomic_write(output, &joined)
    }
}

struct Setup {
    dir: tempfile::TempDir,
}

impl Setup {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("archive")
    }

    fn scratch(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    fn layout(&self) -> ArchiveLayout {
        ArchiveLayout::new(self.root())
    }

    fn archiver<'a>(
        &self,
        source: &'a FakeSource,
        fetcher: &'a ScriptedFetcher,
        joiner: &'a FakeJoiner,
    ) -> Archiver<'a> {
        let options = ArchiveOptions {
            scratch_dir: self.scratch(),
            workers: 2,
            retries: 0,
            ffmpeg_loglevel: "error".to_owned(),
        };
        Archiver::new(source, fetcher, joiner, self.layout(), options)
    }
}

#[test]
fn archived_video_is_joined_recorded_and_indexed() {
    let setup = Setup::new();
    let source = FakeSource::default().with_video("100", &["0.ts", "1.ts", "2.ts"]);
    let fetcher = ScriptedFetcher::new();
    let joiner = FakeJoiner::default();

    let outcome = setup
        .archiver(&source, &fetcher, &joiner)
        .archive_video("100")
        .unwrap();

    let media = setup.root().join("alice/videos/20230405-100.mp4");
    assert!(matches!(&outcome, ArchiveOutcome::Archived { path, .. } if *path == media));

    let expected: String = ["0.ts", "1.ts", "2.ts"]
        .iter()
        .map(|s| body_of(&format!("{BASE}100/{s}")))
        .collect();
    assert_eq!(fs::read_to_string(&media).unwrap(), expected);

    let metadata = setup.root().join("alice/videos/20230405-100.json");
    assert_eq!(setup.layout().read_metadata(&metadata).unwrap(), video("100"));

    assert!(!setup.scratch().join("100").exists());
    assert!(part_files(setup.dir.path()).is_empty());

    let mut index = ArchiveIndex::open(setup.layout());
    assert_eq!(
        index.load(false).unwrap().video("alice", "100"),
        Some("20230405-100.json")
    );
}

#[test]
fn already_archived_video_needs_no_network() {
    let setup = Setup::new();
    let source = FakeSource::default().with_video("100", &["0.ts"]);
    let fetcher = ScriptedFetcher::new();
    let joiner = FakeJoiner::default();

    let mut archiver = setup.archiver(&source, &fetcher, &joiner);
    archiver.archive_video("100").unwrap();
    let lookups = source.lookups();
    let calls = fetcher.total_calls();

    let outcome = archiver.archive_video("100").unwrap();
    assert_eq!(
        outcome,
        ArchiveOutcome::AlreadyArchived {
            login: "alice".to_owned(),
            filename: "20230405-100.json".to_owned(),
        }
    );
    assert_eq!(source.lookups(), lookups);
    assert_eq!(fetcher.total_calls(), calls);
}

#[test]
fn failed_join_publishes_nothing() {
    let setup = Setup::new();
    let source = FakeSource::default().with_video("100", &["0.ts", "1.ts"]);
    let fetcher = ScriptedFetcher::new();
    let joiner = FakeJoiner { fail: true };

    let err = setup
        .archiver(&source, &fetcher, &joiner)
        .archive_video("100")
        .unwrap_err();
    assert!(matches!(err, Error::JoiningFailed { .. }));

    let videos = setup.root().join("alice/videos");
    assert!(!videos.join("20230405-100.mp4").exists());
    assert!(!videos.join("20230405-100.json").exists());

    // Segments are kept for the next attempt
    let kept = setup
        .scratch()
        .join("100")
        .join(SegmentManifest::local_name(0, "0.ts"));
    assert!(kept.is_file());

    let mut index = ArchiveIndex::open(setup.layout());
    assert_eq!(index.load(true).unwrap().find_video("100"), None);
}

#[test]
fn single_file_clip_is_copied_and_found_by_slug() {
    let setup = Setup::new();
    let source = FakeSource::default().with_clip("77", "FunnySlug");
    let fetcher = ScriptedFetcher::new();
    // Clips never reach the transcoder
    let joiner = FakeJoiner { fail: true };

    let mut archiver = setup.archiver(&source, &fetcher, &joiner);
    archiver.archive_clip("FunnySlug").unwrap();

    let media = setup.root().join("alice/clips/20230405-77.mp4");
    assert_eq!(
        fs::read_to_string(media).unwrap(),
        body_of(&format!("{BASE}FunnySlug.mp4"))
    );

    assert!(matches!(
        archiver.archive_clip("FunnySlug").unwrap(),
        ArchiveOutcome::AlreadyArchived { .. }
    ));

    let snapshot = archiver.index().load(false).unwrap();
    assert_eq!(
        snapshot.clip_by_slug("alice", "FunnySlug"),
        Some("20230405-77.json")
    );
}

#[test]
fn chat_is_captured_next_to_the_video() {
    let setup = Setup::new();
    let mut source = FakeSource::default().with_video("100", &["0.ts"]);
    source.chat = vec![
        event("bob", 1, "hi"),
        event("carol", 2, "hello;\nworld"),
        event("bob", 3, "again"),
        event("bob", 5, ""),
    ];
    let fetcher = ScriptedFetcher::new();
    let joiner = FakeJoiner::default();

    let mut archiver = setup.archiver(&source, &fetcher, &joiner);
    assert!(archiver.archive_chat("100").is_err());

    archiver.archive_video("100").unwrap();
    let outcome = archiver.archive_chat("100").unwrap();

    let chat_path = setup.root().join("alice/videos/20230405-100.chat");
    assert!(matches!(&outcome, ArchiveOutcome::Archived { path, .. } if *path == chat_path));

    let chat = Transcript::read_from(&chat_path).unwrap();
    assert_eq!(chat.events(), source.chat.as_slice());
    assert_eq!(chat.speakers().len(), 2);

    let metadata = setup
        .layout()
        .read_metadata(&setup.root().join("alice/videos/20230405-100.json"))
        .unwrap();
    assert!(metadata.info().has_transcript);

    assert!(matches!(
        archiver.archive_chat("100").unwrap(),
        ArchiveOutcome::AlreadyArchived { .. }
    ));
}

#[test]
fn rebuilding_the_index_is_stable() {
    let setup = Setup::new();
    let source = FakeSource::default()
        .with_video("100", &["0.ts"])
        .with_video("101", &["0.ts"])
        .with_clip("77", "FunnySlug");
    let fetcher = ScriptedFetcher::new();
    let joiner = FakeJoiner::default();

    let mut archiver = setup.archiver(&source, &fetcher, &joiner);
    archiver.archive_video("101").unwrap();
    archiver.archive_clip("FunnySlug").unwrap();
    archiver.archive_video("100").unwrap();

    let saved = fs::read(setup.root().join("index.json")).unwrap();

    let mut index = ArchiveIndex::open(setup.layout());
    let first = index.refresh().unwrap().to_json().unwrap();
    let second = index.refresh().unwrap().to_json().unwrap();
    assert_eq!(first, second);
    assert_eq!(first, saved);
}

#[test]
fn index_never_invents_ids() {
    let setup = Setup::new();
    let videos = setup.root().join("alice/videos");
    fs::create_dir_all(&videos).unwrap();
    fs::write(videos.join("20230405-100.mp4"), "media without metadata").unwrap();
    fs::write(videos.join("20230405-100.chat"), "\n").unwrap();
    fs::write(videos.join("notes.json"), "{}").unwrap();
    fs::write(videos.join(".20230405-101.part.json"), "{").unwrap();

    let mut index = ArchiveIndex::open(setup.layout());
    let snapshot = index.load(true).unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.find_video("100"), None);
    assert_eq!(snapshot.find_video("101"), None);
}
