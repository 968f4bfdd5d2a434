mod common;

use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use common::{body_of, part_files, Script, ScriptedFetcher};
use vodkeep::{
    download::{Cancellation, FetchError, Progress, SegmentDownloader},
    types::SegmentManifest,
    Error,
};

const BASE: &str = "https://cdn.example/vod/chunked/";

fn manifest(segments: &[&str]) -> SegmentManifest {
    SegmentManifest::new(BASE, segments.iter().copied())
}

fn url(segment: &str) -> String {
    format!("{BASE}{segment}")
}

/// Where the segment at `idx` lands in `dir`
fn local(dir: &Path, idx: usize, segment: &str) -> PathBuf {
    dir.join(SegmentManifest::local_name(idx, segment))
}

fn no_progress(_: &Progress) {}

#[test]
fn paths_follow_manifest_order_whatever_the_completion_order() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new()
        .script(
            &url("a.ts"),
            Script {
                delay: Duration::from_millis(300),
                ..Script::default()
            },
        )
        .script(
            &url("b.ts"),
            Script {
                delay: Duration::from_millis(150),
                ..Script::default()
            },
        );
    let manifest = manifest(&["a.ts", "b.ts", "c.ts"]);

    let mut reports = Vec::new();
    let downloaded = SegmentDownloader::new(&fetcher, 3, 0)
        .download(
            &manifest,
            dir.path(),
            &Cancellation::new(),
            &mut |p: &Progress| reports.push(p.clone()),
        )
        .unwrap();

    assert_eq!(fetcher.completed(), [url("c.ts"), url("b.ts"), url("a.ts")]);

    let paths = downloaded.ordered_paths(&manifest).unwrap();
    let bodies: Vec<_> = paths
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();
    assert_eq!(
        bodies,
        [body_of(&url("a.ts")), body_of(&url("b.ts")), body_of(&url("c.ts"))]
    );

    assert_eq!(reports.len(), 3);
    let last = reports.last().unwrap();
    assert_eq!((last.completed, last.total, last.skipped), (3, 3, 0));
}

#[test]
fn a_second_run_fetches_nothing_already_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest(&["0.ts", "1.ts", "2.ts", "3.ts"]);

    let first = ScriptedFetcher::new();
    SegmentDownloader::new(&first, 2, 0)
        .download(&manifest, dir.path(), &Cancellation::new(), &mut no_progress)
        .unwrap();
    assert_eq!(first.total_calls(), 4);

    let second = ScriptedFetcher::new();
    let mut skipped = 0;
    let downloaded = SegmentDownloader::new(&second, 2, 0)
        .download(
            &manifest,
            dir.path(),
            &Cancellation::new(),
            &mut |p: &Progress| skipped = p.skipped,
        )
        .unwrap();

    assert_eq!(second.total_calls(), 0);
    assert_eq!(skipped, 4);
    assert_eq!(downloaded.len(), 4);
}

#[test]
fn resuming_after_a_failure_only_fetches_the_missing_segments() {
    let dir = tempfile::tempdir().unwrap();
    let segments = ["0.ts", "1.ts", "2.ts", "3.ts", "4.ts"];
    let manifest = manifest(&segments);

    let failing = ScriptedFetcher::new().script(
        &url("2.ts"),
        Script {
            status: Some(404),
            ..Script::default()
        },
    );
    let err = SegmentDownloader::new(&failing, 2, 3)
        .download(&manifest, dir.path(), &Cancellation::new(), &mut no_progress)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DownloadFailed {
            attempts: 1,
            source: FetchError::Status(404),
            ..
        }
    ));
    assert!(part_files(dir.path()).is_empty());

    let on_disk: Vec<_> = segments
        .iter()
        .enumerate()
        .filter(|(idx, s)| local(dir.path(), *idx, s).is_file())
        .map(|(_, s)| *s)
        .collect();
    assert!(!on_disk.contains(&"2.ts"));

    let healthy = ScriptedFetcher::new();
    SegmentDownloader::new(&healthy, 2, 3)
        .download(&manifest, dir.path(), &Cancellation::new(), &mut no_progress)
        .unwrap();

    for segment in segments {
        let expected = if on_disk.contains(&segment) { 0 } else { 1 };
        assert_eq!(healthy.calls(&url(segment)), expected, "{segment}");
    }
}

#[test]
fn transport_failures_are_retried_until_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest(&["0.ts"]);
    let fetcher = ScriptedFetcher::new().script(
        &url("0.ts"),
        Script {
            transport_failures: u32::MAX,
            ..Script::default()
        },
    );

    let err = SegmentDownloader::new(&fetcher, 1, 2)
        .download(&manifest, dir.path(), &Cancellation::new(), &mut no_progress)
        .unwrap_err();

    match err {
        Error::DownloadFailed { url: failed, attempts, source } => {
            assert_eq!(failed, url("0.ts"));
            assert_eq!(attempts, 3);
            assert!(matches!(source, FetchError::Transport(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(fetcher.calls(&url("0.ts")), 3);
    assert!(!local(dir.path(), 0, "0.ts").exists());
    assert!(part_files(dir.path()).is_empty());
}

#[test]
fn transient_failures_are_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest(&["0.ts"]);
    let fetcher = ScriptedFetcher::new().script(
        &url("0.ts"),
        Script {
            transport_failures: 2,
            ..Script::default()
        },
    );

    SegmentDownloader::new(&fetcher, 1, 2)
        .download(&manifest, dir.path(), &Cancellation::new(), &mut no_progress)
        .unwrap();

    assert_eq!(fetcher.calls(&url("0.ts")), 3);
    assert_eq!(
        fs::read_to_string(local(dir.path(), 0, "0.ts")).unwrap(),
        body_of(&url("0.ts"))
    );
}

#[test]
fn cancellation_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest(&["0.ts", "1.ts", "2.ts", "3.ts"]);
    let hang = Script {
        hang: true,
        ..Script::default()
    };
    let fetcher = ScriptedFetcher::new()
        .script(&url("1.ts"), hang.clone())
        .script(&url("2.ts"), hang);

    let cancel = Cancellation::new();
    let err = thread::scope(|scope| {
        let canceller = cancel.clone();
        scope.spawn(move || {
            thread::sleep(Duration::from_millis(200));
            canceller.cancel();
        });

        SegmentDownloader::new(&fetcher, 2, 0)
            .download(&manifest, dir.path(), &cancel, &mut no_progress)
            .unwrap_err()
    });

    assert!(matches!(err, Error::DownloadCancelled));
    assert!(part_files(dir.path()).is_empty());
    assert!(!local(dir.path(), 1, "1.ts").exists());
    assert!(!local(dir.path(), 2, "2.ts").exists());
}

#[test]
fn segments_with_look_alike_names_are_kept_apart() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest(&["a/0.ts", "a_0.ts", "0.ts?x=1", "0.ts?x=2"]);
    let fetcher = ScriptedFetcher::new();

    let downloaded = SegmentDownloader::new(&fetcher, 2, 0)
        .download(&manifest, dir.path(), &Cancellation::new(), &mut no_progress)
        .unwrap();

    let bodies: Vec<_> = downloaded
        .ordered_paths(&manifest)
        .unwrap()
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();
    let expected: Vec<_> = manifest
        .segments()
        .iter()
        .map(|s| body_of(&url(s)))
        .collect();

    assert_eq!(bodies, expected);
    assert_eq!(fetcher.total_calls(), 4);
}
