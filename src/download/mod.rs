mod cancel;
mod fetch;
mod progress;
mod worker;

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    thread,
};

use crossbeam_channel::unbounded;
use tracing::{debug, error, info};

pub use cancel::Cancellation;
pub use fetch::{FetchError, HttpFetcher, SegmentFetcher};
pub use progress::{LogProgress, Progress, ProgressReporter};
pub use worker::{DownloadTask, FetchWorker, TaskOutcome};

use crate::{
    actors::Actor,
    result::{err_msg, Error, Result},
    types::SegmentManifest,
};
use progress::ProgressTracker;

/// Local copies of the segments of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Downloaded {
    paths: HashMap<String, PathBuf>,
}

impl Downloaded {
    /// The local paths in manifest order, whatever order they completed in
    pub fn ordered_paths(&self, manifest: &SegmentManifest) -> Result<Vec<PathBuf>> {
        manifest
            .segments()
            .iter()
            .map(|segment| {
                self.paths
                    .get(segment)
                    .cloned()
                    .ok_or_else(|| err_msg(format!("Segment '{segment}' was not downloaded")))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Download the segments of a manifest with a fixed pool of worker threads
#[derive(Debug)]
pub struct SegmentDownloader<'a> {
    fetcher: &'a dyn SegmentFetcher,
    workers: usize,
    retries: u32,
}

impl<'a> SegmentDownloader<'a> {
    /// `retries` is the number of extra attempts after a transport failure
    pub fn new(fetcher: &'a dyn SegmentFetcher, workers: usize, retries: u32) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
            retries,
        }
    }

    /// The tasks needed to bring every segment of the manifest into `dest_dir`
    pub fn tasks(manifest: &SegmentManifest, dest_dir: &Path) -> Vec<DownloadTask> {
        manifest
            .segments()
            .iter()
            .enumerate()
            .map(|(idx, segment)| DownloadTask {
                segment: segment.clone(),
                url: manifest.url_of(segment),
                dest: dest_dir.join(SegmentManifest::local_name(idx, segment)),
            })
            .collect()
    }

    /// Download every segment into `dest_dir`.
    ///
    /// Segments already present are not fetched again. On failure or
    /// cancellation, the completed segments are left on disk so that a
    /// later call can resume, but no partial file is.
    pub fn download(
        &self,
        manifest: &SegmentManifest,
        dest_dir: &Path,
        cancel: &Cancellation,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<Downloaded> {
        fs::create_dir_all(dest_dir)?;

        let tasks = Self::tasks(manifest, dest_dir);
        let total = tasks.len();
        let width = self.workers.min(total).max(1);
        info!("Downloading {total} segments with {width} workers");

        let (task_send, task_receive) = unbounded();
        for task in tasks {
            task_send
                .send(task)
                .map_err(|_| err_msg("Could not queue download task"))?;
        }
        // Workers stop once the queue is drained
        drop(task_send);

        // Stops the other workers on failure, without cancelling the caller
        let stop = cancel.child();

        thread::scope(|scope| -> Result<Downloaded> {
            let (outcome_send, outcome_receive) = unbounded();

            let mut handles = Vec::with_capacity(width);
            for id in 0..width {
                let mut worker = FetchWorker::new(id, self.fetcher, self.retries, stop.clone());
                worker.set_receive_channel(task_receive.clone());
                worker.set_send_channel(outcome_send.clone());

                let handle = thread::Builder::new()
                    .name(format!("fetch-{id}"))
                    .spawn_scoped(scope, move || worker.run())?;
                handles.push(handle);
            }
            drop(outcome_send);

            let mut tracker = ProgressTracker::new(total);
            let mut downloaded = Downloaded::default();
            let mut failure = None;
            let mut aborted = 0;

            for outcome in outcome_receive {
                match outcome {
                    TaskOutcome::Done {
                        segment,
                        path,
                        bytes,
                        skipped,
                    } => {
                        downloaded.paths.insert(segment, path);
                        reporter.report(&tracker.record(bytes, skipped));
                    }
                    TaskOutcome::Failed { segment, error } => {
                        error!("Segment '{segment}' failed: {error}");
                        stop.cancel();
                        failure.get_or_insert(error);
                    }
                    TaskOutcome::Cancelled { segment } => {
                        debug!("Segment '{segment}' cancelled");
                        aborted += 1;
                    }
                }
            }

            for handle in handles {
                handle
                    .join()
                    .map_err(|_| err_msg("A fetch worker panicked"))??;
            }

            if let Some(error) = failure {
                return Err(error);
            }

            if downloaded.len() < total {
                info!(
                    "Download cancelled: {} of {total} segments done, {aborted} aborted",
                    downloaded.len()
                );
                return Err(Error::DownloadCancelled);
            }

            Ok(downloaded)
        })
    }
}
