use std::{
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::{
    actors::Actor,
    io::{publish, sibling_tempfile},
    result::{err_msg, Error},
};

use super::{Cancellation, FetchError, SegmentFetcher};

/// One segment to bring to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// The segment as listed in the manifest
    pub segment: String,
    pub url: String,
    pub dest: PathBuf,
}

#[derive(Debug)]
pub enum TaskOutcome {
    Done {
        segment: String,
        path: PathBuf,
        bytes: u64,
        skipped: bool,
    },
    Failed {
        segment: String,
        error: Error,
    },
    Cancelled {
        segment: String,
    },
}

/// Actor pulling tasks from the shared queue until it is empty or the
/// download is cancelled
#[derive(Debug)]
pub struct FetchWorker<'a> {
    id: usize,
    fetcher: &'a dyn SegmentFetcher,
    retries: u32,
    cancel: Cancellation,

    receive_channel: Option<Receiver<DownloadTask>>,
    send_channel: Option<Sender<TaskOutcome>>,
}

impl Actor<DownloadTask, TaskOutcome> for FetchWorker<'_> {
    fn set_receive_channel(&mut self, channel: Receiver<DownloadTask>) {
        self.receive_channel = Some(channel);
    }

    fn set_send_channel(&mut self, channel: Sender<TaskOutcome>) {
        self.send_channel = Some(channel);
    }

    fn run(mut self) -> crate::result::Result<()> {
        let receive_channel = self
            .receive_channel
            .take()
            .ok_or_else(|| err_msg("Receive channel not set"))?;

        let send_channel = self
            .send_channel
            .take()
            .ok_or_else(|| err_msg("Send channel not set"))?;

        debug!("{}: Worker started, waiting for a segment", self.id);

        for task in receive_channel {
            if self.cancel.is_cancelled() {
                debug!("{}: Cancelled, leaving the remaining segments", self.id);
                break;
            }

            let outcome = self.perform(task);
            if send_channel.send(outcome).is_err() {
                debug!("{}: Nobody is listening anymore. Stopping", self.id);
                break;
            }
        }

        debug!("{}: No more segments. Stopping the worker.", self.id);
        Ok(())
    }
}

impl<'a> FetchWorker<'a> {
    pub fn new(
        id: usize,
        fetcher: &'a dyn SegmentFetcher,
        retries: u32,
        cancel: Cancellation,
    ) -> Self {
        Self {
            id,
            fetcher,
            retries,
            cancel,
            receive_channel: None,
            send_channel: None,
        }
    }

    fn perform(&self, task: DownloadTask) -> TaskOutcome {
        // Segments written by an earlier run are complete thanks to the rename
        if let Ok(metadata) = fs::metadata(&task.dest) {
            if metadata.is_file() {
                trace!("{}: '{}' already on disk", self.id, task.segment);
                return TaskOutcome::Done {
                    segment: task.segment,
                    path: task.dest,
                    bytes: metadata.len(),
                    skipped: true,
                };
            }
        }

        let mut attempts = 0;
        loop {
            attempts += 1;

            match self.attempt(&task) {
                Ok(bytes) => {
                    return TaskOutcome::Done {
                        segment: task.segment,
                        path: task.dest,
                        bytes,
                        skipped: false,
                    }
                }
                Err(FetchError::Cancelled) => {
                    debug!("{}: '{}' aborted", self.id, task.segment);
                    return TaskOutcome::Cancelled {
                        segment: task.segment,
                    };
                }
                Err(err) if err.is_retryable() && attempts <= self.retries => {
                    warn!(
                        "{}: Attempt {attempts} for '{}' failed ({err}). Retrying",
                        self.id, task.segment
                    );
                }
                Err(err) => {
                    return TaskOutcome::Failed {
                        error: Error::DownloadFailed {
                            url: task.url,
                            attempts,
                            source: err,
                        },
                        segment: task.segment,
                    }
                }
            }
        }
    }

    /// Fetch into a temporary sibling and rename it over the destination.
    /// The temporary file is removed on any failure.
    fn attempt(&self, task: &DownloadTask) -> Result<u64, FetchError> {
        let mut tmp = sibling_tempfile(&task.dest).map_err(into_fetch_error)?;

        let bytes = {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let bytes = self.fetcher.fetch(&task.url, &mut writer, &self.cancel)?;
            writer.flush()?;
            bytes
        };

        publish(tmp, &task.dest).map_err(into_fetch_error)?;
        Ok(bytes)
    }
}

fn into_fetch_error(err: Error) -> FetchError {
    match err {
        Error::Io(err) => FetchError::Io(err),
        err => FetchError::Io(std::io::Error::other(err.to_string())),
    }
}
