use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    download::Cancellation,
    result::{Error, Result},
    types::Transcript,
};

use super::CommentSource;

/// Follows the comment cursor of a video until the last page
#[derive(Debug)]
pub struct TranscriptCapturer<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: CommentSource + ?Sized> TranscriptCapturer<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Collect every chat event of the video, in the order the source gives them
    pub fn capture(&self, video_id: &str, cancel: &Cancellation) -> Result<Transcript> {
        let mut transcript = Transcript::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();
        let mut pages = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::DownloadCancelled);
            }

            let page = self.source.comments(video_id, cursor.as_deref())?;
            pages += 1;
            debug!("Chat page {pages} of {video_id}: {} events", page.events.len());

            for event in page.events {
                transcript.push(event);
            }

            match page.next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    warn!("Chat cursor '{next}' came back twice at page {pages}");
                    return Err(Error::TranscriptIncomplete {
                        id: video_id.to_owned(),
                        reason: format!("cursor '{next}' was already followed"),
                    });
                }
                None => break,
            }
        }

        info!(
            "Captured {} chat events from {} speakers for {video_id}",
            transcript.len(),
            transcript.speakers().len()
        );
        Ok(transcript)
    }
}
