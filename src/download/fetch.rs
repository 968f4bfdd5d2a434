use std::{
    fmt::Debug,
    io::{self, Read, Write},
    time::Duration,
};

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::trace;

use super::Cancellation;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeouts, refused or reset connections, interrupted bodies
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("could not write to disk: {0}")]
    Io(#[from] io::Error),

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Only transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Transport(err.to_string()),
        }
    }
}

/// Interface for retrieving one remote resource
pub trait SegmentFetcher: Sync + Debug {
    /// Stream the resource at `url` into `sink` and return the number of
    /// bytes written.
    ///
    /// Implementations should check `cancel` between chunks and return
    /// [`FetchError::Cancelled`] once it is set.
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        cancel: &Cancellation,
    ) -> Result<u64, FetchError>;
}

/// Fetch segments over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// `timeout` bounds each whole request, body included
    pub fn new(timeout: Duration) -> crate::result::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;

        Ok(Self { client })
    }
}

impl SegmentFetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        cancel: &Cancellation,
    ) -> Result<u64, FetchError> {
        let mut response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut buf = vec![0; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let n = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                // The body is read from the network, not from the disk
                Err(err) => return Err(FetchError::Transport(err.to_string())),
            };

            sink.write_all(&buf[..n])?;
            written += n as u64;
        }

        trace!("Fetched {written} bytes from {url}");
        Ok(written)
    }
}
