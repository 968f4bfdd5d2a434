use std::{fmt::Display, path::PathBuf};

use miette::{miette, Diagnostic};
use thiserror::Error;

use crate::download::FetchError;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// The platform refused to hand out a playback grant for the content
    #[error("Playback grant rejected for '{id}': {reason}")]
    #[diagnostic(code(vodkeep::authorization))]
    Authorization { id: String, reason: String },

    #[error("Could not parse playlist: {0}")]
    #[diagnostic(code(vodkeep::manifest_parse))]
    ManifestParse(String),

    /// The query endpoint answered with a 4xx or with an `errors` payload
    #[error("Query rejected ({status}): {message}")]
    #[diagnostic(code(vodkeep::query_rejected))]
    QueryRejected { status: u16, message: String },

    #[error("Segment '{url}' failed after {attempts} attempt(s)")]
    #[diagnostic(
        code(vodkeep::download_failed),
        help("Completed segments were kept. Running the same command again resumes the download")
    )]
    DownloadFailed {
        url: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("Download cancelled")]
    #[diagnostic(code(vodkeep::download_cancelled))]
    DownloadCancelled,

    #[error("Joining segments into '{}' failed: {status}", output.display())]
    #[diagnostic(
        code(vodkeep::joining_failed),
        help("The downloaded segments were kept for inspection")
    )]
    JoiningFailed { output: PathBuf, status: String },

    #[error("Metadata file '{}' is corrupt", path.display())]
    #[diagnostic(code(vodkeep::metadata_corrupt))]
    MetadataCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The chat source stopped paginating before its last page
    #[error("Chat of '{id}' could not be captured completely: {reason}")]
    #[diagnostic(
        code(vodkeep::transcript_incomplete),
        help("Nothing was written. Capturing the chat again starts from the first page")
    )]
    TranscriptIncomplete { id: String, reason: String },

    #[error("Transcript line {line} is malformed: {reason}")]
    #[diagnostic(code(vodkeep::transcript_parse))]
    TranscriptParse { line: usize, reason: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("{0}")]
    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl Error {
    /// Add context to the error.
    ///
    /// Typed errors are kept as-is so that callers can still match on them.
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            Error::Io(err) => Error::Miette(miette!("{err}").wrap_err(f())),
            err => err,
        }
    }

    /// Whether the caller should stop processing further queued items
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::DownloadCancelled)
    }
}

pub fn err_msg<D: Display>(msg: D) -> Error {
    Error::Miette(miette!("{msg}"))
}

pub fn bail<T, D: Display>(msg: D) -> Result<T> {
    Err(err_msg(msg))
}

pub type Result<T> = std::result::Result<T, Error>;
