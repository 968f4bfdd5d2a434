use std::{
    fmt::Debug,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    io::{publish, sibling_tempfile},
    result::{bail, Error, Result},
};

use super::command::{assert_success_command, run_command, stderr_tail, Capture, FFMPEG};

pub trait StreamJoiner: Sync + Debug {
    /// Losslessly concatenate the segments, in the given order, into `output`.
    ///
    /// `output` must not exist afterwards unless the join succeeded.
    fn join(&self, segments: &[PathBuf], output: &Path, loglevel: &str) -> Result<()>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg;

impl Ffmpeg {
    /// Verify that the `ffmpeg` binary is reachable
    pub fn new() -> Result<Self> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))?;

        Ok(Self)
    }
}

impl StreamJoiner for Ffmpeg {
    fn join(&self, segments: &[PathBuf], output: &Path, loglevel: &str) -> Result<()> {
        if segments.is_empty() {
            return bail("Nothing to join");
        }

        let mut list = tempfile::Builder::new()
            .prefix("concat-")
            .suffix(".txt")
            .tempfile()?;
        list.write_all(concat_list(segments)?.as_bytes())?;
        list.flush()?;

        // ffmpeg picks the container from the extension, which the temp file keeps
        let tmp = sibling_tempfile(output)?;

        info!("Joining {} segments into '{}'", segments.len(), output.display());
        let res = run_command(
            FFMPEG,
            |cmd| {
                cmd.args(["-hide_banner", "-loglevel", loglevel])
                    .arg("-y")
                    .args(["-f", "concat", "-safe", "0"])
                    .arg("-i")
                    .arg(list.path())
                    .args(["-c", "copy"])
                    .args(["-bsf:a", "aac_adtstoasc"])
                    .arg(tmp.path())
            },
            Capture::STDERR,
        )?;

        if !res.status.success() {
            let tail = stderr_tail(&res, 5);
            let status = if tail.is_empty() {
                res.status.to_string()
            } else {
                format!("{}\n{tail}", res.status)
            };
            return Err(Error::JoiningFailed {
                output: output.to_path_buf(),
                status,
            });
        }

        debug!("Join done, publishing '{}'", output.display());
        publish(tmp, output)
    }
}

/// Input of the concat demuxer, one absolute path per line, in order
fn concat_list(segments: &[PathBuf]) -> Result<String> {
    let mut list = String::from("ffconcat version 1.0\n");
    for segment in segments {
        let path = segment.canonicalize()?;
        // Single quotes are closed, escaped, and reopened
        let quoted = path.to_string_lossy().replace('\'', r"'\''");
        list.push_str(&format!("file '{quoted}'\n"));
    }
    Ok(list)
}
