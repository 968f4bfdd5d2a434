use std::{
    io::ErrorKind,
    process::{Command, Output, Stdio},
};

use bitflags::bitflags;
use tracing::{debug, trace, Level};

use crate::result::{bail, err_msg, Result};

pub const FFMPEG: &str = "ffmpeg";

bitflags! {
    /// Output streams kept in the returned [`Output`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capture: u8 {
        const STDOUT = 0b01;
        const STDERR = 0b10;
    }
}

/// Run a program to completion with a closed stdin.
///
/// Streams not asked for are discarded, unless debug logging is on, in which
/// case they are captured and logged line by line.
/// A non-zero exit status is not an error here: check `Output::status`.
pub fn run_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    capture: Capture,
) -> Result<Output> {
    let verbose = tracing::enabled!(Level::DEBUG);
    let stdio = |wanted: bool| {
        if wanted || verbose {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    };

    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(Stdio::null())
        .stdout(stdio(capture.contains(Capture::STDOUT)))
        .stderr(stdio(capture.contains(Capture::STDERR)));

    debug!("Executing {cmd:?}");
    let output = cmd.output().map_err(|err| match err.kind() {
        ErrorKind::NotFound => err_msg(format!("'{program}' was not found in PATH")),
        _ => err.into(),
    })?;

    debug!("{program} exited with {}", output.status);
    if verbose {
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            trace!("{program}: {line}");
        }
    }

    Ok(output)
}

/// Run the program and fail unless it exits successfully
pub fn assert_success_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
) -> Result<()> {
    let output = run_command(program, f, Capture::empty())?;
    if !output.status.success() {
        return bail(format!("{program} exited with {}", output.status));
    }
    Ok(())
}

/// The last `count` non-empty lines of the captured stderr
pub fn stderr_tail(output: &Output, count: usize) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<_> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
