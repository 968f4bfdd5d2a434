#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
    time::Duration,
};

use vodkeep::{
    download::{Cancellation, FetchError, SegmentFetcher},
    io::is_part_file,
};

/// What the scripted fetcher does for one URL
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Wait before answering
    pub delay: Duration,
    /// Transport failures before the first success, `u32::MAX` for never
    pub transport_failures: u32,
    /// Answer with this status, every time
    pub status: Option<u16>,
    /// Write a few bytes then wait until cancelled
    pub hang: bool,
}

/// In-memory fetcher answering `<url>` as the body of every URL
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    calls: Mutex<HashMap<String, u32>>,
    completed: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_owned(), script);
        self
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// URLs in the order their fetch succeeded
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

pub fn body_of(url: &str) -> String {
    format!("<{url}>")
}

impl SegmentFetcher for ScriptedFetcher {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        cancel: &Cancellation,
    ) -> Result<u64, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_owned()).or_default();
            *count += 1;
            *count
        };
        let script = self.scripts.get(url).cloned().unwrap_or_default();

        thread::sleep(script.delay);

        if script.hang {
            sink.write_all(b"partial")?;
            sink.flush()?;
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            return Err(FetchError::Cancelled);
        }
        if let Some(status) = script.status {
            return Err(FetchError::Status(status));
        }
        if call <= script.transport_failures {
            return Err(FetchError::Transport("connection reset".to_owned()));
        }

        let body = body_of(url);
        sink.write_all(body.as_bytes())?;
        self.completed.lock().unwrap().push(url.to_owned());
        Ok(body.len() as u64)
    }
}

/// Every file under `dir`, recursively
pub fn all_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(all_files(&path));
        } else {
            files.push(path);
        }
    }
    files.sort();
    files
}

pub fn part_files(dir: &Path) -> Vec<PathBuf> {
    all_files(dir).into_iter().filter(|p| is_part_file(p)).collect()
}
