//! Archive stream videos, clips and their chat to local storage.
//!
//! The pipeline resolves the segment manifest of a piece of content,
//! downloads the segments with a pool of worker threads, joins them with
//! `ffmpeg` and records what was archived in a rebuildable index.

pub mod acquire;
pub mod actors;
pub mod archive;
pub mod download;
pub mod io;
pub mod logging;
pub mod outside;
pub mod remote;
pub mod result;
pub mod settings;
pub mod transcript;
pub mod types;

pub use result::{Error, Result};
