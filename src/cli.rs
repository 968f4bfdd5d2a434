use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use vodkeep::{settings::Settings, types::ContentKind};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("VODKEEP_", $v)
    };
}

/// Archive stream videos, clips and their chat to local storage.
/// Download, join, and index them.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Optional TOML settings file. Command line values take precedence over it
    #[arg(long, short, env=arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// The root directory of the archive
    #[arg(long, env=arg_env!("ARCHIVE_ROOT"))]
    pub archive_root: Option<PathBuf>,

    /// Where segments are downloaded before being joined.
    /// Defaults to a hidden directory inside the archive root
    #[arg(long, env=arg_env!("SCRATCH_DIR"))]
    pub scratch_dir: Option<PathBuf>,

    /// Number of segments downloaded at the same time
    #[arg(long, short, env=arg_env!("WORKERS"))]
    pub workers: Option<usize>,

    /// Extra attempts for a segment after a network failure
    #[arg(long, env=arg_env!("RETRIES"))]
    pub retries: Option<u32>,

    /// Timeout of every HTTP request, in seconds
    #[arg(long, env=arg_env!("TIMEOUT_SECS"))]
    pub timeout_secs: Option<u64>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, env=arg_env!("LOG_LEVEL"))]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive videos, by id
    Video {
        #[arg(required = true)]
        ids: Vec<String>,

        /// Also capture the chat of every video
        #[arg(long)]
        chat: bool,
    },

    /// Archive clips, by slug
    Clip {
        #[arg(required = true)]
        slugs: Vec<String>,
    },

    /// Capture the chat of already archived videos
    Chat {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show what is archived, per channel
    Index {
        /// Rebuild the index from the metadata files instead of the saved snapshot
        #[arg(long)]
        refresh: bool,
    },

    /// Show a channel and how much of it is archived
    Channel {
        /// Login name of the channel
        login: String,
    },

    /// Print the metadata file of an archived item
    Lookup {
        #[arg(value_enum)]
        kind: LookupKind,

        /// Video id, clip id or clip slug
        key: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LookupKind {
    Video,
    Clip,
}

impl From<LookupKind> for ContentKind {
    fn from(kind: LookupKind) -> Self {
        match kind {
            LookupKind::Video => ContentKind::Video,
            LookupKind::Clip => ContentKind::Clip,
        }
    }
}

impl Args {
    /// Override the settings with the values given on the command line
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(root) = &self.archive_root {
            settings.archive_root = root.clone();
        }
        if let Some(scratch) = &self.scratch_dir {
            settings.scratch_dir = Some(scratch.clone());
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(retries) = self.retries {
            settings.retries = retries;
        }
        if let Some(timeout) = self.timeout_secs {
            settings.timeout_secs = timeout;
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
    }
}
