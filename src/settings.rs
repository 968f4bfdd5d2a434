use std::{path::Path, path::PathBuf, str::FromStr, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{
    remote::DEFAULT_CLIENT_ID,
    result::{err_msg, Result},
};

/// Prefix of every environment variable read by the program
pub const ENV_PREFIX: &str = "VODKEEP";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub archive_root: PathBuf,
    /// Defaults to a hidden directory inside the archive root
    pub scratch_dir: Option<PathBuf>,
    pub workers: usize,
    pub retries: u32,
    pub timeout_secs: u64,
    pub client_id: String,
    pub ffmpeg_loglevel: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            archive_root: PathBuf::from("archive"),
            scratch_dir: None,
            workers: 8,
            retries: 3,
            timeout_secs: 30,
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            ffmpeg_loglevel: "error".to_owned(),
            log_level: "info".to_owned(),
        }
    }
}

impl Settings {
    /// Read the settings from an optional TOML file, then from the
    /// `VODKEEP_*` environment variables
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| self.archive_root.join(".scratch"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn log_level(&self) -> Result<tracing::Level> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| err_msg(format!("Invalid log level '{}'", self.log_level)))
    }
}
