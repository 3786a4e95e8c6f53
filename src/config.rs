// src/config.rs

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::downloader::{DownloadOptions, DEFAULT_BASE_URL};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "GOFETCH_CONFIG";
const HOME_DIR_NAME: &str = "godl";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,
    #[error("error reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// User settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub download_dir: PathBuf,
    /// The archive unpacks into `<install_root>/go`.
    pub install_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        match godl_home() {
            Ok(home) => Self::rooted_at(&home),
            Err(_) => {
                tracing::warn!(dir = HOME_DIR_NAME, "no home directory, using a relative godl directory");
                Self::rooted_at(Path::new(HOME_DIR_NAME))
            }
        }
    }
}

/// `$HOME/godl`.
pub fn godl_home() -> Result<PathBuf, ConfigError> {
    home::home_dir()
        .map(|home| home.join(HOME_DIR_NAME))
        .ok_or(ConfigError::NoHome)
}

impl Settings {
    /// Defaults with the download directory under `godl_home`.
    pub fn rooted_at(godl_home: &Path) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            download_dir: godl_home.join("downloads"),
            install_root: PathBuf::from("/usr/local"),
        }
    }

    /// `$GOFETCH_CONFIG` if set, else `$HOME/godl/config.json`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(godl_home()?.join(CONFIG_FILE_NAME)),
        }
    }

    /// Defaults under `<home>/godl`; no home is an error.
    fn defaults_under(home: Option<PathBuf>) -> Result<Self, ConfigError> {
        home.map(|home| Self::rooted_at(&home.join(HOME_DIR_NAME)))
            .ok_or(ConfigError::NoHome)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Self::defaults_under(home::home_dir());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut settings: Settings =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if !settings.base_url.ends_with('/') {
            settings.base_url.push('/');
        }
        Ok(settings)
    }

    pub fn download_options(&self, force: bool) -> DownloadOptions {
        DownloadOptions {
            base_url: self.base_url.clone(),
            download_dir: self.download_dir.clone(),
            force,
            quiet: false,
        }
    }
}
