pub mod cache;
pub mod config;
pub mod downloader;
pub mod fs;
pub mod installer;
pub mod integrity;
pub mod models;
pub mod progress;
pub mod remote;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::downloader::{DownloadError, DownloadOptions, DownloadOutcome, ReleaseDownloader};
    pub use crate::installer::{install_release, FsRemover, GzUnarchiver, InstallOutcome};
    pub use crate::models::ReleaseArchive;
}
