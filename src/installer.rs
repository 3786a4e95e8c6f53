// src/installer.rs

use std::fs::File;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;

use crate::downloader::{DownloadError, ReleaseDownloader};
use crate::fs::FileCreatorRenamer;
use crate::integrity::HashVerifier;
use crate::models::ARCHIVE_PREFIX;
use crate::remote::{HashFetcher, Transport};

/// Directory the archive unpacks into, relative to the install root.
pub const INSTALL_DIR_NAME: &str = "go";
/// File inside an installed tree naming its version, e.g. `go1.10.6`.
pub const VERSION_FILE: &str = "VERSION";

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("error removing previous install at {}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error extracting {} to {}", archive.display(), target.display())]
    Extract {
        archive: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io error")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The requested version was already the active one.
    AlreadyInstalled,
    Installed,
}

/// Unpacks a cached archive into the live install tree.
pub trait ArchiveExtractor {
    fn unarchive(&self, source: &Path, target: &Path) -> impl Future<Output = io::Result<()>>;
}

/// Clears a previous install.
pub trait PathRemover {
    fn remove_all(&self, path: &Path) -> impl Future<Output = io::Result<()>>;
}

/// Extracts `.tar.gz` archives on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzUnarchiver;

impl ArchiveExtractor for GzUnarchiver {
    async fn unarchive(&self, source: &Path, target: &Path) -> io::Result<()> {
        let (source, target) = (source.to_path_buf(), target.to_path_buf());
        tokio::task::spawn_blocking(move || unpack_tar_gz(&source, &target))
            .await
            .map_err(io::Error::other)?
    }
}

fn unpack_tar_gz(source: &Path, target: &Path) -> io::Result<()> {
    std::fs::create_dir_all(target)?;
    let file = File::open(source)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.unpack(target)
}

/// Removes a directory tree; a tree that isn't there counts as removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRemover;

impl PathRemover for FsRemover {
    async fn remove_all(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Version tag of the tree under `install_root`, e.g. `go1.10.6`.
/// `None` when nothing is installed there.
pub async fn installed_version(install_root: &Path) -> io::Result<Option<String>> {
    let version_file = install_root.join(INSTALL_DIR_NAME).join(VERSION_FILE);
    match tokio::fs::read_to_string(&version_file).await {
        Ok(contents) => Ok(contents
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Makes `version` the active install under `install_root`.
///
/// The archive comes from the downloader's cache when present; a cached
/// archive is trusted by name and not verified again.
pub async fn install_release<T, F, H, V, E, R>(
    version: &str,
    install_root: &Path,
    extractor: &E,
    remover: &R,
    downloader: &ReleaseDownloader<T, F, H, V>,
) -> Result<InstallOutcome, InstallError>
where
    T: Transport,
    F: FileCreatorRenamer,
    H: HashFetcher,
    V: HashVerifier,
    E: ArchiveExtractor,
    R: PathRemover,
{
    let wanted = format!("{}{}", ARCHIVE_PREFIX, version);
    if installed_version(install_root).await?.as_deref() == Some(wanted.as_str()) {
        tracing::info!(version, "already installed");
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    downloader.download(version).await?;
    let archive = downloader.archive_path(version);

    let previous = install_root.join(INSTALL_DIR_NAME);
    remover
        .remove_all(&previous)
        .await
        .map_err(|source| InstallError::Remove {
            path: previous.clone(),
            source,
        })?;

    extractor
        .unarchive(&archive, install_root)
        .await
        .map_err(|source| InstallError::Extract {
            archive: archive.clone(),
            target: install_root.to_path_buf(),
            source,
        })?;

    tracing::info!(version, root = %install_root.display(), "installed");
    Ok(InstallOutcome::Installed)
}
