use std::io;
use std::path::{Path, PathBuf};

use futures_util::TryStreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

use crate::cache;
use crate::fs::{FileCreatorRenamer, FsFileCreatorRenamer, NamedWriter};
use crate::integrity::{HashVerifier, IntegrityError, Sha256Verifier};
use crate::models::ReleaseArchive;
use crate::progress::WriteCounter;
use crate::remote::{check_exists_remote, HashFetcher, HttpHashFetcher, RemoteError, ReqwestTransport, Transport};

/// Where Go publishes its binary releases.
pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com/golang/";

/// Custom errors for download operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("io error")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("provide binary archive version to download")]
    MissingVersion,
    #[error("copied {copied} bytes; expected {expected}")]
    LengthMismatch { copied: u64, expected: u64 },
    #[error("error verifying SHA256 of {}", file.display())]
    Verify {
        file: PathBuf,
        #[source]
        source: IntegrityError,
    },
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        DownloadError::Remote(RemoteError::Network(e))
    }
}

impl DownloadError {
    /// Whether running the download again is a sensible recovery.
    ///
    /// Local filesystem faults and unknown versions are not; network faults,
    /// short transfers and corrupt archives are.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Io(_) | DownloadError::MissingVersion => false,
            DownloadError::Remote(e) => e.is_transient(),
            DownloadError::LengthMismatch { .. } => true,
            DownloadError::Verify { source, .. } => matches!(source, IntegrityError::Mismatch { .. }),
        }
    }
}

/// How a successful download came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The archive was already in the download directory; nothing was fetched.
    Cached,
    /// The archive was fetched, verified and committed.
    Downloaded,
}

/// Options for one downloader.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Prefix of every archive URL, ending with `/`.
    pub base_url: String,
    pub download_dir: PathBuf,
    /// Fetch again even when the archive is already cached.
    pub force: bool,
    /// Don't draw the progress line.
    pub quiet: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            download_dir: PathBuf::new(),
            force: false,
            quiet: false,
        }
    }
}

/// Fetches release archives into a local download directory.
///
/// Bytes land in `<archive>.tmp` first; the file only gets its real name
/// after the length check and hash verification pass.
pub struct ReleaseDownloader<
    T = ReqwestTransport,
    F = FsFileCreatorRenamer,
    H = HttpHashFetcher,
    V = Sha256Verifier,
> {
    transport: T,
    files: F,
    hash_fetcher: H,
    hash_verifier: V,
    options: DownloadOptions,
}

impl ReleaseDownloader {
    /// Production wiring: real filesystem, one shared HTTP client.
    pub fn new(options: DownloadOptions) -> Self {
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let hash_fetcher = HttpHashFetcher::new(transport.clone());
        Self::from_parts(
            options,
            transport,
            FsFileCreatorRenamer,
            hash_fetcher,
            Sha256Verifier,
        )
    }
}

impl<T, F, H, V> ReleaseDownloader<T, F, H, V> {
    pub fn from_parts(
        options: DownloadOptions,
        transport: T,
        files: F,
        hash_fetcher: H,
        hash_verifier: V,
    ) -> Self {
        Self {
            transport,
            files,
            hash_fetcher,
            hash_verifier,
            options,
        }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    /// Final location of `version`'s archive, whether or not it exists yet.
    pub fn archive_path(&self, version: &str) -> PathBuf {
        ReleaseArchive::new(version).final_path(&self.options.download_dir)
    }
}

impl<T, F, H, V> ReleaseDownloader<T, F, H, V>
where
    T: Transport,
    F: FileCreatorRenamer,
    H: HashFetcher,
    V: HashVerifier,
{
    /// Makes sure a verified archive for `version` sits in the download directory.
    pub async fn download(&self, version: &str) -> Result<DownloadOutcome, DownloadError> {
        if version.trim().is_empty() {
            return Err(DownloadError::MissingVersion);
        }
        let archive = ReleaseArchive::new(version);
        let dir = &self.options.download_dir;

        tokio::fs::create_dir_all(dir).await?;

        if cache::version_exists(&archive, dir).await? && !self.options.force {
            tracing::info!(version, "archive has already been downloaded");
            return Ok(DownloadOutcome::Cached);
        }

        let url = archive.url(&self.options.base_url);
        check_exists_remote(&self.transport, &url, version).await?;

        let tmp_path = archive.temporary_path(dir);
        if let Err(e) = self.fetch_verified(&archive, &url, &tmp_path).await {
            // The next attempt truncates it.
            tracing::warn!(path = %tmp_path.display(), error = ?e, "download failed, leaving temporary file");
            return Err(e);
        }

        let final_path = archive.final_path(dir);
        self.files.rename(&tmp_path, &final_path).await?;
        tracing::info!(path = %final_path.display(), "archive committed");
        Ok(DownloadOutcome::Downloaded)
    }

    /// Streams the archive into `tmp_path` and verifies it. Never touches the final path.
    async fn fetch_verified(
        &self,
        archive: &ReleaseArchive,
        url: &str,
        tmp_path: &Path,
    ) -> Result<(), DownloadError> {
        let mut tmp = self.files.create(tmp_path).await?;

        let resp = self.transport.get(url).await?;
        if !resp.status.is_success() {
            return Err(RemoteError::Status(resp.status).into());
        }

        let mut counter = if self.options.quiet {
            WriteCounter::hidden(resp.content_length)
        } else {
            WriteCounter::new(resp.content_length)
        };

        let copied = {
            let body = resp
                .body
                .inspect_ok(|chunk| counter.record(chunk.len()))
                .map_err(io::Error::other);
            let mut reader = StreamReader::new(body);
            tokio::io::copy(&mut reader, &mut tmp).await
        };
        let copied = match copied {
            Ok(n) => n,
            Err(e) => {
                counter.abandon();
                return Err(copy_failure(e));
            }
        };

        if let Some(expected) = counter.total_expected() {
            if expected != copied {
                counter.abandon();
                return Err(DownloadError::LengthMismatch { copied, expected });
            }
        }
        counter.finish();

        tmp.shutdown().await?;
        let tmp_name = tmp.name().to_path_buf();
        drop(tmp);

        let want_hex = self
            .hash_fetcher
            .fetch(&archive.hash_url(&self.options.base_url))
            .await?;

        self.hash_verifier
            .verify(&tmp_name, &want_hex)
            .await
            .map_err(|source| DownloadError::Verify {
                file: tmp_name.clone(),
                source,
            })
    }
}

/// Separates body read failures (network) from write failures (disk).
fn copy_failure(e: io::Error) -> DownloadError {
    let from_network = e
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>());
    if !from_network {
        return DownloadError::Io(e);
    }
    match e.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(source)) => DownloadError::from(*source),
        _ => DownloadError::Io(io::Error::other("response body interrupted")),
    }
}
