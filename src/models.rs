// src/models.rs

use std::path::{Path, PathBuf};

/// Every archive name starts with this.
pub const ARCHIVE_PREFIX: &str = "go";
/// Platform part of the archive name, without the leading dot.
pub const ARCHIVE_SUFFIX: &str = "darwin-amd64.tar.gz";
/// Appended to the final path while a transfer is in flight.
pub const TEMP_EXTENSION: &str = ".tmp";
/// Appended to the artifact URL to get its published SHA-256.
pub const HASH_EXTENSION: &str = ".sha256";

/// One release archive, identified by its version string.
///
/// The version is opaque: it is only interpolated into the naming template,
/// so the same version always yields the same file name and URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseArchive {
    version: String,
}

impl ReleaseArchive {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// e.g. `go1.10.6.darwin-amd64.tar.gz`
    pub fn file_name(&self) -> String {
        format!("{}{}.{}", ARCHIVE_PREFIX, self.version, ARCHIVE_SUFFIX)
    }

    /// Remote location of the archive. `base_url` is expected to end with `/`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url, self.file_name())
    }

    /// Remote location of the archive's hex SHA-256.
    pub fn hash_url(&self, base_url: &str) -> String {
        format!("{}{}", self.url(base_url), HASH_EXTENSION)
    }

    /// Where the verified archive lives once committed.
    pub fn final_path(&self, download_dir: &Path) -> PathBuf {
        download_dir.join(self.file_name())
    }

    /// Returns the path for the in-flight download file.
    /// e.g., for "/dl/go1.10.6.darwin-amd64.tar.gz", it returns "/dl/go1.10.6.darwin-amd64.tar.gz.tmp"
    pub fn temporary_path(&self, download_dir: &Path) -> PathBuf {
        let mut path = self.final_path(download_dir).into_os_string();
        path.push(TEMP_EXTENSION);
        PathBuf::from(path)
    }

    /// Recovers the version from a committed archive file name.
    /// Temporary files and unrelated names yield `None`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let version = name
            .strip_prefix(ARCHIVE_PREFIX)?
            .strip_suffix(ARCHIVE_SUFFIX)?
            .strip_suffix('.')?;
        if version.is_empty() {
            None
        } else {
            Some(Self::new(version))
        }
    }
}
