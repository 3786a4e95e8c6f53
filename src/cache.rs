// src/cache.rs

use std::io;
use std::path::Path;

use crate::models::ReleaseArchive;

/// Whether the committed archive for `archive` is present in `download_dir`.
///
/// A missing file is an ordinary `false`; any other stat failure is returned.
pub async fn version_exists(archive: &ReleaseArchive, download_dir: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(archive.final_path(download_dir)).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Versions with a committed archive in `download_dir`, sorted by name.
/// Creates the directory when it doesn't exist yet.
pub async fn list_downloaded(download_dir: &Path) -> io::Result<Vec<String>> {
    tokio::fs::create_dir_all(download_dir).await?;

    let mut versions = Vec::new();
    let mut entries = tokio::fs::read_dir(download_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if let Some(archive) = name.to_str().and_then(ReleaseArchive::from_file_name) {
            versions.push(archive.version().to_string());
        }
    }
    versions.sort();
    Ok(versions)
}
