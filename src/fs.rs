// src/fs.rs

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

/// A writable handle that remembers which path it was created at.
pub trait NamedWriter: AsyncWrite + Unpin + Send {
    fn name(&self) -> &Path;
}

/// The only two filesystem operations the downloader performs.
///
/// Implementations never delete anything: on failure the caller decides what
/// happens to a half-written file.
pub trait FileCreatorRenamer: Send + Sync {
    type File: NamedWriter;

    /// Creates `path`, truncating it if it already exists.
    fn create(&self, path: &Path) -> impl Future<Output = io::Result<Self::File>> + Send;

    fn rename(&self, old: &Path, new: &Path) -> impl Future<Output = io::Result<()>> + Send;
}

/// Backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileCreatorRenamer;

#[derive(Debug)]
pub struct FsFile {
    file: tokio::fs::File,
    path: PathBuf,
}

impl NamedWriter for FsFile {
    fn name(&self) -> &Path {
        &self.path
    }
}

impl AsyncWrite for FsFile {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

impl FileCreatorRenamer for FsFileCreatorRenamer {
    type File = FsFile;

    async fn create(&self, path: &Path) -> io::Result<FsFile> {
        let file = tokio::fs::File::create(path).await?;
        Ok(FsFile {
            file,
            path: path.to_path_buf(),
        })
    }

    async fn rename(&self, old: &Path, new: &Path) -> io::Result<()> {
        tokio::fs::rename(old, new).await
    }
}

type FileMap = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

/// Keeps "files" in a map so tests never touch the disk.
///
/// Clones share the same map, so a test can hand one clone to the downloader
/// and inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileCreatorRenamer {
    files: FileMap,
}

impl MemoryFileCreatorRenamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = lock(&self.files).keys().cloned().collect();
        paths.sort();
        paths
    }
}

// A panic while holding the lock leaves the map itself intact.
fn lock(files: &FileMap) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
    files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct MemoryFile {
    path: PathBuf,
    files: FileMap,
}

impl NamedWriter for MemoryFile {
    fn name(&self) -> &Path {
        &self.path
    }
}

impl AsyncWrite for MemoryFile {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut files = lock(&self.files);
        match files.get_mut(&self.path) {
            Some(contents) => {
                contents.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            // Renamed away while still open.
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} no longer exists", self.path.display()),
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl FileCreatorRenamer for MemoryFileCreatorRenamer {
    type File = MemoryFile;

    async fn create(&self, path: &Path) -> io::Result<MemoryFile> {
        lock(&self.files).insert(path.to_path_buf(), Vec::new());
        Ok(MemoryFile {
            path: path.to_path_buf(),
            files: self.files.clone(),
        })
    }

    async fn rename(&self, old: &Path, new: &Path) -> io::Result<()> {
        let mut files = lock(&self.files);
        let contents = files.remove(old).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", old.display()),
            )
        })?;
        files.insert(new.to_path_buf(), contents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn fs_create_then_rename() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("a.tmp");
        let dst = dir.path().join("a");

        let fcr = FsFileCreatorRenamer;
        let mut file = fcr.create(&tmp).await.unwrap();
        assert_eq!(file.name(), tmp.as_path());
        file.write_all(b"payload").await.unwrap();
        file.shutdown().await.unwrap();
        drop(file);

        fcr.rename(&tmp, &dst).await.unwrap();
        assert!(!tmp.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn fs_create_truncates_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("stale.tmp");
        std::fs::write(&tmp, b"left over from a failed run").unwrap();

        let mut file = FsFileCreatorRenamer.create(&tmp).await.unwrap();
        file.write_all(b"new").await.unwrap();
        file.shutdown().await.unwrap();
        drop(file);

        assert_eq!(std::fs::read(&tmp).unwrap(), b"new");
    }

    #[tokio::test]
    async fn memory_create_write_rename() {
        let fcr = MemoryFileCreatorRenamer::new();
        let tmp = Path::new("dl/a.tmp");
        let dst = Path::new("dl/a");

        let mut file = fcr.create(tmp).await.unwrap();
        file.write_all(b"hello ").await.unwrap();
        file.write_all(b"world").await.unwrap();
        assert_eq!(fcr.contents(tmp).unwrap(), b"hello world");

        fcr.rename(tmp, dst).await.unwrap();
        assert!(!fcr.exists(tmp));
        assert_eq!(fcr.paths(), vec![PathBuf::from("dl/a")]);
        assert_eq!(fcr.contents(dst).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn memory_rename_of_missing_file_fails() {
        let fcr = MemoryFileCreatorRenamer::new();
        let err = fcr
            .rename(Path::new("nope"), Path::new("dst"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fcr.paths().is_empty());
    }
}
