use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use sha2::{Sha256, Digest};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("{} corrupt? does not have expected SHA-256 of {expected}", file.display())]
    Mismatch { file: PathBuf, expected: String },
}

/// Compute SHA256 hash of a file asynchronously, as lowercase hex.
pub async fn sha256_sum(path: &Path) -> Result<String, IntegrityError> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 1024 * 8];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 { break; }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fails unless the file at `path` hashes to exactly `expected`.
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<(), IntegrityError> {
    let sum = sha256_sum(path).await?;
    if sum != expected {
        return Err(IntegrityError::Mismatch {
            file: path.to_path_buf(),
            expected: expected.to_string(),
        });
    }
    Ok(())
}

/// Checks a downloaded file against its expected hex digest.
pub trait HashVerifier: Send + Sync {
    fn verify(
        &self,
        path: &Path,
        expected: &str,
    ) -> impl Future<Output = Result<(), IntegrityError>> + Send;
}

/// Reads the file back from disk and compares its SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Verifier;

impl HashVerifier for Sha256Verifier {
    async fn verify(&self, path: &Path, expected: &str) -> Result<(), IntegrityError> {
        verify_sha256(path, expected).await
    }
}

impl<F> HashVerifier for F
where
    F: Fn(&Path, &str) -> Result<(), IntegrityError> + Send + Sync,
{
    fn verify(
        &self,
        path: &Path,
        expected: &str,
    ) -> impl Future<Output = Result<(), IntegrityError>> + Send {
        std::future::ready(self(path, expected))
    }
}
