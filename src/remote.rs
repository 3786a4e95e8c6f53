// src/remote.rs

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Response body as a stream of chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error")]
    Network(#[from] reqwest::Error),
    #[error("no binary release of {0}")]
    NotFound(String),
    /// Non-success status on the archive itself.
    #[error("{0}")]
    Status(StatusCode),
    /// Non-success status on some other resource, e.g. the hash file.
    #[error("{url}: {status}")]
    UrlStatus { url: String, status: StatusCode },
    #[error("reading {url}")]
    Read {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RemoteError {
    /// Whether a fresh attempt might succeed. A missing release won't appear by retrying.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RemoteError::NotFound(_))
    }
}

/// What the pipeline needs to know about an HTTP response.
pub struct RemoteResponse {
    pub status: StatusCode,
    /// `None` when the server did not declare a length.
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl RemoteResponse {
    /// A response without a body, as returned for `HEAD`.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            content_length: None,
            body: Box::pin(futures_util::stream::empty::<Result<Bytes, reqwest::Error>>()),
        }
    }
}

impl std::fmt::Debug for RemoteResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// The two HTTP verbs the downloader uses. Tests swap in a scripted fake.
pub trait Transport: Send + Sync {
    fn head(&self, url: &str) -> impl Future<Output = Result<RemoteResponse, reqwest::Error>> + Send;

    fn get(&self, url: &str) -> impl Future<Output = Result<RemoteResponse, reqwest::Error>> + Send;
}

/// Production transport over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Transport for ReqwestTransport {
    async fn head(&self, url: &str) -> Result<RemoteResponse, reqwest::Error> {
        let resp = self.client.head(url).send().await?;
        Ok(RemoteResponse::empty(resp.status()))
    }

    async fn get(&self, url: &str) -> Result<RemoteResponse, reqwest::Error> {
        let resp = self.client.get(url).send().await?;
        Ok(RemoteResponse {
            status: resp.status(),
            content_length: resp.content_length(),
            body: Box::pin(resp.bytes_stream()),
        })
    }
}

/// Probes `url` with `HEAD` and maps the status. Never reads a body.
pub async fn check_exists_remote<T: Transport>(
    transport: &T,
    url: &str,
    version: &str,
) -> Result<(), RemoteError> {
    tracing::debug!(url, "probing remote archive");
    let resp = transport.head(url).await?;
    if resp.status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(version.to_string()));
    }
    if !resp.status.is_success() {
        return Err(RemoteError::Status(resp.status));
    }
    Ok(())
}

/// Produces the expected hex digest for an archive, given the hash file URL.
pub trait HashFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, RemoteError>> + Send;
}

/// Downloads the hash file and returns its body verbatim.
#[derive(Debug, Clone, Default)]
pub struct HttpHashFetcher<T = ReqwestTransport> {
    transport: T,
}

impl<T: Transport> HttpHashFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> HashFetcher for HttpHashFetcher<T> {
    async fn fetch(&self, url: &str) -> Result<String, RemoteError> {
        let resp = self.transport.get(url).await?;
        if !resp.status.is_success() {
            return Err(RemoteError::UrlStatus {
                url: url.to_string(),
                status: resp.status,
            });
        }

        read_to_string(resp.body)
            .await
            .map_err(|source| RemoteError::Read {
                url: url.to_string(),
                source,
            })
    }
}

impl<F> HashFetcher for F
where
    F: Fn(&str) -> Result<String, RemoteError> + Send + Sync,
{
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, RemoteError>> + Send {
        std::future::ready(self(url))
    }
}

/// Drains a body into memory. Only meant for small resources.
pub async fn read_to_string(body: BodyStream) -> Result<String, reqwest::Error> {
    let mut body = body;
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the downloader and installer tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Head(String),
        Get(String),
    }

    /// Answers every `HEAD` with `head_status` and every `GET` with `body`.
    pub struct FakeTransport {
        pub head_status: StatusCode,
        pub get_status: StatusCode,
        pub body: Vec<u8>,
        /// Declared length; `None` leaves it undeclared.
        pub content_length: Option<u64>,
        calls: Mutex<Vec<Call>>,
        count: AtomicUsize,
    }

    impl FakeTransport {
        pub fn serving(body: &[u8]) -> Self {
            Self {
                head_status: StatusCode::OK,
                get_status: StatusCode::OK,
                body: body.to_vec(),
                content_length: Some(body.len() as u64),
                calls: Mutex::new(Vec::new()),
                count: AtomicUsize::new(0),
            }
        }

        pub fn not_found() -> Self {
            Self {
                head_status: StatusCode::NOT_FOUND,
                get_status: StatusCode::NOT_FOUND,
                ..Self::serving(b"")
            }
        }

        pub fn call_count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Transport for FakeTransport {
        async fn head(&self, url: &str) -> Result<RemoteResponse, reqwest::Error> {
            self.record(Call::Head(url.to_string()));
            Ok(RemoteResponse::empty(self.head_status))
        }

        async fn get(&self, url: &str) -> Result<RemoteResponse, reqwest::Error> {
            self.record(Call::Get(url.to_string()));
            // Split in two so the copy loop sees more than one chunk.
            let mid = self.body.len() / 2;
            let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
                Ok(Bytes::copy_from_slice(&self.body[..mid])),
                Ok(Bytes::copy_from_slice(&self.body[mid..])),
            ];
            Ok(RemoteResponse {
                status: self.get_status,
                content_length: self.content_length,
                body: Box::pin(futures_util::stream::iter(chunks)),
            })
        }
    }
}
