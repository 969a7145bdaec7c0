//! Boundaries to the host: how bytes are fetched and where finished files go.

mod http;
mod local;

pub use http::HttpFetcher;
pub use local::DiskSaver;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::DownloadError;

/// Per-request knobs handed to a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

/// A completed HTTP exchange, successful or not.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub bytes: Bytes,
}

impl FetchResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx status into [`DownloadError::Http`].
    pub fn into_bytes(self) -> Result<Bytes, DownloadError> {
        if self.ok() {
            Ok(self.bytes)
        } else {
            Err(DownloadError::Http(self.status))
        }
    }
}

/// Trait for retrieving the full body of a remote resource
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, giving up after `options.timeout` or once cancelled.
    async fn fetch(&self, url: &str, options: &FetchOptions)
    -> Result<FetchResponse, DownloadError>;
}

/// Whether the host can download a URL straight to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadCapability {
    Direct,
    Unavailable,
}

/// Trait for handing finished bytes to the user
#[async_trait]
pub trait SaveTarget: Send + Sync {
    /// Persist `data` under `file_name`.
    async fn save(&self, data: Bytes, file_name: &str) -> Result<(), DownloadError>;

    /// Report the direct-download primitive this host offers.
    fn capability(&self) -> DownloadCapability {
        DownloadCapability::Unavailable
    }

    /// Download `url` straight to `file_name` without the caller buffering it.
    async fn save_url(
        &self,
        _url: &str,
        _file_name: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        Err(DownloadError::NoCapability)
    }
}
