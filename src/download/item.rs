use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::future::Future;

use crate::error::DownloadError;

/// Bytes the caller already has, or will have, for an item.
pub type Preloaded = Shared<BoxFuture<'static, Result<Bytes, DownloadError>>>;

/// One media reference to download.
#[derive(Clone)]
pub struct DownloadItem {
    pub url: String,
    pub desired_name: String,
    pub preloaded: Option<Preloaded>,
}

impl DownloadItem {
    pub fn new(url: impl Into<String>, desired_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            desired_name: desired_name.into(),
            preloaded: None,
        }
    }

    /// Name the item after the last path segment of `url`.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = name_from_url(&url);
        Self::new(url, name)
    }

    /// Use `bytes` instead of fetching `url`.
    pub fn with_preloaded<F>(mut self, bytes: F) -> Self
    where
        F: Future<Output = Result<Bytes, DownloadError>> + Send + 'static,
    {
        self.preloaded = Some(bytes.boxed().shared());
        self
    }
}

impl fmt::Debug for DownloadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadItem")
            .field("url", &self.url)
            .field("desired_name", &self.desired_name)
            .field("preloaded", &self.preloaded.is_some())
            .finish()
    }
}

/// Last non-empty path segment of `url`, without query or fragment.
pub fn name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path.split_once("://").map_or(path, |(_, rest)| {
        rest.split_once('/').map_or("", |(_, path)| path)
    });
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "file".to_string())
}

/// Terminal outcome of a download call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Every item succeeded.
    Success,
    /// Some items failed; the archive holds the rest.
    Partial,
    /// Nothing succeeded; no archive was produced.
    Error,
    Cancelled,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownloadStatus::Success => "success",
            DownloadStatus::Partial => "partial",
            DownloadStatus::Error => "error",
            DownloadStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A URL that could not be fetched, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub url: String,
    pub error: DownloadError,
}

/// Aggregated outcome of a single or bulk download.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub files_processed: u32,
    pub files_successful: u32,
    pub failures: Vec<FailedItem>,
    /// The finished archive; only set for bulk calls that saved one.
    pub zip_bytes: Option<Bytes>,
    pub status: DownloadStatus,
}

impl DownloadResult {
    pub(crate) fn cancelled(files_processed: u32) -> Self {
        Self {
            files_processed,
            files_successful: 0,
            failures: Vec::new(),
            zip_bytes: None,
            status: DownloadStatus::Cancelled,
        }
    }

    /// Size of the archive in bytes, zero when none was produced.
    pub fn archive_size(&self) -> usize {
        self.zip_bytes.as_ref().map_or(0, Bytes::len)
    }
}
