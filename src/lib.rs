//! # mediazip
//!
//! Download a list of remote media files concurrently and bundle them into a
//! single ZIP archive, without a compression or archive library.
//!
//! The library is built around three pieces:
//!
//! - a hand-written ZIP32 encoder that stores entries with their CRC-32
//! - a bounded worker pool with retry, backoff and cooperative cancellation
//! - an orchestrator that reports partial failures without corrupting the
//!   archive built from the items that did succeed
//!
//! Network access and saving are boundaries: implement [`Fetcher`] and
//! [`SaveTarget`], or use [`HttpFetcher`] and [`DiskSaver`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mediazip::{DiskSaver, DownloadItem, DownloadOptions, Downloader, HttpFetcher};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(10))?);
//!     let downloader = Downloader::new(fetcher, Arc::new(DiskSaver::new("downloads")));
//!
//!     let items = vec![
//!         DownloadItem::from_url("https://example.com/photos/cat.jpg"),
//!         DownloadItem::from_url("https://example.com/photos/dog.jpg"),
//!     ];
//!     let result = downloader.download_bulk(&items, &DownloadOptions::default()).await?;
//!     println!("{}: {} of {} files", result.status, result.files_successful, result.files_processed);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod download;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use download::{
    BackoffPolicy, DownloadItem, DownloadOptions, DownloadResult, DownloadStatus, Downloader,
    FailedItem, ProgressEvent, ProgressPhase, ProgressSink,
};
pub use error::{ArchiveLimit, DownloadError};
pub use io::{DiskSaver, DownloadCapability, FetchOptions, FetchResponse, Fetcher, HttpFetcher, SaveTarget};
pub use zip::{ZipArchiveWriter, ZipFileEntry, ZipReader};
