//! Fetching media and bundling it into archives.
//!
//! A bulk call flows through these pieces in order:
//!
//! - [`names`]: every desired filename is reserved before any fetch starts
//! - [`pool`]: a fixed number of workers fetch items through [`retry`]
//! - [`orchestrator`]: finalizes the archive and hands it to the host
//!
//! A bulk call moves through Planning, Running and Finalizing, and ends
//! Saved, Cancelled or with every item failed.

mod item;
pub mod names;
pub mod orchestrator;
pub mod pool;
pub mod progress;
pub mod retry;

pub use item::{DownloadItem, DownloadResult, DownloadStatus, FailedItem, Preloaded, name_from_url};
pub use names::FilenameDeduplicator;
pub use orchestrator::{DownloadOptions, Downloader};
pub use pool::{MAX_CONCURRENCY, clamp_concurrency};
pub use progress::{ProgressEvent, ProgressPhase, ProgressSink};
pub use retry::{BackoffPolicy, RetryFailure, with_retry, with_retry_if};
