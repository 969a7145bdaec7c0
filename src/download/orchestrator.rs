//! Public entry points: download one item directly, or many into one archive.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::item::{DownloadItem, DownloadResult, DownloadStatus};
use super::names::FilenameDeduplicator;
use super::pool::{PlannedItem, PoolConfig, WorkerPool, job_count};
use super::progress::{ProgressEvent, ProgressPhase, ProgressSink, emit};
use super::retry::BackoffPolicy;
use crate::error::DownloadError;
use crate::io::{DownloadCapability, Fetcher, SaveTarget};

/// Per-call settings for [`Downloader`].
#[derive(Clone)]
pub struct DownloadOptions {
    /// Outstanding fetches, clamped to `1..=8`.
    pub concurrency: usize,
    /// Extra attempts per item after the first.
    pub retries: u32,
    pub request_timeout: Duration,
    /// Bound on a whole single-item download.
    pub single_timeout: Duration,
    pub archive_name: String,
    /// Delay shape between attempts; `max_attempts` is derived from `retries`.
    pub backoff: BackoffPolicy,
    pub progress: Option<ProgressSink>,
    pub cancel: CancellationToken,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 6,
            retries: 0,
            request_timeout: Duration::from_secs(30),
            single_timeout: Duration::from_secs(60),
            archive_name: "media.zip".to_string(),
            backoff: BackoffPolicy::default(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Turns media references into saved files or a saved archive.
///
/// Create one per process and reuse it; the host's download capability is
/// probed once here rather than on every call.
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    saver: Arc<dyn SaveTarget>,
    capability: DownloadCapability,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, saver: Arc<dyn SaveTarget>) -> Self {
        let capability = saver.capability();
        debug!(?capability, "Probed download capability");
        Self {
            fetcher,
            saver,
            capability,
        }
    }

    pub fn capability(&self) -> DownloadCapability {
        self.capability
    }

    /// Download one item straight through the host's direct-download primitive.
    ///
    /// Preloaded bytes are saved as-is instead of being fetched again.
    ///
    /// # Errors
    ///
    /// [`DownloadError::NoCapability`] if the host has no direct download,
    /// [`DownloadError::Timeout`] once `single_timeout` elapses,
    /// [`DownloadError::Cancelled`], or whatever the transfer itself fails with.
    pub async fn download_single(
        &self,
        item: &DownloadItem,
        options: &DownloadOptions,
    ) -> Result<DownloadResult, DownloadError> {
        if self.capability != DownloadCapability::Direct {
            return Err(DownloadError::NoCapability);
        }

        let name = item.desired_name.as_str();
        let progress = options.progress.as_ref();
        emit(progress, ProgressEvent::new(ProgressPhase::Preparing, 0, 1, name));

        let transfer = async {
            match &item.preloaded {
                Some(preloaded) => {
                    let bytes = preloaded.clone().await?;
                    self.saver.save(bytes, name).await
                }
                None => self.saver.save_url(&item.url, name, &options.cancel).await,
            }
        };

        // Dropping the timeout future clears its timer on every path
        let result = tokio::select! {
            _ = options.cancel.cancelled() => Err(DownloadError::Cancelled),
            outcome = tokio::time::timeout(options.single_timeout, transfer) => {
                outcome.unwrap_or(Err(DownloadError::Timeout(options.single_timeout)))
            }
        };

        match result {
            Ok(()) => {
                emit(progress, ProgressEvent::new(ProgressPhase::Complete, 1, 1, name));
                Ok(DownloadResult {
                    files_processed: 1,
                    files_successful: 1,
                    failures: Vec::new(),
                    zip_bytes: None,
                    status: DownloadStatus::Success,
                })
            }
            Err(error) => {
                warn!(url = %item.url, error = %error, "Single download failed");
                emit(progress, ProgressEvent::new(ProgressPhase::Error, 0, 1, name));
                Err(error)
            }
        }
    }

    /// Fetch every item and save the successes as one stored ZIP archive.
    ///
    /// Per-item failures are collected into the result. The call only
    /// errors for archive limit violations or when saving fails;
    /// cancellation yields [`DownloadStatus::Cancelled`] without saving.
    pub async fn download_bulk(
        &self,
        items: &[DownloadItem],
        options: &DownloadOptions,
    ) -> Result<DownloadResult, DownloadError> {
        let total = job_count(items.len())?;
        let archive_name = options.archive_name.as_str();
        let progress = options.progress.as_ref();

        info!(items = total, archive = archive_name, "Planning bulk download");
        emit(progress, ProgressEvent::new(ProgressPhase::Preparing, 0, total, archive_name));
        let jobs = plan(items);

        let config = PoolConfig {
            concurrency: options.concurrency,
            backoff: options.backoff.with_retries(options.retries),
            request_timeout: options.request_timeout,
            cancel: options.cancel.clone(),
            progress: options.progress.clone(),
        };
        let outcome = match WorkerPool::new(self.fetcher.as_ref(), &jobs, config).run().await {
            Ok(outcome) => outcome,
            Err(DownloadError::Cancelled) => {
                info!(archive = archive_name, "Bulk download cancelled, discarding archive");
                return Ok(DownloadResult::cancelled(total));
            }
            Err(error) => return Err(error),
        };

        if outcome.successful == 0 {
            warn!(
                failures = outcome.failures.len(),
                "Every item failed, no archive produced"
            );
            emit(progress, ProgressEvent::new(ProgressPhase::Error, total, total, archive_name));
            return Ok(DownloadResult {
                files_processed: total,
                files_successful: 0,
                failures: outcome.failures,
                zip_bytes: None,
                status: DownloadStatus::Error,
            });
        }

        info!(
            successful = outcome.successful,
            failed = outcome.failures.len(),
            "Finalizing archive"
        );
        let bytes = outcome.archive.finalize()?;

        if options.cancel.is_cancelled() {
            info!(archive = archive_name, "Bulk download cancelled before saving");
            return Ok(DownloadResult::cancelled(total));
        }
        self.saver.save(bytes.clone(), archive_name).await?;
        emit(progress, ProgressEvent::new(ProgressPhase::Complete, total, total, archive_name));
        info!(archive = archive_name, size = bytes.len(), "Archive saved");

        let status = if outcome.failures.is_empty() {
            DownloadStatus::Success
        } else {
            DownloadStatus::Partial
        };
        Ok(DownloadResult {
            files_processed: total,
            files_successful: outcome.successful,
            failures: outcome.failures,
            zip_bytes: Some(bytes),
            status,
        })
    }
}

/// Reserve every archive name up front so names do not depend on fetch order.
fn plan(items: &[DownloadItem]) -> Vec<PlannedItem> {
    let mut names = FilenameDeduplicator::new();
    items
        .iter()
        .map(|item| PlannedItem {
            file_name: names.reserve(&item.desired_name),
            item: item.clone(),
        })
        .collect()
}
