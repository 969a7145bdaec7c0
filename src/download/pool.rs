//! Bounded-concurrency fetch pool feeding a [`ZipArchiveWriter`].
//!
//! Workers are plain futures joined inside the caller's task, so at most
//! `concurrency` fetches are outstanding at any time. They share a single
//! cursor over the planned jobs: each worker claims the next unclaimed index
//! until the list is exhausted. Entries therefore land in the archive in
//! completion order, while their names were fixed before any fetch began.

use bytes::Bytes;
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::item::{DownloadItem, FailedItem};
use super::progress::{ProgressEvent, ProgressPhase, ProgressSink, emit};
use super::retry::{BackoffPolicy, with_retry};
use crate::error::{ArchiveLimit, DownloadError};
use crate::io::{FetchOptions, Fetcher};
use crate::zip::{MAX_ENTRIES, ZipArchiveWriter};

/// Upper bound on simultaneously outstanding fetches.
pub const MAX_CONCURRENCY: usize = 8;

/// An item paired with the archive name reserved for it.
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub item: DownloadItem,
    pub file_name: String,
}

/// Knobs for one pool run.
#[derive(Clone)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub backoff: BackoffPolicy,
    pub request_timeout: Duration,
    pub cancel: CancellationToken,
    pub progress: Option<ProgressSink>,
}

/// What a pool run that was not aborted produced.
#[derive(Debug)]
pub struct PoolOutcome {
    pub archive: ZipArchiveWriter,
    pub successful: u32,
    pub failures: Vec<FailedItem>,
}

/// Clamp a requested concurrency into `1..=MAX_CONCURRENCY`.
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_CONCURRENCY)
}

/// Number of jobs as reported in progress and results.
pub(crate) fn job_count(len: usize) -> Result<u32, DownloadError> {
    u32::try_from(len).map_err(|_| ArchiveLimit::TooManyEntries { max: MAX_ENTRIES }.into())
}

pub struct WorkerPool<'a> {
    fetcher: &'a dyn Fetcher,
    jobs: &'a [PlannedItem],
    config: PoolConfig,
    cursor: AtomicUsize,
    archive: Mutex<ZipArchiveWriter>,
    successful: AtomicU32,
    /// Failures tagged with their job index.
    failures: Mutex<Vec<(usize, FailedItem)>>,
}

impl<'a> WorkerPool<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, jobs: &'a [PlannedItem], config: PoolConfig) -> Self {
        Self {
            fetcher,
            jobs,
            config,
            cursor: AtomicUsize::new(0),
            archive: Mutex::new(ZipArchiveWriter::new()),
            successful: AtomicU32::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Drive every job to completion.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Cancelled`] once the token fires, or
    /// [`DownloadError::EncoderLimitExceeded`] when the archive is full. In
    /// both cases the partially built archive is dropped.
    pub async fn run(self) -> Result<PoolOutcome, DownloadError> {
        let workers = clamp_concurrency(self.config.concurrency);
        debug!(workers, jobs = self.jobs.len(), "Starting worker pool");

        try_join_all((0..workers).map(|id| self.worker(id))).await?;

        let mut failures = self.failures.into_inner();
        // Report failures in request order regardless of completion order
        failures.sort_by_key(|(index, _)| *index);
        let failures = failures.into_iter().map(|(_, failure)| failure).collect();

        Ok(PoolOutcome {
            archive: self.archive.into_inner(),
            successful: self.successful.into_inner(),
            failures,
        })
    }

    async fn worker(&self, id: usize) -> Result<(), DownloadError> {
        let total = job_count(self.jobs.len())?;

        loop {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(job) = self.jobs.get(index) else {
                debug!(worker = id, "No jobs left");
                return Ok(());
            };

            if self.config.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            emit(
                self.config.progress.as_ref(),
                ProgressEvent::new(
                    ProgressPhase::Downloading,
                    index as u32 + 1,
                    total,
                    job.file_name.as_str(),
                ),
            );

            let fetched = self.obtain(job).await;

            // Results that land after cancellation are discarded
            if self.config.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            match fetched {
                Ok(bytes) => {
                    self.archive.lock().add_file(&job.file_name, bytes)?;
                    self.successful.fetch_add(1, Ordering::SeqCst);
                    debug!(worker = id, file_name = %job.file_name, "Archived");
                }
                Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
                Err(error) => {
                    warn!(worker = id, url = %job.item.url, error = %error, "Download failed");
                    self.failures.lock().push((
                        index,
                        FailedItem {
                            url: job.item.url.clone(),
                            error,
                        },
                    ));
                }
            }
        }
    }

    /// Preloaded bytes if the caller supplied them, otherwise fetch with retries.
    async fn obtain(&self, job: &PlannedItem) -> Result<Bytes, DownloadError> {
        if let Some(preloaded) = &job.item.preloaded {
            return tokio::select! {
                _ = self.config.cancel.cancelled() => Err(DownloadError::Cancelled),
                bytes = preloaded.clone() => bytes,
            };
        }

        let options = FetchOptions {
            timeout: self.config.request_timeout,
            cancel: self.config.cancel.clone(),
        };
        let url = job.item.url.as_str();
        let options = &options;

        with_retry(
            move || async move { self.fetcher.fetch(url, options).await?.into_bytes() },
            &self.config.backoff,
            &self.config.cancel,
        )
        .await
        .map_err(|failure| failure.error)
    }
}
