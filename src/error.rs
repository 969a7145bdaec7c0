//! Error taxonomy shared by the archive encoder, the fetch pool and the
//! orchestrator.

use std::time::Duration;

use thiserror::Error;

/// Which ZIP32 bound an `add_file`/`finalize` call ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArchiveLimit {
    #[error("entry count would reach {max}")]
    TooManyEntries { max: usize },

    #[error("entry of {size} bytes does not fit a 32-bit size field")]
    EntryTooLarge { size: u64 },

    #[error("archive offset {offset} does not fit a 32-bit offset field")]
    ArchiveTooLarge { offset: u64 },

    #[error("filename of {len} bytes does not fit a 16-bit length field")]
    FileNameTooLong { len: usize },
}

/// Errors produced while fetching, archiving and saving media.
///
/// The enum is `Clone` so a single preloaded byte future can be shared
/// between the caller and the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP request failed with status: {0}")]
    Http(u16),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("download cancelled")]
    Cancelled,

    #[error("archive limit exceeded: {0}")]
    EncoderLimitExceeded(#[from] ArchiveLimit),

    #[error("host has no direct download capability")]
    NoCapability,

    #[error("failed to save {filename}: {reason}")]
    Save { filename: String, reason: String },
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors other than 408/429 are final; cancellation and
    /// encoder/host errors never retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Network(_) | DownloadError::Timeout(_) => true,
            DownloadError::Http(status) => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest does not expose the configured timeout on the error
        if err.is_timeout() {
            DownloadError::Timeout(Duration::ZERO)
        } else if let Some(status) = err.status() {
            DownloadError::Http(status.as_u16())
        } else {
            DownloadError::Network(err.to_string())
        }
    }
}
