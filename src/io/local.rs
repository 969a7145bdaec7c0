use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DownloadCapability, FetchOptions, Fetcher, SaveTarget};
use crate::error::DownloadError;

/// Saves finished files into a local directory
pub struct DiskSaver {
    dir: PathBuf,
    /// Present when the saver may fetch URLs itself.
    direct: Option<(Arc<dyn Fetcher>, Duration)>,
}

impl DiskSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            direct: None,
        }
    }

    /// Allow [`SaveTarget::save_url`] by fetching through `fetcher`.
    pub fn with_direct_downloads(mut self, fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        self.direct = Some((fetcher, timeout));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve `file_name` inside the output directory, keeping only its last component.
    fn target_path(&self, file_name: &str) -> Result<PathBuf, DownloadError> {
        match Path::new(file_name).file_name() {
            Some(name) => Ok(self.dir.join(name)),
            None => Err(save_error(file_name, "not a file name")),
        }
    }
}

fn save_error(file_name: &str, reason: impl ToString) -> DownloadError {
    DownloadError::Save {
        filename: file_name.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl SaveTarget for DiskSaver {
    async fn save(&self, data: Bytes, file_name: &str) -> Result<(), DownloadError> {
        let path = self.target_path(file_name)?;

        // Create the output directory if needed
        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| save_error(file_name, e))?;
        }

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| save_error(file_name, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| save_error(file_name, e))?;
        file.flush().await.map_err(|e| save_error(file_name, e))?;

        debug!(path = %path.display(), len = data.len(), "Saved file");
        Ok(())
    }

    fn capability(&self) -> DownloadCapability {
        if self.direct.is_some() {
            DownloadCapability::Direct
        } else {
            DownloadCapability::Unavailable
        }
    }

    async fn save_url(
        &self,
        url: &str,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let Some((fetcher, timeout)) = &self.direct else {
            return Err(DownloadError::NoCapability);
        };

        let options = FetchOptions {
            timeout: *timeout,
            cancel: cancel.clone(),
        };
        let bytes = fetcher.fetch(url, &options).await?.into_bytes()?;
        self.save(bytes, file_name).await
    }
}
