use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{FetchOptions, FetchResponse, Fetcher};
use crate::error::DownloadError;

/// Fetch adapter backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
    transferred_bytes: AtomicU64,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    ///
    /// `connect_timeout` bounds connection setup only; the whole-request
    /// timeout comes from each call's [`FetchOptions`].
    pub fn new(connect_timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Get total body bytes received from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    async fn get(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;

        self.transferred_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        debug!(url, status, len = bytes.len(), "Fetched");

        Ok(FetchResponse { status, bytes })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchResponse, DownloadError> {
        if options.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        tokio::select! {
            _ = options.cancel.cancelled() => Err(DownloadError::Cancelled),
            result = tokio::time::timeout(options.timeout, self.get(url)) => match result {
                Ok(Ok(resp)) => Ok(resp),
                Ok(Err(DownloadError::Timeout(_))) | Err(_) => {
                    Err(DownloadError::Timeout(options.timeout))
                }
                Ok(Err(e)) => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let options = FetchOptions {
            timeout: Duration::from_secs(1),
            cancel,
        };
        let result = fetcher.fetch("http://127.0.0.1:9/never", &options).await;
        assert_eq!(result.unwrap_err(), DownloadError::Cancelled);
        assert_eq!(fetcher.transferred_bytes(), 0);
    }
}
