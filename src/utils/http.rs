use crate::error::ScrapeError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

pub const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Images are written to disk in blocks of this size.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Get standard user agent string
pub fn get_user_agent() -> &'static str {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36"
}

/// Everything the scraper needs from the network.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET a page and return its body as text.
    async fn get_page(&self, url: &Url) -> Result<String, ScrapeError>;

    /// Stream `url` into `destination`, replacing whatever is there.
    /// Returns the number of bytes written.
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, ScrapeError>;
}

/// `Fetch` over a shared reqwest client with a fixed user agent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    page_timeout: Duration,
    download_timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .build()?;

        Ok(Self::with_client(client))
    }

    fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            page_timeout: PAGE_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
        }
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, ScrapeError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| ScrapeError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_page(&self, url: &Url) -> Result<String, ScrapeError> {
        let response = self.send(url.as_str(), self.page_timeout).await?;
        response.text().await.map_err(|source| ScrapeError::Request {
            url: url.to_string(),
            source,
        })
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<u64, ScrapeError> {
        let mut response = self.send(url, self.download_timeout).await?;

        let file = fs::File::create(destination).await?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut written = 0u64;

        let streamed: Result<(), ScrapeError> = async {
            while let Some(chunk) = response.chunk().await.map_err(|source| {
                ScrapeError::Request {
                    url: url.to_string(),
                    source,
                }
            })? {
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            writer.flush().await?;
            Ok::<(), ScrapeError>(())
        }
        .await;

        drop(writer);

        if let Err(e) = streamed {
            // A truncated file would otherwise be taken as already downloaded next run.
            if let Err(cleanup_err) = fs::remove_file(destination).await {
                tracing::warn!(
                    path = %destination.display(),
                    error = %cleanup_err,
                    "Failed to cleanup partial download"
                );
            }
            return Err(e);
        }

        Ok(written)
    }
}
