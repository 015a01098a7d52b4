//! In-memory `Fetch` used by the unit tests.

use crate::error::ScrapeError;
use crate::utils::http::Fetch;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use url::Url;

/// Serves canned pages and images; anything else is a 404.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    images: HashMap<String, Vec<u8>>,
    page_requests: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn with_image(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn page_requests(&self) -> Vec<String> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn not_found(url: &str) -> ScrapeError {
        ScrapeError::Status {
            url: url.to_string(),
            status: reqwest::StatusCode::NOT_FOUND,
        }
    }
}

#[async_trait]
impl Fetch for FakeFetcher {
    async fn get_page(&self, url: &Url) -> Result<String, ScrapeError> {
        self.page_requests.lock().unwrap().push(url.to_string());
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Self::not_found(url.as_str()))
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<u64, ScrapeError> {
        self.downloads.lock().unwrap().push(url.to_string());
        let bytes = self.images.get(url).ok_or_else(|| Self::not_found(url))?;
        tokio::fs::write(destination, bytes).await?;
        Ok(bytes.len() as u64)
    }
}
