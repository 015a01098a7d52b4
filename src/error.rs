use std::io;
use thiserror::Error;

/// Failures surfaced by the scraper. None of these abort a run on their own;
/// callers log them and move on to the next page or card.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for URL: {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("no card image found on {url}")]
    NotFound { url: String },

    #[error("invalid name '{0}': only letters, digits, spaces, hyphens, apostrophes and periods are allowed")]
    InvalidName(String),

    #[error("invalid card selector '{0}'")]
    InvalidSelector(String),

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ScrapeError {
    /// Transport errors and non-success statuses.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Status { .. })
    }
}
