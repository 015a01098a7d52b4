use crate::error::ScrapeError;
use regex::Regex;
use scraper::Selector;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

pub mod detail;
pub mod search;

pub const DEFAULT_BASE_URL: &str = "https://www.pokellector.com";
pub const DEFAULT_IMAGE_HOST: &str = "den-cards.pokellector.com";
pub const DEFAULT_CARD_SELECTOR: &str = "div.card";

/// Where the catalog lives and how its markup is shaped.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: Url,
    pub search_path: String,
    pub query_param: String,
    pub page_param: String,
    /// Substring an image URL must contain to count as a card image.
    pub image_host: String,
    card_selector: Selector,
    card_selector_source: String,
}

impl SiteConfig {
    pub fn new(base_url: &str, image_host: &str, card_selector: &str) -> Result<Self, ScrapeError> {
        let base_url = Url::parse(base_url).map_err(|source| ScrapeError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let selector = Selector::parse(card_selector)
            .map_err(|_| ScrapeError::InvalidSelector(card_selector.to_string()))?;

        Ok(Self {
            base_url,
            search_path: "/search".to_string(),
            query_param: "criteria".to_string(),
            page_param: "p".to_string(),
            image_host: image_host.to_string(),
            card_selector: selector,
            card_selector_source: card_selector.to_string(),
        })
    }

    pub fn search_url(&self) -> Result<Url, ScrapeError> {
        self.base_url
            .join(&self.search_path)
            .map_err(|source| ScrapeError::InvalidUrl {
                url: self.search_path.clone(),
                source,
            })
    }

    /// Container that holds the main card image on a detail page.
    pub fn card_selector(&self) -> &Selector {
        &self.card_selector
    }

    pub fn card_selector_source(&self) -> &str {
        &self.card_selector_source
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_IMAGE_HOST, DEFAULT_CARD_SELECTOR)
            .expect("built-in site defaults are valid")
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9\- '.]+$").expect("valid name pattern"))
}

/// A character name that is safe to send as a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: &str) -> Result<Self, ScrapeError> {
        let name = raw.trim();
        if !name_pattern().is_match(name) {
            return Err(ScrapeError::InvalidName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The form sent to the search endpoint.
    pub fn criteria(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
