use crate::error::ScrapeError;
use crate::site::{Query, SiteConfig};
use crate::utils::http::Fetch;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use url::Url;

fn card_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/[^/]+-Expansion/[^/]+-Card-[^#]+").expect("valid card link pattern")
    })
}

fn anchors(document: &Html) -> Vec<&str> {
    let selector = Selector::parse("a[href]").expect("valid selector");
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .collect()
}

/// Build the URL for one page of search results.
pub fn search_page_url(site: &SiteConfig, query: &Query, page: u32) -> Result<Url, ScrapeError> {
    let mut url = site.search_url()?;
    url.query_pairs_mut()
        .append_pair(&site.query_param, &query.criteria())
        .append_pair(&site.page_param, &page.to_string());
    Ok(url)
}

/// Extract card detail links from a search results page.
///
/// Only hrefs shaped like `/<set>-Expansion/<card>-Card-<rest>` are kept. The
/// fragment is dropped and the path resolved against `base`.
pub fn parse_card_links(html: &str, base: &Url) -> BTreeSet<String> {
    let document = Html::parse_document(html);

    anchors(&document)
        .into_iter()
        .filter(|href| card_link_pattern().is_match(href))
        .filter_map(|href| {
            let clean = href.split('#').next().unwrap_or(href);
            match base.join(clean) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    tracing::debug!(href = clean, error = %e, "Skipping unresolvable card link");
                    None
                }
            }
        })
        .collect()
}

/// Highest page number referenced by any `?p=N` / `&p=N` link, or 1 if there are none.
pub fn parse_total_pages(html: &str, page_param: &str) -> u32 {
    let pattern = Regex::new(&format!(r"[?&]{}=(\d+)", regex::escape(page_param)))
        .expect("escaped page pattern is valid");
    let document = Html::parse_document(html);

    anchors(&document)
        .into_iter()
        .filter_map(|href| pattern.captures(href))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .fold(1, u32::max)
}

/// Card detail URLs on one page of results. Fetch failures yield an empty set.
pub async fn list_card_links<F>(
    fetcher: &F,
    site: &SiteConfig,
    query: &Query,
    page: u32,
) -> BTreeSet<String>
where
    F: Fetch + ?Sized,
{
    let url = match search_page_url(site, query, page) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build search URL");
            return BTreeSet::new();
        }
    };

    match fetcher.get_page(&url).await {
        Ok(html) => {
            let links = parse_card_links(&html, &site.base_url);
            tracing::debug!(page, links = links.len(), "Parsed search page");
            links
        }
        Err(e) => {
            tracing::warn!(page, error = %e, "✗ Network error during search");
            BTreeSet::new()
        }
    }
}

/// Number of result pages for `query`, or 0 if the first page could not be fetched.
pub async fn total_pages<F>(fetcher: &F, site: &SiteConfig, query: &Query) -> u32
where
    F: Fetch + ?Sized,
{
    let url = match search_page_url(site, query, 1) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build search URL");
            return 0;
        }
    };

    match fetcher.get_page(&url).await {
        Ok(html) => parse_total_pages(&html, &site.page_param),
        Err(e) => {
            tracing::warn!(error = %e, "✗ Network error during pagination check");
            0
        }
    }
}
