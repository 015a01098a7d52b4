use crate::error::ScrapeError;
use crate::site::detail::extract_image_url;
use crate::site::search::{list_card_links, total_pages};
use crate::site::{Query, SiteConfig};
use crate::utils::files::{destination_path, ensure_directory, image_file_name};
use crate::utils::http::Fetch;
use crate::utils::throttle::Throttle;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Per-run settings that are not about the catalog itself.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    /// Cards processed concurrently. 1 means strictly one after another.
    pub threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("cards"),
            threads: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CardOutcome {
    Downloaded { file: String },
    AlreadyPresent { file: String },
    DownloadFailed { file: String },
    NoImage,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CardReport {
    pub url: String,
    #[serde(flatten)]
    pub outcome: CardOutcome,
}

/// What a run did, card by card, in sorted URL order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub query: String,
    pub total_pages: u32,
    pub cards: Vec<CardReport>,
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
    pub missing: usize,
}

impl RunReport {
    fn new(query: &Query, total_pages: u32, cards: Vec<CardReport>) -> Self {
        let mut report = Self {
            query: query.to_string(),
            total_pages,
            ..Default::default()
        };
        for card in &cards {
            match card.outcome {
                CardOutcome::Downloaded { .. } => report.downloaded += 1,
                CardOutcome::AlreadyPresent { .. } => report.already_present += 1,
                CardOutcome::DownloadFailed { .. } | CardOutcome::Failed { .. } => {
                    report.failed += 1
                }
                CardOutcome::NoImage => report.missing += 1,
            }
        }
        report.cards = cards;
        report
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Collect every card URL across all result pages, deduplicated and sorted.
pub async fn collect_card_urls<F, T>(
    fetcher: &F,
    throttle: &T,
    site: &SiteConfig,
    query: &Query,
    pages: u32,
) -> BTreeSet<String>
where
    F: Fetch + ?Sized,
    T: Throttle + ?Sized,
{
    let mut all_card_urls = BTreeSet::new();
    for page in 1..=pages {
        tracing::info!("Scraping page {}/{}...", page, pages);
        all_card_urls.extend(list_card_links(fetcher, site, query, page).await);
        throttle.after_page().await;
    }
    all_card_urls
}

async fn process_card<F>(
    fetcher: &F,
    site: &SiteConfig,
    output_dir: &Path,
    claimed: &Mutex<HashSet<String>>,
    card_url: &str,
) -> CardOutcome
where
    F: Fetch + ?Sized,
{
    let image_url = match extract_image_url(fetcher, site, card_url).await {
        Ok(url) => url,
        Err(ScrapeError::NotFound { .. }) => {
            tracing::warn!(card = card_url, "✗ No image found");
            return CardOutcome::NoImage;
        }
        Err(e) if e.is_network() => {
            tracing::warn!(card = card_url, error = %e, "✗ Network error fetching card page");
            return CardOutcome::Failed {
                reason: e.to_string(),
            };
        }
        Err(e) => {
            tracing::warn!(card = card_url, error = %e, "✗ Error");
            return CardOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    let Some(file) = image_file_name(&image_url) else {
        tracing::warn!(card = card_url, image = %image_url, "✗ Image URL has no file name");
        return CardOutcome::Failed {
            reason: format!("image URL has no file name: {image_url}"),
        };
    };

    let output_path = destination_path(output_dir, &file);
    let newly_claimed = claimed
        .lock()
        .map(|mut names| names.insert(file.clone()))
        .unwrap_or(false);
    if !newly_claimed || output_path.exists() {
        tracing::info!("✓ Already downloaded: {}", file);
        return CardOutcome::AlreadyPresent { file };
    }

    match fetcher.download(&image_url, &output_path).await {
        Ok(bytes) => {
            tracing::info!(bytes, "✓ Downloaded: {}", file);
            CardOutcome::Downloaded { file }
        }
        Err(e) => {
            tracing::warn!(error = %e, "✗ Failed to download: {}", file);
            // Nothing landed on disk, so a later card with the same image may try again.
            if let Ok(mut names) = claimed.lock() {
                names.remove(&file);
            }
            CardOutcome::DownloadFailed { file }
        }
    }
}

/// Search for `query`, then fetch every card image that is not on disk yet.
///
/// Individual page and card failures are logged and recorded in the report;
/// only failing to create the output directory aborts the run.
pub async fn run<F, T>(
    fetcher: &F,
    throttle: &T,
    site: &SiteConfig,
    query: &Query,
    config: &RunConfig,
) -> Result<RunReport, ScrapeError>
where
    F: Fetch + ?Sized,
    T: Throttle + ?Sized,
{
    ensure_directory(&config.output_dir)?;

    tracing::info!("Searching for {} cards...", query);
    let pages = total_pages(fetcher, site, query).await;
    if pages == 0 {
        tracing::info!("No results found for '{}'.", query);
        return Ok(RunReport::new(query, 0, Vec::new()));
    }
    tracing::info!("Found {} page(s) of results", pages);

    let card_urls = collect_card_urls(fetcher, throttle, site, query, pages).await;
    let total_cards = card_urls.len();
    tracing::info!("Found {} unique cards", total_cards);

    let pb = progress_bar(total_cards);
    let claimed = Mutex::new(HashSet::new());

    // `buffered` yields in input order, so the report stays sorted by URL.
    let cards: Vec<CardReport> = stream::iter(card_urls.into_iter().enumerate())
        .map(|(idx, card_url)| {
            let pb = &pb;
            let claimed = &claimed;
            async move {
                tracing::info!("Processing card {}/{}: {}", idx + 1, total_cards, card_url);
                let outcome =
                    process_card(fetcher, site, &config.output_dir, claimed, &card_url).await;
                throttle.after_card().await;
                pb.inc(1);
                CardReport {
                    url: card_url,
                    outcome,
                }
            }
        })
        .buffered(config.threads.max(1))
        .collect()
        .await;

    pb.finish_and_clear();

    Ok(RunReport::new(query, pages, cards))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use crate::utils::throttle::NoDelay;

    const SITE: &str = "https://www.pokellector.com";
    const IMAGES: &str = "https://den-cards.pokellector.com";

    fn card_url(n: u32) -> String {
        format!("{SITE}/Base-Set-Expansion/Pikachu-Card-{n}")
    }

    fn card_link(n: u32) -> String {
        format!(r#"<a href="/Base-Set-Expansion/Pikachu-Card-{n}">card {n}</a>"#)
    }

    fn detail_page(n: u32) -> String {
        format!(r#"<div class="card"><img src="{IMAGES}/119/Pikachu.{n}.png"></div>"#)
    }

    /// Two result pages: cards 1-3 on the first, 3-4 on the second.
    fn pikachu_catalog() -> FakeFetcher {
        let page1 = format!(
            r#"{}{}{}<a href="/search?criteria=pikachu&p=2">2</a>"#,
            card_link(1),
            card_link(2),
            card_link(3)
        );
        let page2 = format!(
            r#"{}{}<a href="/search?criteria=pikachu&p=1">1</a>"#,
            card_link(3),
            card_link(4)
        );

        let mut fetcher = FakeFetcher::default()
            .with_page(&format!("{SITE}/search?criteria=pikachu&p=1"), page1)
            .with_page(&format!("{SITE}/search?criteria=pikachu&p=2"), page2);
        for n in 1..=4 {
            fetcher = fetcher
                .with_page(&card_url(n), detail_page(n))
                .with_image(&format!("{IMAGES}/119/Pikachu.{n}.png"), b"\x89PNG fake");
        }
        fetcher
    }

    fn config(dir: &Path, threads: usize) -> RunConfig {
        RunConfig {
            output_dir: dir.to_path_buf(),
            threads,
        }
    }

    #[tokio::test]
    async fn downloads_every_unique_card_across_pages() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cards");
        let fetcher = pikachu_catalog();
        let query = Query::parse("pikachu").unwrap();

        let report = run(&fetcher, &NoDelay, &SiteConfig::default(), &query, &config(&out, 1))
            .await
            .unwrap();

        assert_eq!(report.total_pages, 2);
        assert_eq!(report.cards.len(), 4);
        assert_eq!(report.downloaded, 4);
        assert_eq!(report.failed, 0);

        let urls: Vec<_> = report.cards.iter().map(|c| c.url.clone()).collect();
        assert_eq!(urls, (1..=4).map(card_url).collect::<Vec<_>>());

        for n in 1..=4 {
            assert!(out.join(format!("Pikachu.{n}.png")).is_file());
        }
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn second_run_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = pikachu_catalog();
        let site = SiteConfig::default();
        let query = Query::parse("pikachu").unwrap();
        let config = config(dir.path(), 1);

        let first = run(&fetcher, &NoDelay, &site, &query, &config).await.unwrap();
        assert_eq!(first.downloaded, 4);
        let downloads_after_first = fetcher.downloads().len();

        let second = run(&fetcher, &NoDelay, &site, &query, &config).await.unwrap();
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.already_present, 4);
        assert_eq!(fetcher.downloads().len(), downloads_after_first);
    }

    #[tokio::test]
    async fn concurrent_run_keeps_sorted_report() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = pikachu_catalog();
        let query = Query::parse("pikachu").unwrap();

        let report = run(&fetcher, &NoDelay, &SiteConfig::default(), &query, &config(dir.path(), 4))
            .await
            .unwrap();

        assert_eq!(report.downloaded, 4);
        let urls: Vec<_> = report.cards.iter().map(|c| c.url.clone()).collect();
        assert_eq!(urls, (1..=4).map(card_url).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn unreachable_search_reports_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::default();
        let query = Query::parse("missingno").unwrap();

        let report = run(&fetcher, &NoDelay, &SiteConfig::default(), &query, &config(dir.path(), 1))
            .await
            .unwrap();

        assert_eq!(report.total_pages, 0);
        assert!(report.cards.is_empty());
        assert_eq!(fetcher.page_requests().len(), 1);
    }

    #[tokio::test]
    async fn card_failures_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let search = format!("{}{}{}", card_link(1), card_link(2), card_link(3));
        let fetcher = FakeFetcher::default()
            .with_page(&format!("{SITE}/search?criteria=pikachu&p=1"), search)
            // Card 1 has no image on the expected host.
            .with_page(&card_url(1), r#"<img src="https://ads.example/x.png">"#)
            // Card 2's detail page is missing entirely.
            // Card 3's image 404s.
            .with_page(&card_url(3), detail_page(3));
        let query = Query::parse("pikachu").unwrap();

        let report = run(&fetcher, &NoDelay, &SiteConfig::default(), &query, &config(dir.path(), 1))
            .await
            .unwrap();

        let outcomes: Vec<_> = report.cards.iter().map(|c| c.outcome.clone()).collect();
        assert_eq!(outcomes[0], CardOutcome::NoImage);
        assert!(matches!(outcomes[1], CardOutcome::Failed { .. }));
        assert_eq!(
            outcomes[2],
            CardOutcome::DownloadFailed {
                file: "Pikachu.3.png".into()
            }
        );
        assert_eq!(report.downloaded, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.missing, 1);
    }

    #[tokio::test]
    async fn cards_sharing_an_image_download_it_once() {
        let dir = tempfile::tempdir().unwrap();
        let search = format!("{}{}", card_link(1), card_link(2));
        let shared = detail_page(9);
        let fetcher = FakeFetcher::default()
            .with_page(&format!("{SITE}/search?criteria=pikachu&p=1"), search)
            .with_page(&card_url(1), shared.clone())
            .with_page(&card_url(2), shared)
            .with_image(&format!("{IMAGES}/119/Pikachu.9.png"), b"png");
        let query = Query::parse("pikachu").unwrap();

        let report = run(&fetcher, &NoDelay, &SiteConfig::default(), &query, &config(dir.path(), 2))
            .await
            .unwrap();

        assert_eq!(report.downloaded, 1);
        assert_eq!(report.already_present, 1);
        assert_eq!(fetcher.downloads().len(), 1);
    }

    #[tokio::test]
    async fn failed_download_does_not_mark_shared_image_present() {
        let dir = tempfile::tempdir().unwrap();
        let search = format!("{}{}", card_link(1), card_link(2));
        let shared = detail_page(9);
        // The shared image itself is never served.
        let fetcher = FakeFetcher::default()
            .with_page(&format!("{SITE}/search?criteria=pikachu&p=1"), search)
            .with_page(&card_url(1), shared.clone())
            .with_page(&card_url(2), shared);
        let query = Query::parse("pikachu").unwrap();

        let report = run(&fetcher, &NoDelay, &SiteConfig::default(), &query, &config(dir.path(), 1))
            .await
            .unwrap();

        let failed = CardOutcome::DownloadFailed {
            file: "Pikachu.9.png".into(),
        };
        assert_eq!(report.cards[0].outcome, failed);
        assert_eq!(report.cards[1].outcome, failed);
        assert_eq!(report.already_present, 0);
        assert_eq!(fetcher.downloads().len(), 2);
        assert!(!dir.path().join("Pikachu.9.png").exists());
    }

    #[test]
    fn report_serializes_outcomes_inline() {
        let query = Query::parse("pikachu").unwrap();
        let report = RunReport::new(
            &query,
            1,
            vec![CardReport {
                url: card_url(1),
                outcome: CardOutcome::Downloaded {
                    file: "Pikachu.1.png".into(),
                },
            }],
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["downloaded"], 1);
        assert_eq!(json["cards"][0]["status"], "downloaded");
        assert_eq!(json["cards"][0]["file"], "Pikachu.1.png");
    }
}
