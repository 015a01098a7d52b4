use crate::error::ScrapeError;
use crate::site::SiteConfig;
use crate::utils::http::Fetch;
use scraper::{Html, Selector};
use url::Url;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Ways of locating the card image on a detail page, most trustworthy first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// First `<img>` inside the card display container.
    CardContainer,
    /// `og:image` meta tag, then `itemprop="image"`.
    MetaTags,
    /// Any `<img>` on the page, in document order.
    PageScan,
}

impl Tier {
    pub const ORDER: [Tier; 3] = [Tier::CardContainer, Tier::MetaTags, Tier::PageScan];

    pub fn extract(self, document: &Html, site: &SiteConfig) -> Option<String> {
        match self {
            Tier::CardContainer => from_card_container(document, site),
            Tier::MetaTags => from_meta_tags(document, site),
            Tier::PageScan => from_page_scan(document, site),
        }
    }
}

fn has_image_extension(src: &str) -> bool {
    src.rsplit('.')
        .next()
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Hosted on the card image domain and named like an image file.
pub fn is_card_image(src: &str, image_host: &str) -> bool {
    src.contains(image_host) && has_image_extension(src)
}

fn from_card_container(document: &Html, site: &SiteConfig) -> Option<String> {
    let img_sel = Selector::parse("img").expect("valid selector");
    let container = document.select(site.card_selector()).next()?;
    let src = container.select(&img_sel).next()?.value().attr("src")?;
    is_card_image(src, &site.image_host).then(|| src.to_string())
}

fn from_meta_tags(document: &Html, site: &SiteConfig) -> Option<String> {
    [r#"meta[property="og:image"]"#, r#"meta[itemprop="image"]"#]
        .into_iter()
        .find_map(|selector| {
            let selector = Selector::parse(selector).expect("valid selector");
            let content = document.select(&selector).next()?.value().attr("content")?;
            (!content.is_empty() && content.contains(&site.image_host))
                .then(|| content.to_string())
        })
}

fn from_page_scan(document: &Html, site: &SiteConfig) -> Option<String> {
    let img_sel = Selector::parse("img").expect("valid selector");
    document
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .find(|src| is_card_image(src, &site.image_host))
        .map(str::to_string)
}

/// Try each tier in order and return the first image URL found.
pub fn find_image_url(html: &str, site: &SiteConfig) -> Option<(Tier, String)> {
    let document = Html::parse_document(html);
    Tier::ORDER
        .into_iter()
        .find_map(|tier| tier.extract(&document, site).map(|url| (tier, url)))
}

/// Fetch a card detail page and locate its highest-resolution image.
pub async fn extract_image_url<F>(
    fetcher: &F,
    site: &SiteConfig,
    card_url: &str,
) -> Result<String, ScrapeError>
where
    F: Fetch + ?Sized,
{
    let url = Url::parse(card_url).map_err(|source| ScrapeError::InvalidUrl {
        url: card_url.to_string(),
        source,
    })?;
    let html = fetcher.get_page(&url).await?;

    match find_image_url(&html, site) {
        Some((tier, image_url)) => {
            tracing::debug!(card = card_url, ?tier, image = %image_url, "Located card image");
            Ok(image_url)
        }
        None => Err(ScrapeError::NotFound {
            url: card_url.to_string(),
        }),
    }
}
