use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

mod error;
mod pipeline;
mod site;
#[cfg(test)]
mod testing;
mod utils;

use pipeline::RunConfig;
use site::{Query, SiteConfig, DEFAULT_BASE_URL, DEFAULT_CARD_SELECTOR, DEFAULT_IMAGE_HOST};
use utils::http::HttpFetcher;
use utils::throttle::{FixedDelay, NoDelay, Throttle};

/// Download every card image for a character from an online card catalog
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Character name to search for (prompted for if omitted)
    name: Option<String>,

    /// Directory where images are saved
    #[arg(short, long, default_value = "cards")]
    output: PathBuf,

    /// Number of cards to process at once
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Pause after each search page, in milliseconds
    #[arg(long, default_value_t = 1000)]
    page_delay_ms: u64,

    /// Pause after each card, in milliseconds
    #[arg(long, default_value_t = 500)]
    card_delay_ms: u64,

    /// CSS selector for the element wrapping the main card image
    #[arg(long, default_value = DEFAULT_CARD_SELECTOR)]
    card_selector: String,

    /// Host that card images must be served from
    #[arg(long, default_value = DEFAULT_IMAGE_HOST)]
    image_host: String,

    /// Catalog site root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn throttle_from_args(args: &Args) -> Box<dyn Throttle> {
    if args.page_delay_ms == 0 && args.card_delay_ms == 0 {
        Box::new(NoDelay)
    } else {
        Box::new(FixedDelay {
            page: Duration::from_millis(args.page_delay_ms),
            card: Duration::from_millis(args.card_delay_ms),
        })
    }
}

/// Everything a run needs, built once from the command line.
struct Scraper {
    fetcher: HttpFetcher,
    throttle: Box<dyn Throttle>,
    site: SiteConfig,
    config: RunConfig,
    json: bool,
}

impl Scraper {
    fn from_args(args: &Args) -> anyhow::Result<Self> {
        let site = SiteConfig::new(&args.base_url, &args.image_host, &args.card_selector)?;
        tracing::debug!(
            base_url = %site.base_url,
            image_host = %site.image_host,
            card_selector = site.card_selector_source(),
            "Site configuration"
        );

        Ok(Self {
            fetcher: HttpFetcher::new().context("Failed to build HTTP client")?,
            throttle: throttle_from_args(args),
            site,
            config: RunConfig {
                output_dir: args.output.clone(),
                threads: args.threads,
            },
            json: args.json,
        })
    }

    /// Validate `input` and, if it is a usable name, run the whole pipeline for it.
    async fn process(&self, input: &str) {
        let query = match Query::parse(input) {
            Ok(query) => query,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected name");
                println!("Invalid input. Please try again.");
                return;
            }
        };

        match pipeline::run(&self.fetcher, self.throttle.as_ref(), &self.site, &query, &self.config).await {
            Ok(report) => {
                if report.total_pages == 0 {
                    println!("No results found for '{}'.", query.as_str());
                } else {
                    println!(
                        "\nComplete! Downloaded {} new images to {}",
                        report.downloaded,
                        self.config.output_dir.display()
                    );
                    if report.already_present > 0 {
                        println!("Skipped {} cards (already existed)", report.already_present);
                    }
                    if report.failed > 0 || report.missing > 0 {
                        println!(
                            "{} cards failed, {} had no image",
                            report.failed, report.missing
                        );
                    }
                }

                if self.json {
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => println!("{}", json),
                        Err(e) => eprintln!("Failed to serialize report: {}", e),
                    }
                }
            }
            Err(e) => eprintln!("Error downloading cards for '{}': {}", query, e),
        }
    }
}

/// Print `message` and read one trimmed line; `None` on end of input.
async fn prompt(lines: &mut Lines<BufReader<Stdin>>, message: &str) -> std::io::Result<Option<String>> {
    print!("{}", message);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let scraper = Scraper::from_args(&args)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match args.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => scraper.process(name).await,
        _ => {
            let name = prompt(&mut lines, "Enter the name of the character to download cards for: ")
                .await?
                .unwrap_or_default();
            if name.is_empty() {
                println!("No name provided. Exiting.");
                std::process::exit(1);
            }
            scraper.process(&name).await;
        }
    }

    loop {
        let input = prompt(&mut lines, "\nEnter card character name (or press Enter to quit): ")
            .await?
            .unwrap_or_default();
        if input.is_empty() {
            println!("Exiting...");
            break;
        }
        scraper.process(&input).await;
    }

    Ok(())
}
