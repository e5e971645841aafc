//! Manual tool: fetch and parse feeds, printing what the parser made of them.

use clap::Parser;
use common::PolitenessConfig;

use newsradar::ingestion::{self, HttpFetcher};
use newsradar::sources::SourceCatalog;

#[derive(Parser, Debug)]
#[command(name = "probe_feeds", about = "Fetch feeds and print a parse summary")]
struct Args {
    /// Feed URLs to probe. Defaults to the built-in catalog for --country.
    urls: Vec<String>,

    /// Country of the built-in catalog to probe when no URLs are given
    #[arg(long, default_value = "us")]
    country: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Number of articles to print per feed
    #[arg(long, default_value_t = 3)]
    show: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let fetcher = HttpFetcher::new(&PolitenessConfig {
        fetch_timeout_seconds: Some(args.timeout),
        ..PolitenessConfig::default()
    })?;

    let targets: Vec<(String, String)> = if args.urls.is_empty() {
        SourceCatalog::builtin()
            .select(&args.country, None)
            .into_iter()
            .map(|s| (s.url, s.display_name))
            .collect()
    } else {
        args.urls.iter().map(|u| (u.clone(), u.clone())).collect()
    };

    let mut failures = 0;
    for (url, name) in &targets {
        println!("\n{}", "=".repeat(60));
        println!("Probing: {} ({})", name, url);
        println!("{}", "=".repeat(60));

        match ingestion::fetch_and_parse_feed(&fetcher, url, name).await {
            Ok(articles) => {
                println!("✓ {} articles", articles.len());
                for (i, article) in articles.iter().take(args.show).enumerate() {
                    println!("    {}. {}", i + 1, article.title);
                    println!("       URL: {}", if article.url.is_empty() { "none" } else { &article.url });
                    println!("       Published: {}", article.published_at.to_rfc3339());
                    println!(
                        "       Image: {}, Content: {} chars",
                        article.image_url.as_deref().unwrap_or("none"),
                        article.content.as_ref().map(|c| c.chars().count()).unwrap_or(0)
                    );
                }
            }
            Err(e) => {
                failures += 1;
                println!("✗ Failed: {:#}", e);
            }
        }
    }

    println!("\n{} feeds probed, {} failed", targets.len(), failures);
    Ok(())
}
