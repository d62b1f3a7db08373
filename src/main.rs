use anyhow::Result;
use feed_accumulator::config::Config;
use feed_accumulator::engine::{FeedAccumulator, FetchOutcome, ShelfView};
use feed_accumulator::feed::innertube::{Browse, InnertubeClient};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_BROWSE_ID: &str = "FEwhat_to_watch";

struct Args {
    config: PathBuf,
    browse_id: String,
    extra_pages: usize,
}

/// `feed-accumulator [--config PATH] [--browse ID] [--pages N]`
fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: PathBuf::from("config.toml"),
        browse_id: DEFAULT_BROWSE_ID.to_string(),
        extra_pages: 0,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || {
            it.next()
                .ok_or_else(|| anyhow::anyhow!("{} requires a value", arg))
        };
        match arg.as_str() {
            "--config" => args.config = PathBuf::from(value()?),
            "--browse" => args.browse_id = value()?,
            "--pages" => args.extra_pages = value()?.parse()?,
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create("feed-accumulator.log")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_accumulator=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .init();

    let args = parse_args()?;
    let config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        tracing::info!(path = %args.config.display(), "no config file, using defaults");
        Config::default()
    };

    let client = InnertubeClient::new(&config.client)?;
    let feed = FeedAccumulator::new(client, Browse::new(&args.browse_id), config.feed.clone());

    println!();
    println!("  Feed: {}", args.browse_id);

    match feed.activate().await {
        FetchOutcome::Loaded(n) => tracing::info!(items = n, "first page loaded"),
        outcome => {
            println!("  Initial fetch did not complete ({:?}), see feed-accumulator.log", outcome);
            return Ok(());
        }
    }

    let pages = feed.settle().await;
    tracing::info!(pages, items = feed.item_count(), "initial view filled");

    let mut appended = 0;
    while appended < args.extra_pages {
        match feed.fetch_more().await {
            FetchOutcome::Appended(n) => {
                appended += 1;
                tracing::info!(items = n, "page appended");
            }
            _ => break,
        }
    }
    feed.deactivate();

    let snapshot = feed.snapshot();
    let mut view = ShelfView::new(config.feed.row_width);
    let shelves = view.shelves(&snapshot);

    println!(
        "  {} items in {} shelves (more available: {})",
        snapshot.items.len(),
        shelves.len(),
        snapshot.current_page.as_ref().is_some_and(|p| p.has_continuation())
    );
    println!();
    for (i, shelf) in shelves.iter().enumerate() {
        let kinds: Vec<&str> = shelf.items.iter().map(|item| item.kind.as_str()).collect();
        println!(
            "  {:>3}. {:<24} {}",
            i + 1,
            shelf.title.as_deref().unwrap_or("-"),
            kinds.join(", ")
        );
    }
    println!();

    Ok(())
}
