//! Exclusive Fetch - fetch URLs one at a time through a named context
//!
//! Every request is submitted up front; the context turns them into a
//! waterfall so the remote never sees two of them at once.

mod logging;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use exclusive_core::domain::{FetchMethod, FetchRequest};
use exclusive_core::port::Fetcher;
use exclusive_core::{ContextKey, ContextRegistry};
use exclusive_infra_http::{HttpFetcher, HttpFetcherConfig};
use logging::LogFormat;
use report::FetchRow;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONTEXT: &str = "default";

#[derive(Parser, Debug)]
#[command(name = "exclusive-fetch")]
#[command(about = "Fetch URLs sequentially through a named Exclusive context", long_about = None)]
#[command(version)]
struct Cli {
    /// URLs to fetch, in submission order
    #[arg(required = true)]
    urls: Vec<String>,

    /// Context key the requests are serialized under
    #[arg(short, long, env = "EXCLUSIVE_CONTEXT", default_value = DEFAULT_CONTEXT)]
    context: String,

    /// Submit the whole URL list this many times
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    repeat: u32,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Print one JSON object per request instead of a table
    #[arg(long)]
    json: bool,

    /// Log output format
    #[arg(long, value_enum, env = "EXCLUSIVE_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_tracing(cli.log_format)?;
    info!("Exclusive Fetch v{} starting...", VERSION);

    let key = ContextKey::parse(cli.context.as_str()).context("Invalid --context")?;
    let method = FetchMethod::parse(&cli.method).context("Invalid --method")?;
    let config = HttpFetcherConfig::from_env().context("Invalid HTTP configuration")?;
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new(&config).context("Failed to build HTTP client")?);

    let registry = ContextRegistry::new();
    let rows = fetch_all(&registry, &key, fetcher, method, &cli).await;
    registry.clear();

    if cli.json {
        println!("{}", report::render_json_lines(&rows)?);
    } else {
        println!(
            "{}",
            format!("✓ {} request(s) through context '{}'", rows.len(), key)
                .green()
                .bold()
        );
        println!();
        println!("{}", report::render_table(&rows));
    }

    let failures = rows.iter().filter(|row| row.is_failure()).count();
    if failures > 0 {
        anyhow::bail!("{} of {} request(s) failed", failures, rows.len());
    }

    Ok(())
}

/// Submit every request to the context at once, then collect in order
async fn fetch_all(
    registry: &ContextRegistry,
    key: &ContextKey,
    fetcher: Arc<dyn Fetcher>,
    method: FetchMethod,
    cli: &Cli,
) -> Vec<FetchRow> {
    let context = registry.get_or_create(key);
    let origin = Instant::now();

    let submissions: Vec<_> = (0..cli.repeat)
        .flat_map(|_| cli.urls.iter())
        .enumerate()
        .map(|(seq, url)| {
            let fetcher = Arc::clone(&fetcher);
            let request = FetchRequest::new(method, url.as_str());
            let handle = context.run(move || async move {
                let started = origin.elapsed();
                let outcome = fetcher.fetch(request).await;
                (started, origin.elapsed(), outcome)
            });
            (seq, url.as_str(), handle)
        })
        .collect();

    info!(context = %key, submitted = submissions.len(), "Requests queued");

    let mut rows = Vec::with_capacity(submissions.len());
    for (seq, url, handle) in submissions {
        let (started, finished, outcome) = handle.await;
        rows.push(FetchRow::new(seq, method, url, started, finished, &outcome));
    }
    rows
}
