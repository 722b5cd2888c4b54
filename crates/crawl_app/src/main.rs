mod cli;
mod logging;
mod server;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crawl_engine::{
    CrawlConfig, CrawlError, CrawlSummary, Crawler, ExclusionPolicy, FetchSettings,
    MetricsSnapshot, ReqwestFetcher, RequisiteExtractor,
};
use crawl_logging::{crawl_error, crawl_info, crawl_warn};
use log::LevelFilter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, ClientArgs, Commands, ServerArgs};
use crate::logging::LogDestination;

#[derive(Debug, Serialize)]
struct SummaryReport {
    #[serde(flatten)]
    metrics: MetricsSnapshot,
    items_seen: usize,
    elapsed_secs: f64,
    cancelled: bool,
}

impl SummaryReport {
    /// A cancelled run still reports what it did up to that point.
    fn from_outcome(outcome: Result<CrawlSummary, CrawlError>) -> Result<Self, CrawlError> {
        match outcome {
            Ok(summary) => Ok(Self {
                metrics: summary.metrics,
                items_seen: summary.items_seen,
                elapsed_secs: summary.elapsed.as_secs_f64(),
                cancelled: false,
            }),
            Err(CrawlError::Cancelled {
                metrics,
                items_seen,
                elapsed,
            }) => Ok(Self {
                metrics,
                items_seen,
                elapsed_secs: elapsed.as_secs_f64(),
                cancelled: true,
            }),
            Err(err) => Err(err),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = if cli.log_file {
        LogDestination::Both
    } else {
        LogDestination::Terminal
    };
    logging::initialize(destination, level);

    let result = match cli.command {
        Commands::Client(args) => run_client(args).await,
        Commands::Server(args) => run_server(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            crawl_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run_client(args: ClientArgs) -> Result<()> {
    if args.urls.is_empty() {
        bail!("missing URL");
    }

    let mut config = CrawlConfig::from_urls(&args.urls)?;
    config.parallel_requests = args.parallel;
    config.page_requisites = args.page_requisites;
    config.queue_capacity = args.queue_capacity;
    config.progress_interval = args.progress_secs.map(Duration::from_secs);
    if let Some(path) = &args.url_blacklist {
        config.exclusion = ExclusionPolicy::from_file(path)?;
        crawl_info!(
            "loaded {} url blacklist patterns from {}",
            config.exclusion.len(),
            path.display()
        );
    }

    let fetcher = ReqwestFetcher::new(FetchSettings {
        user_agent: args.user_agent.clone(),
        ..FetchSettings::default()
    })
    .context("failed to build http client")?;
    let crawler = Crawler::new(
        config,
        Arc::new(fetcher),
        Arc::new(RequisiteExtractor::new()),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            crawl_warn!("interrupted, abandoning requests in flight");
            on_interrupt.cancel();
        }
    });

    let report = SummaryReport::from_outcome(crawler.run_with_cancellation(cancel).await)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &SummaryReport) {
    let metrics = &report.metrics;
    if report.cancelled {
        println!("crawl cancelled");
    }
    println!("{} urls", report.items_seen);
    println!("{} requests, {} errors", metrics.requests, metrics.errors);
    println!("{} connections", metrics.connections);
    println!(
        "{} bytes in {:.6} s",
        metrics.bytes_received, report.elapsed_secs
    );
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let config = server::ServerConfig {
        addr: args.addr,
        serve_dir: args.dir,
        multi_domain: args.multi_domain,
        query_in_filename: args.query_in_filename,
    };
    server::run(config, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            crawl_info!("shutting down");
        }
    })
    .await
}
