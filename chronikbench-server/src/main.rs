use std::sync::Arc;

use anyhow::Result;
use chronikbench::{
    CombinedResult, ExecutorSettings, NodeTestExecutor, Orchestrator, ResolutionCache,
};
use chronikbench_client::ClientBuilder;
use tokio::task::JoinSet;

use chronikbench_server::actor::BenchmarkActor;
use chronikbench_server::config::Config;
use chronikbench_server::metrics::Metrics;
use chronikbench_server::transport::Transport;
use chronikbench_server::transport::http::{HttpContext, HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("chronikbench={}", config.log_level).parse()?),
        )
        .init();

    // Outbound collaborators share one HTTP connection pool
    let collaborators = ClientBuilder::new()
        .connect_timeout(config.collaborators.connect_timeout)
        .request_timeout(config.collaborators.request_timeout)
        .dns_url(config.collaborators.dns_url.clone())
        .geo_url(config.collaborators.geo_url.clone())
        .build()?;

    let cache = Arc::new(ResolutionCache::new(
        collaborators.resolver,
        collaborators.locator,
    ));
    let settings = ExecutorSettings {
        offer_timeout: config.offer_timeout,
        ..ExecutorSettings::default()
    };
    let executor = Arc::new(NodeTestExecutor::new(
        collaborators.connector,
        cache.clone(),
        settings,
    ));
    let orchestrator = Arc::new(Orchestrator::new(executor));

    if config.once {
        return run_once(&config, &orchestrator, &cache).await;
    }

    let metrics = Arc::new(Metrics::new());
    let handle = BenchmarkActor::spawn(config.buffer_size, orchestrator, metrics.clone());

    let mut transport_tasks = JoinSet::new();

    {
        let handle = handle.clone();
        let host = config.http.host.clone();
        let port = config.http.port;
        let context = HttpContext {
            defaults: config.defaults.clone(),
            cache: cache.clone(),
            metrics,
        };

        transport_tasks.spawn(async move {
            tracing::info!("Starting HTTP transport on {}:{}", host, port);
            let transport = HttpTransport::new(&host, port, context)?;
            transport.start(handle).await
        });
    }

    tracing::info!(
        "chronikbench server started with {} default node(s)",
        config.defaults.nodes.len()
    );
    tracing::info!(
        "Default record budget: {}, Buffer size: {}",
        config.defaults.record_budget,
        config.buffer_size
    );

    // Wait for all transport tasks to complete (they run indefinitely)
    while let Some(result) = transport_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::info!("Transport task completed successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Transport task panicked: {}", e);
                return Err(anyhow::anyhow!("Transport task panicked"));
            }
        }
    }

    Ok(())
}

/// Benchmark the default configuration once and print a result table
///
/// Ctrl-C aborts the run; rows printed so far are kept.
async fn run_once(
    config: &Config,
    orchestrator: &Arc<Orchestrator>,
    cache: &ResolutionCache,
) -> Result<()> {
    match cache.locate_self().await {
        Some((ip, location)) => println!("Your location: {location} ({ip})"),
        None => println!("Your location: unavailable"),
    }
    println!();

    let mut run = orchestrator.start(config.defaults.run_config())?;
    print_header();

    let cancel = run.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, aborting run");
            cancel.cancel();
        }
    });

    while let Some(result) = run.next().await {
        print_row(&result);
    }
    let summary = run.finish().await;
    interrupt.abort();

    println!();
    if summary.cancelled {
        println!("Aborted after {} node(s)", summary.completed);
    } else {
        println!("Tested {} node(s)", summary.completed);
    }

    Ok(())
}

fn print_header() {
    println!(
        "{:<40} {:<16} {:<24} {:>8} {:>9} {:>8} {:>9} {:>7} {:>7} {:>9}  Status",
        "Node", "IP", "Location", "Connect", "History", "Records", "Offers", "Count", "Taken", "Size (KB)"
    );
}

fn print_row(result: &CombinedResult) {
    let status = match &result.error {
        Some(error) => error.clone(),
        None if result.offers_supported => "OK".to_string(),
        None => "OK (offers unsupported)".to_string(),
    };

    println!(
        "{:<40} {:<16} {:<24} {:>8} {:>9} {:>8} {:>9} {:>7} {:>7} {:>9}  {}",
        result.node,
        result.address.to_string(),
        result.location,
        result.connect_latency.to_string(),
        result.history_time.to_string(),
        result.record_count,
        result.token_time.to_string(),
        result.offer_count,
        result.taken_count,
        result.payload_kb(),
        status
    );
}
