//! Mint Buffer Replenisher
//!
//! Keeps a Solana buffer of pending NFTs topped up: watches the buffer
//! account, and when it drains below its low-water mark, sources, publishes
//! and registers new items.

mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, LoadedConfig};
use mintbuf_core::config::{ReplenisherConfig, SourceConfig};
use mintbuf_core::events::{
    RunReportReceiver, account_changed_channel, observation_channel,
    replenishment_request_channel,
};
use mintbuf_core::ledger::{LedgerClient, SolanaLedgerClient};
use mintbuf_core::processors::{AccountListener, BufferMonitor, ReplenishmentOrchestrator};
use mintbuf_core::publisher::{AssetPublisher, IpfsPublisher};
use mintbuf_core::sources::{GeneratedSource, ItemSource, PoolSource};
use mintbuf_sdk::client::{FeedClient, IpfsClient, PoolClient, RpcClient, TransformClient};
use server::{build_router, run_server};
use shutdown::propagate_shutdown;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Mint Buffer Replenisher - keeps an on-chain NFT buffer topped up
#[derive(Parser, Debug)]
#[command(name = "mintbuf-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./mintbuf.toml", env = "MINTBUF_CONFIG")]
    config: PathBuf,

    /// Override the status API listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting mintbuf-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let LoadedConfig {
        server: server_settings,
        replenisher,
        authority,
    } = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!(
        source = replenisher.source.kind(),
        state_account = %replenisher.ledger.state_account,
        "Configuration loaded from {:?}",
        args.config
    );

    let http = reqwest::Client::builder()
        .timeout(replenisher.ledger.request_timeout)
        .build()?;

    let ledger = SolanaLedgerClient::new(&replenisher.ledger, authority)?;
    tracing::info!(authority = %ledger.authority(), "Buffer authority loaded");
    let ledger: Arc<dyn LedgerClient> = Arc::new(ledger);
    let source = build_source(&replenisher, &http);
    let publisher = replenisher.publisher.as_ref().map(|p| {
        let client = IpfsClient::new(p.ipfs_api_url.clone()).with_http_client(http.clone());
        Arc::new(IpfsPublisher::new(client)) as Arc<dyn AssetPublisher>
    });

    // Event channels
    let capacity = replenisher.orchestrator.queue_capacity;
    let (account_tx, account_rx) = account_changed_channel(capacity);
    let (request_tx, request_rx) = replenishment_request_channel(capacity);
    let (observation_tx, observation_rx) = observation_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let orchestrator = ReplenishmentOrchestrator::new(
        source,
        publisher,
        ledger,
        replenisher.orchestrator.clone(),
    );
    let state = AppState::new(observation_rx, orchestrator.clone());

    let rpc = Arc::new(RpcClient::new(replenisher.ledger.rpc_url.clone()).with_http_client(http));
    let listener = AccountListener::new(
        rpc,
        replenisher.ledger.ws_url.clone(),
        replenisher.ledger.state_account,
        replenisher.ledger.commitment,
        account_tx,
    );
    let monitor = BufferMonitor::new(request_tx, observation_tx);

    let tasks = vec![
        tokio::spawn(collect_reports(
            state.clone(),
            orchestrator.subscribe_reports(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(listener.run(shutdown_rx.clone())),
        tokio::spawn(monitor.run(shutdown_rx.clone(), account_rx)),
        tokio::spawn(orchestrator.run(shutdown_rx, request_rx)),
    ];

    // Run the status API until a shutdown signal arrives
    let router = build_router(state);
    tracing::info!("Starting HTTP server on {}", server_settings.listen);
    let result = run_server(
        router,
        server_settings.listen,
        propagate_shutdown(shutdown_tx.clone()),
    )
    .await;

    // The server may also have exited on error; stop the processors either way
    shutdown_tx.send_replace(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Processor task failed: {}", e);
        }
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Build the configured item source.
fn build_source(config: &ReplenisherConfig, http: &reqwest::Client) -> Arc<dyn ItemSource> {
    let orchestrator = &config.orchestrator;
    match &config.source {
        SourceConfig::Pool(pool) => {
            let client = PoolClient::new(pool.base_url.clone(), pool.api_key.clone())
                .with_http_client(http.clone());
            Arc::new(PoolSource::new(
                client,
                orchestrator.category.clone(),
                orchestrator.default_price_bps,
            ))
        }
        SourceConfig::Generated(generated) => {
            let feed = FeedClient::new(generated.feed_url.clone(), generated.feed_api_key.clone())
                .with_http_client(http.clone());
            let transformer = TransformClient::new(
                generated.transform_url.clone(),
                generated.transform_api_key.clone(),
            )
            .with_http_client(http.clone());
            Arc::new(
                GeneratedSource::new(
                    feed,
                    transformer,
                    generated.dedup_window,
                    generated.prompt_template.clone(),
                    orchestrator.category.clone(),
                    orchestrator.default_price_bps,
                )
                .with_parallelism(generated.transform_parallelism),
            )
        }
    }
}

/// Keep the last run summary for the status API.
async fn collect_reports(
    state: AppState,
    mut report_rx: RunReportReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }

            report = report_rx.recv() => match report {
                Ok(report) => {
                    tracing::debug!(request_id = %report.request_id, "run report recorded");
                    state.record_run(report.to_summary()).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "run report receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mintbuf_core=debug,hyper=warn,reqwest=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
