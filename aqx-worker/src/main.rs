//! AQX Event Worker
//!
//! Watches the RFQ and auction contracts, forwards their events to the
//! message queue and the analytical store, and streams them to websocket
//! subscribers.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use alloy_primitives::Address;
use anyhow::Context;
use aqx_core::chain::{ChainReader, JsonRpcChainReader};
use aqx_core::contracts::WatchedContract;
use aqx_core::processors::{EventForwarder, Monitor};
use aqx_core::signatures::SignatureRegistry;
use aqx_core::sinks::{Hub, PgStore, RedisPublisher};
use clap::Parser;
use config::{ConfigLoader, ConfigOverrides, WorkerConfig};
use server::{build_router, run_server};
use shutdown::spawn_shutdown_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// AQX Event Worker - contract event ingestion pipeline
#[derive(Parser, Debug)]
#[command(name = "aqx-worker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./aqx-worker.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the chain node JSON-RPC endpoint
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Override the Redis URL of the message queue
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Override the first block to scan
    #[arg(long, env = "START_HEIGHT")]
    start_height: Option<u64>,

    /// Address of the RFQ contract
    #[arg(long, env = "RFQ_CONTRACT_ADDRESS")]
    rfq_contract: Option<Address>,

    /// Address of the auction contract
    #[arg(long, env = "AUCTION_CONTRACT_ADDRESS")]
    auction_contract: Option<Address>,

    /// PostgreSQL URL of the analytical store; the store is disabled if unset
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen,
            rpc_url: self.rpc_url.clone(),
            redis_url: self.redis_url.clone(),
            start_height: self.start_height,
            rfq_contract: self.rfq_contract,
            auction_contract: self.auction_contract,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting aqx-worker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ConfigLoader::new(&args.config, args.overrides())
        .load()
        .inspect_err(|e| tracing::error!(error = %e, "Failed to load configuration"))?;
    tracing::info!(path = ?args.config, contracts = config.contracts.len(), "Configuration loaded");

    let (shutdown_tx, shutdown_rx) = spawn_shutdown_handler();

    // Wait for the chain node
    let reader = Arc::new(JsonRpcChainReader::new(config.rpc_url.clone()));
    let mut startup_rx = shutdown_rx.clone();
    let Some(head) = wait_for_chain(
        reader.as_ref(),
        config.connect_attempts,
        config.connect_retry,
        &mut startup_rx,
    )
    .await
    .with_context(|| format!("chain node at {} is not reachable", reader.endpoint()))?
    else {
        tracing::info!("Shutdown requested while waiting for the chain node");
        return Ok(());
    };
    tracing::info!(head, endpoint = %reader.endpoint(), "Connected to chain node");

    // Connect the message queue
    let publisher = RedisPublisher::connect(&config.redis_url, &config.queue_prefix)
        .await
        .context("failed to connect to Redis")?;

    // Connect the analytical store, if configured
    let db_pool = match &args.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .context("failed to connect to database")?;
            if args.migrate {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../migrations")
                    .run(&pool)
                    .await
                    .context("failed to run migrations")?;
                tracing::info!("Migrations completed successfully");
            }
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, event store disabled");
            None
        }
    };

    let hub = Hub::new(config.hub_buffer);
    let mut forwarder = EventForwarder::new(Arc::new(publisher)).with_hub(hub.clone());
    if let Some(pool) = &db_pool {
        forwarder = forwarder.with_store(Arc::new(PgStore::new(pool.clone())));
    }

    // Start the monitor
    let monitor_handle = start_monitor(&config, reader, forwarder, shutdown_rx.clone()).await?;
    let monitor_status = monitor_handle.as_ref().map(|(status, _)| status.clone());

    // Run the server
    let state = AppState::new(hub, monitor_status, shutdown_rx);
    let router = build_router(state.clone());
    tracing::info!(listen = %config.listen, "Starting HTTP server");
    let result = run_server(router, config.listen, &state).await;

    // Make sure the monitor stops even if the server exited on its own
    let _ = shutdown_tx.send(true);
    if let Some((_, handle)) = monitor_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Monitor task failed");
        }
    }

    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Worker shutdown complete");

    result.map_err(Into::into)
}

type MonitorHandle = (
    watch::Receiver<aqx_core::processors::MonitorStatus>,
    tokio::task::JoinHandle<()>,
);

/// Build the monitor and spawn its loop. Returns `None` when there is
/// nothing to watch.
async fn start_monitor(
    config: &WorkerConfig,
    reader: Arc<JsonRpcChainReader>,
    forwarder: EventForwarder,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<Option<MonitorHandle>> {
    if config.contracts.is_empty() {
        tracing::warn!("No contracts configured, event monitoring disabled");
        return Ok(None);
    }

    let registry = Arc::new(SignatureRegistry::standard());
    let contracts: Vec<_> = config
        .contracts
        .iter()
        .map(|contract| {
            tracing::info!(
                name = %contract.name,
                address = %contract.address,
                role = ?contract.role,
                "Watching contract"
            );
            WatchedContract::for_entity(
                contract.name.clone(),
                contract.address,
                contract.role,
                &registry,
            )
        })
        .collect();

    let monitor = Monitor::new(reader, registry, forwarder, contracts, config.monitor.clone())
        .await
        .context("failed to start event monitor")?;
    let status = monitor.status();
    let handle = tokio::spawn(monitor.run(shutdown_rx));
    Ok(Some((status, handle)))
}

/// Poll the chain node until it answers, up to `attempts` times.
///
/// Returns `None` when shutdown is signaled before the node answers.
async fn wait_for_chain(
    reader: &dyn ChainReader,
    attempts: u32,
    retry: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> anyhow::Result<Option<u64>> {
    let mut attempt = 1;
    loop {
        if *shutdown_rx.borrow() {
            return Ok(None);
        }
        match reader.current_height().await {
            Ok(head) => return Ok(Some(head)),
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, attempts, error = %e, "Chain node not ready, retrying");
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            return Ok(None);
                        }
                    }

                    _ = tokio::time::sleep(retry) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqx_core::chain::{ChainError, RawLogRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers after `failures` failed height reads.
    struct SlowNode {
        failures: u32,
        calls: AtomicU32,
    }

    impl SlowNode {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainReader for SlowNode {
        async fn current_height(&self) -> Result<u64, ChainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ChainError::Rpc {
                    code: -32000,
                    message: "starting up".into(),
                })
            } else {
                Ok(100)
            }
        }

        async fn get_logs(
            &self,
            _from: u64,
            _to: u64,
            _address: Address,
        ) -> Result<Vec<RawLogRecord>, ChainError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_chain_retries_until_ready() {
        let node = SlowNode::new(2);
        let (_tx, mut rx) = watch::channel(false);
        let head = wait_for_chain(&node, 30, Duration::from_secs(2), &mut rx)
            .await
            .unwrap();
        assert_eq!(head, Some(100));
        assert_eq!(node.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_chain_gives_up() {
        let node = SlowNode::new(u32::MAX);
        let (_tx, mut rx) = watch::channel(false);
        let result = wait_for_chain(&node, 3, Duration::from_secs(2), &mut rx).await;
        assert!(result.is_err());
        assert_eq!(node.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_chain_stops_on_shutdown() {
        let node = Arc::new(SlowNode::new(u32::MAX));
        let (tx, mut rx) = watch::channel(false);
        let waiter = {
            let node = node.clone();
            tokio::spawn(async move {
                wait_for_chain(node.as_ref(), 30, Duration::from_secs(2), &mut rx).await
            })
        };

        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();
        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result, None);
        assert!(node.calls.load(Ordering::SeqCst) < 30);
    }
}
