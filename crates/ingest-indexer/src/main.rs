use anyhow::Result;
use std::sync::Arc;

use ingest_indexer::retry::supervise;
use ingest_indexer::{
    telemetry, Backfiller, BlockProcessor, ChainClient, Config, Explorer, ExplorerClient, LiveWatcher,
    PgStore, ProcessBlock, RpcChainClient, Store,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize tracing
    telemetry::init_tracing(config.log_format);
    tracing::info!("Starting ingest indexer");

    if let Some(addr) = config.metrics_addr {
        telemetry::install_metrics_exporter(addr)?;
    }

    // Create database pool
    let pool = ingest_common::db::create_pool(&config.database_url, config.pool_settings()).await?;

    // Run migrations
    tracing::info!("Running database migrations");
    ingest_common::db::run_migrations(&pool).await?;

    // Clients are built once and shared by both drivers
    let chain: Arc<dyn ChainClient> =
        Arc::new(RpcChainClient::new(&config.rpc_url, config.rpc_requests_per_second)?);
    let explorer: Arc<dyn Explorer> = Arc::new(ExplorerClient::new(
        &config.explorer_api_url,
        config.explorer_timeout(),
        config.explorer_retry_policy(),
    )?);
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let processor: Arc<dyn ProcessBlock> = Arc::new(BlockProcessor::new(chain.clone(), explorer, store));

    let mut handles = Vec::new();

    if config.watch_enabled {
        let chain = chain.clone();
        let processor = processor.clone();
        let interval = config.poll_interval();

        handles.push(tokio::spawn(async move {
            let watcher = supervise("Live watcher", || {
                LiveWatcher::start(chain.clone(), processor.clone(), interval)
            })
            .await;
            watcher.run().await;
        }));
    }

    if config.backfill_enabled {
        let backfiller = Backfiller::new(chain.clone(), processor.clone(), config.backfill_stop_block);

        handles.push(tokio::spawn(async move {
            supervise("Backfiller", || backfiller.run()).await;
        }));
    }

    if handles.is_empty() {
        tracing::warn!("Both WATCH_ENABLED and BACKFILL_ENABLED are false, nothing to do");
        return Ok(());
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}
