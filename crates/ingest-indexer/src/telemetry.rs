use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

pub const BLOCKS: &str = "ingest_blocks_total";
pub const TRANSACTIONS_INSERTED: &str = "ingest_transactions_inserted_total";
pub const TRANSACTIONS_SKIPPED: &str = "ingest_transactions_skipped_total";
pub const LOGS_INSERTED: &str = "ingest_logs_inserted_total";
pub const DECODED_LOGS_INSERTED: &str = "ingest_decoded_logs_inserted_total";
pub const ENRICHMENT_SKIPPED: &str = "ingest_enrichment_skipped_total";
pub const EXPLORER_RATE_LIMITED: &str = "ingest_explorer_rate_limited_total";
pub const WATERMARK: &str = "ingest_watermark";
pub const BACKFILL_CURSOR: &str = "ingest_backfill_cursor";

pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ingest_indexer=info,sqlx=warn".into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Serve Prometheus metrics on `addr`. Must be called from within the runtime.
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Could not install Prometheus exporter")?;

    tracing::info!("Serving metrics on {}", addr);
    Ok(())
}
