use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use ingest_common::db::PoolSettings;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_statement_timeout_secs: u64,
    pub rpc_url: String,
    pub rpc_requests_per_second: u32,
    pub explorer_api_url: String,
    pub explorer_timeout_secs: u64,
    pub explorer_max_retries: u32,
    pub explorer_retry_base_ms: u64,
    pub poll_interval_secs: u64,
    pub backfill_enabled: bool,
    pub watch_enabled: bool,
    pub backfill_stop_block: u64,
    pub metrics_addr: Option<SocketAddr>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database_url: var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("Invalid DB_MAX_CONNECTIONS")?,
            db_statement_timeout_secs: var("DB_STATEMENT_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("Invalid DB_STATEMENT_TIMEOUT_SECS")?,
            rpc_url: var("RPC_URL")
                .unwrap_or_else(|| "https://rpc-evm-sidechain.xrpl.org/".to_string()),
            rpc_requests_per_second: var("RPC_REQUESTS_PER_SECOND")
                .unwrap_or_else(|| "50".to_string())
                .parse()
                .context("Invalid RPC_REQUESTS_PER_SECOND")?,
            explorer_api_url: var("EXPLORER_API_URL")
                .unwrap_or_else(|| "https://explorer.xrplevm.org/api".to_string()),
            explorer_timeout_secs: var("EXPLORER_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("Invalid EXPLORER_TIMEOUT_SECS")?,
            explorer_max_retries: var("EXPLORER_MAX_RETRIES")
                .unwrap_or_else(|| "3".to_string())
                .parse()
                .context("Invalid EXPLORER_MAX_RETRIES")?,
            explorer_retry_base_ms: var("EXPLORER_RETRY_BASE_MS")
                .unwrap_or_else(|| "1000".to_string())
                .parse()
                .context("Invalid EXPLORER_RETRY_BASE_MS")?,
            poll_interval_secs: var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("Invalid POLL_INTERVAL_SECS")?,
            backfill_enabled: var("BACKFILL_ENABLED")
                .unwrap_or_else(|| "true".to_string())
                .parse()
                .context("Invalid BACKFILL_ENABLED")?,
            watch_enabled: var("WATCH_ENABLED")
                .unwrap_or_else(|| "true".to_string())
                .parse()
                .context("Invalid WATCH_ENABLED")?,
            backfill_stop_block: var("BACKFILL_STOP_BLOCK")
                .unwrap_or_else(|| "0".to_string())
                .parse()
                .context("Invalid BACKFILL_STOP_BLOCK")?,
            metrics_addr: var("METRICS_ADDR")
                .filter(|addr| !addr.is_empty())
                .map(|addr| addr.parse::<SocketAddr>())
                .transpose()
                .context("Invalid METRICS_ADDR")?,
            log_format: match var("LOG_FORMAT").as_deref() {
                None | Some("text") => LogFormat::Text,
                Some("json") => LogFormat::Json,
                Some(other) => anyhow::bail!("Invalid LOG_FORMAT: {}", other),
            },
        };

        if config.rpc_requests_per_second == 0 {
            anyhow::bail!("RPC_REQUESTS_PER_SECOND must be greater than zero");
        }
        if config.poll_interval_secs == 0 {
            anyhow::bail!("POLL_INTERVAL_SECS must be greater than zero");
        }

        Ok(config)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            statement_timeout: Duration::from_secs(self.db_statement_timeout_secs),
            ..Default::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn explorer_timeout(&self) -> Duration {
        Duration::from_secs(self.explorer_timeout_secs)
    }

    pub fn explorer_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.explorer_max_retries,
            Duration::from_millis(self.explorer_retry_base_ms),
            2,
        )
    }
}
