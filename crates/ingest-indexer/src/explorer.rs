//! Client for the block explorer's REST API.
//!
//! Supplies contract metadata and human-readable decodings of event logs.
//! Contract lookups are retried on HTTP 429; log decoding never fails loudly
//! and reports `None` instead.

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use ingest_common::{ContractInfo, DecodedCall, IngestError, ReceiptLog};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::telemetry;

#[async_trait]
pub trait Explorer: Send + Sync {
    async fn get_contract_info(&self, address: Address) -> Result<ContractInfo, IngestError>;

    async fn decode_log(&self, log: &ReceiptLog) -> Option<DecodedCall>;
}

/// GET /v2/addresses/{address} response
#[derive(Debug, Deserialize)]
struct AddressInfoResponse {
    #[serde(default)]
    is_contract: Option<bool>,
    #[serde(default)]
    is_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

/// GET /v2/transactions/{hash}/logs response
#[derive(Debug, Deserialize)]
struct TransactionLogsResponse {
    items: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    index: u64,
    #[serde(default)]
    decoded: Option<DecodedCall>,
}

pub struct ExplorerClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ExplorerClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, IngestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::Explorer(format!("Request error: {}", e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            metrics::counter!(telemetry::EXPLORER_RATE_LIMITED).increment(1);
            return Err(IngestError::RateLimited(format!("HTTP {} from {}", status, url)));
        }
        if !status.is_success() {
            return Err(IngestError::Explorer(format!("HTTP {} from {}", status, url)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| IngestError::Explorer(format!("JSON parse error: {}", e)))
    }

    async fn try_decode_log(&self, log: &ReceiptLog) -> Result<DecodedCall, IngestError> {
        let url = format!(
            "{}/v2/transactions/{:?}/logs?module=transaction&action=logs",
            self.base_url, log.tx_hash
        );
        let response: TransactionLogsResponse = self.get_json(&url).await?;

        let entry = response
            .items
            .into_iter()
            .find(|entry| entry.index == log.log_index)
            .ok_or_else(|| {
                IngestError::NotFound(format!(
                    "Log not found for tx {:?}, index {}",
                    log.tx_hash, log.log_index
                ))
            })?;

        entry.decoded.ok_or_else(|| {
            IngestError::NotFound(format!(
                "No decoding for tx {:?}, index {}",
                log.tx_hash, log.log_index
            ))
        })
    }
}

#[async_trait]
impl Explorer for ExplorerClient {
    async fn get_contract_info(&self, address: Address) -> Result<ContractInfo, IngestError> {
        let url = format!(
            "{}/v2/addresses/{}?module=address&action=info",
            self.base_url, address
        );

        let info: AddressInfoResponse = retry_with_backoff(
            &self.retry,
            IngestError::is_rate_limited,
            || self.get_json(&url),
        )
        .await?;

        Ok(ContractInfo {
            is_contract: info.is_contract.unwrap_or(false),
            is_verified: info.is_verified.unwrap_or(false),
            contract_name: info.name,
        })
    }

    async fn decode_log(&self, log: &ReceiptLog) -> Option<DecodedCall> {
        match self.try_decode_log(log).await {
            Ok(call) => Some(call),
            Err(e) => {
                tracing::error!(
                    "Error decoding log for tx {:?}, index {}: {}",
                    log.tx_hash,
                    log.log_index,
                    e
                );
                None
            }
        }
    }
}
