use alloy::consensus::Transaction as TxTrait;
use alloy::eips::BlockNumberOrTag;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::TxHash;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Log, TransactionReceipt};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::DateTime;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;

use ingest_common::{Block, ChainBlock, IngestError, Receipt, ReceiptLog, Transaction};

pub type HttpProvider = RootProvider<Ethereum>;
pub type SharedRateLimiter = Arc<RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>;

/// Read access to the chain. Absent data is `Ok(None)`; transport failures are
/// returned to the caller without retry.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn head_height(&self) -> Result<u64, IngestError>;

    async fn get_block(
        &self,
        number: u64,
        include_transactions: bool,
    ) -> Result<Option<ChainBlock>, IngestError>;

    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, IngestError>;

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, IngestError>;
}

/// JSON-RPC backed chain client. Every call first takes a token from the
/// shared rate limiter.
pub struct RpcChainClient {
    provider: HttpProvider,
    rate_limiter: SharedRateLimiter,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, requests_per_second: u32) -> Result<Self, IngestError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| IngestError::Config(format!("Invalid RPC_URL {}: {}", rpc_url, e)))?;
        let rps = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            IngestError::Config("RPC_REQUESTS_PER_SECOND must be greater than zero".to_string())
        })?;

        tracing::info!("Rate limiting RPC requests to {} req/sec", rps);

        Ok(Self {
            provider: RootProvider::new_http(url),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn head_height(&self) -> Result<u64, IngestError> {
        self.rate_limiter.until_ready().await;
        Ok(self.provider.get_block_number().await?)
    }

    async fn get_block(
        &self,
        number: u64,
        include_transactions: bool,
    ) -> Result<Option<ChainBlock>, IngestError> {
        self.rate_limiter.until_ready().await;

        let request = self.provider.get_block_by_number(BlockNumberOrTag::Number(number));
        let block = if include_transactions {
            request.full().await?
        } else {
            request.await?
        };

        block.as_ref().map(block_record).transpose()
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, IngestError> {
        self.rate_limiter.until_ready().await;

        let transaction = self.provider.get_transaction_by_hash(hash).await?;
        transaction.as_ref().map(transaction_record).transpose()
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, IngestError> {
        self.rate_limiter.until_ready().await;

        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.as_ref().map(receipt_record))
    }
}

fn to_decimal(value: impl ToString) -> Result<BigDecimal, IngestError> {
    let value = value.to_string();
    BigDecimal::from_str(&value)
        .map_err(|e| IngestError::Internal(format!("Invalid numeric value {}: {}", value, e)))
}

fn to_i64(value: u64, field: &str) -> Result<i64, IngestError> {
    i64::try_from(value)
        .map_err(|_| IngestError::Internal(format!("{} {} does not fit in a BIGINT column", field, value)))
}

fn block_record(block: &alloy::rpc::types::Block) -> Result<ChainBlock, IngestError> {
    let header = &block.header;

    let block_timestamp = i64::try_from(header.timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            IngestError::Internal(format!(
                "Block {} has out-of-range timestamp {}",
                header.number, header.timestamp
            ))
        })?;

    let record = Block {
        block_number: to_i64(header.number, "Block number")?,
        block_hash: format!("{:?}", header.hash),
        block_timestamp,
        difficulty: to_decimal(header.difficulty)?,
        gas_limit: to_decimal(header.gas_limit)?,
        gas_used: to_decimal(header.gas_used)?,
        base_fee_per_gas: header.base_fee_per_gas.map(to_decimal).transpose()?,
        parent_hash: format!("{:?}", header.parent_hash),
        miner_address: format!("{:?}", header.beneficiary),
        nonce: format!("{:?}", header.nonce),
        size: header.size.and_then(|size| i64::try_from(size).ok()),
    };

    Ok(ChainBlock {
        block: record,
        transaction_hashes: block.transactions.hashes().collect(),
    })
}

fn transaction_record(transaction: &alloy::rpc::types::Transaction) -> Result<Transaction, IngestError> {
    // Fields of the signed envelope
    let envelope = transaction.inner.inner();
    let from_addr = transaction.inner.signer();

    let gas_price = transaction
        .effective_gas_price
        .or_else(|| envelope.gas_price())
        .map(to_decimal)
        .transpose()?;
    let (max_fee_per_gas, max_priority_fee_per_gas) = if envelope.is_dynamic_fee() {
        (
            Some(to_decimal(envelope.max_fee_per_gas())?),
            envelope.max_priority_fee_per_gas().map(to_decimal).transpose()?,
        )
    } else {
        (None, None)
    };

    Ok(Transaction {
        tx_hash: format!("{:?}", envelope.tx_hash()),
        block_number: transaction
            .block_number
            .map(|n| to_i64(n, "Block number"))
            .transpose()?,
        from_address: format!("{:?}", from_addr),
        to_address: envelope.to().map(|a| format!("{:?}", a)),
        value: to_decimal(envelope.value())?,
        gas: to_decimal(envelope.gas_limit())?,
        gas_price,
        input: envelope.input().to_vec(),
        nonce: to_decimal(envelope.nonce())?,
        transaction_index: transaction.transaction_index.map(|i| i as i32),
        transaction_type: envelope.tx_type() as u8 as i16,
        max_fee_per_gas,
        max_priority_fee_per_gas,
    })
}

fn receipt_record(receipt: &TransactionReceipt) -> Receipt {
    let block_number = receipt.block_number.unwrap_or_default();

    Receipt {
        tx_hash: receipt.transaction_hash,
        status: receipt.status(),
        logs: receipt
            .inner
            .logs()
            .iter()
            .enumerate()
            .map(|(position, log)| log_record(log, position as u64, receipt.transaction_hash, block_number))
            .collect(),
    }
}

/// Pending logs carry no position; fall back to the enclosing receipt's, and
/// to the log's place within the receipt for its index.
fn log_record(log: &Log, position: u64, tx_hash: TxHash, block_number: u64) -> ReceiptLog {
    ReceiptLog {
        tx_hash: log.transaction_hash.unwrap_or(tx_hash),
        log_index: log.log_index.unwrap_or(position),
        block_number: log.block_number.unwrap_or(block_number),
        address: log.address(),
        data: log.data().data.clone(),
        topics: log.topics().to_vec(),
    }
}
