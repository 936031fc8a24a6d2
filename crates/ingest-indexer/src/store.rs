use async_trait::async_trait;
use sqlx::postgres::PgQueryResult;
use sqlx::PgPool;

use ingest_common::{Block, DecodedLog, EventLog, IngestError, Transaction};

/// Result of an append-only insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key already exists; nothing was written.
    Duplicate,
}

/// Append-only sink for the four ingested record kinds. Rows are never
/// updated; a repeated key leaves the existing row untouched.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_block(&self, block: &Block) -> Result<InsertOutcome, IngestError>;

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<InsertOutcome, IngestError>;

    async fn insert_log(&self, log: &EventLog) -> Result<InsertOutcome, IngestError>;

    async fn insert_decoded_log(&self, log: &DecodedLog) -> Result<InsertOutcome, IngestError>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn outcome(result: PgQueryResult) -> InsertOutcome {
        if result.rows_affected() == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_block(&self, block: &Block) -> Result<InsertOutcome, IngestError> {
        let result = sqlx::query(
            "INSERT INTO blocks (block_number, block_hash, block_timestamp, difficulty, gas_limit, gas_used,
                                 base_fee_per_gas, parent_hash, miner_address, nonce, size)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (block_number) DO NOTHING"
        )
        .bind(block.block_number)
        .bind(&block.block_hash)
        .bind(block.block_timestamp)
        .bind(&block.difficulty)
        .bind(&block.gas_limit)
        .bind(&block.gas_used)
        .bind(&block.base_fee_per_gas)
        .bind(&block.parent_hash)
        .bind(&block.miner_address)
        .bind(&block.nonce)
        .bind(block.size)
        .execute(&self.pool)
        .await?;

        Ok(Self::outcome(result))
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<InsertOutcome, IngestError> {
        let result = sqlx::query(
            "INSERT INTO transactions (tx_hash, block_number, from_address, to_address, value, gas, gas_price,
                                       input, nonce, transaction_index, transaction_type,
                                       max_fee_per_gas, max_priority_fee_per_gas)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (tx_hash) DO NOTHING"
        )
        .bind(&transaction.tx_hash)
        .bind(transaction.block_number)
        .bind(&transaction.from_address)
        .bind(&transaction.to_address)
        .bind(&transaction.value)
        .bind(&transaction.gas)
        .bind(&transaction.gas_price)
        .bind(&transaction.input)
        .bind(&transaction.nonce)
        .bind(transaction.transaction_index)
        .bind(transaction.transaction_type)
        .bind(&transaction.max_fee_per_gas)
        .bind(&transaction.max_priority_fee_per_gas)
        .execute(&self.pool)
        .await?;

        Ok(Self::outcome(result))
    }

    async fn insert_log(&self, log: &EventLog) -> Result<InsertOutcome, IngestError> {
        let result = sqlx::query(
            "INSERT INTO logs (tx_hash, log_index, block_number, address, data, topic0, topic1, topic2, topic3)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (tx_hash, log_index) DO NOTHING"
        )
        .bind(&log.tx_hash)
        .bind(log.log_index)
        .bind(log.block_number)
        .bind(&log.address)
        .bind(&log.data)
        .bind(&log.topic0)
        .bind(&log.topic1)
        .bind(&log.topic2)
        .bind(&log.topic3)
        .execute(&self.pool)
        .await?;

        Ok(Self::outcome(result))
    }

    async fn insert_decoded_log(&self, log: &DecodedLog) -> Result<InsertOutcome, IngestError> {
        let result = sqlx::query(
            "INSERT INTO decoded_logs (tx_hash, log_index, block_number, address, is_contract, is_verified,
                                       contract_name, decoded_input, method_id, call_signature, is_successful)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (tx_hash, log_index) DO NOTHING"
        )
        .bind(&log.tx_hash)
        .bind(log.log_index)
        .bind(log.block_number)
        .bind(&log.address)
        .bind(log.is_contract)
        .bind(log.is_verified)
        .bind(&log.contract_name)
        .bind(&log.decoded_input)
        .bind(&log.method_id)
        .bind(&log.call_signature)
        .bind(log.is_successful)
        .execute(&self.pool)
        .await?;

        Ok(Self::outcome(result))
    }
}
