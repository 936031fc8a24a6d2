use alloy::primitives::{Address, Bytes, TxHash, B256};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Number of topic columns on the `logs` table.
pub const TOPIC_SLOTS: usize = 4;

// =====================
// Chain-side records
// =====================

/// A block as returned by the chain client: the row to store plus the hashes
/// of its transactions in block order.
#[derive(Debug, Clone)]
pub struct ChainBlock {
    pub block: Block,
    pub transaction_hashes: Vec<TxHash>,
}

/// Execution outcome of a transaction.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub status: bool,
    pub logs: Vec<ReceiptLog>,
}

/// Event log as carried by a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<B256>,
}

impl ReceiptLog {
    /// Topics spread over the fixed slots; absent slots are `None`.
    pub fn topic_slots(&self) -> [Option<B256>; TOPIC_SLOTS] {
        let mut slots = [None; TOPIC_SLOTS];
        for (slot, topic) in slots.iter_mut().zip(self.topics.iter()) {
            *slot = Some(*topic);
        }
        slots
    }
}

// =====================
// Stored rows
// =====================

/// Block data as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Block {
    pub block_number: i64,
    pub block_hash: String,
    pub block_timestamp: DateTime<Utc>,
    pub difficulty: BigDecimal,
    pub gas_limit: BigDecimal,
    pub gas_used: BigDecimal,
    pub base_fee_per_gas: Option<BigDecimal>,
    pub parent_hash: String,
    pub miner_address: String,
    pub nonce: String,
    pub size: Option<i64>,
}

/// Transaction data as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub tx_hash: String,
    pub block_number: Option<i64>,
    pub from_address: String,
    pub to_address: Option<String>,
    pub value: BigDecimal,
    pub gas: BigDecimal,
    pub gas_price: Option<BigDecimal>,
    pub input: Vec<u8>,
    pub nonce: BigDecimal,
    pub transaction_index: Option<i32>,
    pub transaction_type: i16,
    pub max_fee_per_gas: Option<BigDecimal>,
    pub max_priority_fee_per_gas: Option<BigDecimal>,
}

/// Raw event log as stored in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EventLog {
    pub tx_hash: String,
    pub log_index: i32,
    pub block_number: i64,
    pub address: String,
    pub data: Vec<u8>,
    pub topic0: Option<String>,
    pub topic1: Option<String>,
    pub topic2: Option<String>,
    pub topic3: Option<String>,
}

impl EventLog {
    /// Build the stored row, padding topics to exactly four slots.
    pub fn from_receipt_log(log: &ReceiptLog) -> Self {
        let [topic0, topic1, topic2, topic3] =
            log.topic_slots().map(|slot| slot.map(|t| format!("{:?}", t)));

        Self {
            tx_hash: format!("{:?}", log.tx_hash),
            log_index: log.log_index as i32,
            block_number: log.block_number as i64,
            address: format!("{:?}", log.address),
            data: log.data.to_vec(),
            topic0,
            topic1,
            topic2,
            topic3,
        }
    }

    pub fn topics(&self) -> [Option<&str>; TOPIC_SLOTS] {
        [
            self.topic0.as_deref(),
            self.topic1.as_deref(),
            self.topic2.as_deref(),
            self.topic3.as_deref(),
        ]
    }
}

// =====================
// Explorer enrichment
// =====================

/// Contract metadata reported by the explorer for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub is_contract: bool,
    pub is_verified: bool,
    pub contract_name: Option<String>,
}

/// One decoded event parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub indexed: bool,
}

/// Human-readable decoding of a single log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedCall {
    pub method_call: String,
    pub method_id: String,
    pub parameters: Vec<DecodedParameter>,
}

/// Enriched log as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DecodedLog {
    pub tx_hash: String,
    pub log_index: i32,
    pub block_number: i64,
    pub address: String,
    pub is_contract: bool,
    pub is_verified: bool,
    pub contract_name: Option<String>,
    pub decoded_input: Json<Vec<DecodedParameter>>,
    pub method_id: String,
    pub call_signature: String,
    pub is_successful: bool,
}

impl DecodedLog {
    pub fn new(log: &ReceiptLog, info: ContractInfo, call: DecodedCall, is_successful: bool) -> Self {
        Self {
            tx_hash: format!("{:?}", log.tx_hash),
            log_index: log.log_index as i32,
            block_number: log.block_number as i64,
            address: format!("{:?}", log.address),
            is_contract: info.is_contract,
            is_verified: info.is_verified,
            contract_name: info.contract_name,
            decoded_input: Json(call.parameters),
            method_id: call.method_id,
            call_signature: call.method_call,
            is_successful,
        }
    }
}
