#![allow(dead_code)]

use alloy::primitives::{Address, Bytes, TxHash, B256};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use wiremock::{http::Method, Match, Request, Respond, ResponseTemplate};

use ingest_common::{
    Block, ChainBlock, ContractInfo, DecodedCall, DecodedLog, DecodedParameter, EventLog, IngestError,
    Receipt, ReceiptLog, Transaction,
};
use ingest_indexer::{BlockOutcome, BlockReport, ChainClient, Explorer, InsertOutcome, ProcessBlock, Store};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn tx_hash(block: u64, index: u64) -> TxHash {
    B256::left_padding_from(&(block * 1_000 + index + 1).to_be_bytes())
}

pub fn contract_address(block: u64) -> Address {
    Address::left_padding_from(&(0xc0de_0000 + block).to_be_bytes())
}

pub fn block_row(number: u64) -> Block {
    Block {
        block_number: number as i64,
        block_hash: format!("{:?}", B256::left_padding_from(&number.to_be_bytes())),
        block_timestamp: DateTime::from_timestamp(1_700_000_000 + number as i64, 0).unwrap(),
        difficulty: BigDecimal::from(0),
        gas_limit: BigDecimal::from(30_000_000),
        gas_used: BigDecimal::from(21_000),
        base_fee_per_gas: Some(BigDecimal::from(7)),
        parent_hash: format!("{:?}", B256::left_padding_from(&number.saturating_sub(1).to_be_bytes())),
        miner_address: format!("{:?}", Address::ZERO),
        nonce: "0x0000000000000000".to_string(),
        size: Some(540),
    }
}

pub fn transaction_row(hash: TxHash, block: u64, index: u64) -> Transaction {
    Transaction {
        tx_hash: format!("{:?}", hash),
        block_number: Some(block as i64),
        from_address: format!("{:?}", Address::repeat_byte(0x01)),
        to_address: Some(format!("{:?}", contract_address(block))),
        value: BigDecimal::from(1_000),
        gas: BigDecimal::from(21_000),
        gas_price: Some(BigDecimal::from(1_000_000_000u64)),
        input: vec![],
        nonce: BigDecimal::from(index),
        transaction_index: Some(index as i32),
        transaction_type: 2,
        max_fee_per_gas: Some(BigDecimal::from(2_000_000_000u64)),
        max_priority_fee_per_gas: Some(BigDecimal::from(1_000_000u64)),
    }
}

pub fn receipt_log(hash: TxHash, block: u64, log_index: u64, topics: usize) -> ReceiptLog {
    ReceiptLog {
        tx_hash: hash,
        log_index,
        block_number: block,
        address: contract_address(block),
        data: Bytes::from(vec![0u8; 32]),
        topics: (0..topics).map(|i| B256::repeat_byte(i as u8 + 1)).collect(),
    }
}

pub fn decoded_call(log: &ReceiptLog) -> DecodedCall {
    DecodedCall {
        method_call: "Transfer(address indexed from, address indexed to, uint256 value)".to_string(),
        method_id: "ddf252ad".to_string(),
        parameters: vec![
            DecodedParameter {
                name: "from".to_string(),
                kind: "address".to_string(),
                value: json!(format!("{:?}", Address::repeat_byte(0x01))),
                indexed: true,
            },
            DecodedParameter {
                name: "value".to_string(),
                kind: "uint256".to_string(),
                value: json!(log.log_index.to_string()),
                indexed: false,
            },
        ],
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Scripted chain. Head reads are served from a queue whose last entry
/// repeats; blocks, transactions and receipts come from maps. Block and
/// transaction reads yield once so concurrent drivers interleave.
#[derive(Default)]
pub struct FakeChain {
    heads: Mutex<VecDeque<Option<u64>>>,
    blocks: Mutex<HashMap<u64, ChainBlock>>,
    transactions: Mutex<HashMap<TxHash, Transaction>>,
    receipts: Mutex<HashMap<TxHash, Receipt>>,
    failing_blocks: Mutex<HashSet<u64>>,
    failing_transactions: Mutex<HashSet<TxHash>>,
    block_requests: Mutex<Vec<u64>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_head(&self, head: u64) {
        self.heads.lock().unwrap().push_back(Some(head));
    }

    pub fn push_head_error(&self) {
        self.heads.lock().unwrap().push_back(None);
    }

    pub fn add_block(&self, number: u64) {
        self.blocks.lock().unwrap().insert(
            number,
            ChainBlock {
                block: block_row(number),
                transaction_hashes: Vec::new(),
            },
        );
    }

    /// Add a transaction with `log_count` logs to an existing block.
    pub fn add_transaction(&self, block: u64, log_count: usize, status: bool) -> TxHash {
        let mut blocks = self.blocks.lock().unwrap();
        let chain_block = blocks.get_mut(&block).expect("block must be added first");
        let index = chain_block.transaction_hashes.len() as u64;
        let hash = tx_hash(block, index);
        chain_block.transaction_hashes.push(hash);

        self.transactions
            .lock()
            .unwrap()
            .insert(hash, transaction_row(hash, block, index));
        self.receipts.lock().unwrap().insert(
            hash,
            Receipt {
                tx_hash: hash,
                status,
                logs: (0..log_count)
                    .map(|i| receipt_log(hash, block, index * 10 + i as u64, 3))
                    .collect(),
            },
        );
        hash
    }

    pub fn set_receipt_logs(&self, hash: TxHash, logs: Vec<ReceiptLog>) {
        if let Some(receipt) = self.receipts.lock().unwrap().get_mut(&hash) {
            receipt.logs = logs;
        }
    }

    pub fn remove_transaction(&self, hash: TxHash) {
        self.transactions.lock().unwrap().remove(&hash);
    }

    pub fn remove_receipt(&self, hash: TxHash) {
        self.receipts.lock().unwrap().remove(&hash);
    }

    pub fn fail_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().insert(number);
    }

    pub fn fail_transaction(&self, hash: TxHash) {
        self.failing_transactions.lock().unwrap().insert(hash);
    }

    pub fn block_requests(&self) -> Vec<u64> {
        self.block_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn head_height(&self) -> Result<u64, IngestError> {
        let mut heads = self.heads.lock().unwrap();
        let head = if heads.len() > 1 {
            heads.pop_front().flatten()
        } else {
            heads.front().copied().flatten()
        };
        head.ok_or_else(|| IngestError::Rpc("connection refused".to_string()))
    }

    async fn get_block(
        &self,
        number: u64,
        _include_transactions: bool,
    ) -> Result<Option<ChainBlock>, IngestError> {
        tokio::task::yield_now().await;
        self.block_requests.lock().unwrap().push(number);
        if self.failing_blocks.lock().unwrap().contains(&number) {
            return Err(IngestError::Rpc(format!("timeout fetching block {}", number)));
        }
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, IngestError> {
        tokio::task::yield_now().await;
        if self.failing_transactions.lock().unwrap().contains(&hash) {
            return Err(IngestError::Rpc(format!("timeout fetching {:?}", hash)));
        }
        Ok(self.transactions.lock().unwrap().get(&hash).cloned())
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, IngestError> {
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }
}

// ---------------------------------------------------------------------------
// Explorer
// ---------------------------------------------------------------------------

/// Explorer that knows every contract and can decode every log unless told
/// otherwise.
#[derive(Default)]
pub struct FakeExplorer {
    failing_addresses: Mutex<HashSet<Address>>,
    undecodable: Mutex<HashSet<(TxHash, u64)>>,
    pub contract_info_calls: AtomicUsize,
    pub decode_calls: AtomicUsize,
}

impl FakeExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_contract_info(&self, address: Address) {
        self.failing_addresses.lock().unwrap().insert(address);
    }

    pub fn fail_decode(&self, hash: TxHash, log_index: u64) {
        self.undecodable.lock().unwrap().insert((hash, log_index));
    }

    pub fn contract_info() -> ContractInfo {
        ContractInfo {
            is_contract: true,
            is_verified: true,
            contract_name: Some("TestToken".to_string()),
        }
    }
}

#[async_trait]
impl Explorer for FakeExplorer {
    async fn get_contract_info(&self, address: Address) -> Result<ContractInfo, IngestError> {
        self.contract_info_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_addresses.lock().unwrap().contains(&address) {
            return Err(IngestError::RateLimited("HTTP 429 Too Many Requests".to_string()));
        }
        Ok(Self::contract_info())
    }

    async fn decode_log(&self, log: &ReceiptLog) -> Option<DecodedCall> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .undecodable
            .lock()
            .unwrap()
            .contains(&(log.tx_hash, log.log_index))
        {
            return None;
        }
        Some(decoded_call(log))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory store with the same key rules as the SQL schema, including the
/// decoded_logs → logs reference.
#[derive(Default)]
pub struct MemoryStore {
    blocks: Mutex<Vec<Block>>,
    transactions: Mutex<Vec<Transaction>>,
    logs: Mutex<Vec<EventLog>>,
    decoded_logs: Mutex<Vec<DecodedLog>>,
    failing_transactions: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_transaction_insert(&self, hash: TxHash) {
        self.failing_transactions
            .lock()
            .unwrap()
            .insert(format!("{:?}", hash));
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap().clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<EventLog> {
        self.logs.lock().unwrap().clone()
    }

    pub fn decoded_logs(&self) -> Vec<DecodedLog> {
        self.decoded_logs.lock().unwrap().clone()
    }

    pub fn block_numbers(&self) -> Vec<i64> {
        let mut numbers: Vec<i64> = self.blocks().iter().map(|b| b.block_number).collect();
        numbers.sort_unstable();
        numbers
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_block(&self, block: &Block) -> Result<InsertOutcome, IngestError> {
        let mut blocks = self.blocks.lock().unwrap();
        if blocks.iter().any(|b| b.block_number == block.block_number) {
            return Ok(InsertOutcome::Duplicate);
        }
        blocks.push(block.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<InsertOutcome, IngestError> {
        if self
            .failing_transactions
            .lock()
            .unwrap()
            .contains(&transaction.tx_hash)
        {
            return Err(IngestError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut transactions = self.transactions.lock().unwrap();
        if transactions.iter().any(|t| t.tx_hash == transaction.tx_hash) {
            return Ok(InsertOutcome::Duplicate);
        }
        transactions.push(transaction.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_log(&self, log: &EventLog) -> Result<InsertOutcome, IngestError> {
        let mut logs = self.logs.lock().unwrap();
        if logs
            .iter()
            .any(|l| l.tx_hash == log.tx_hash && l.log_index == log.log_index)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        logs.push(log.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_decoded_log(&self, log: &DecodedLog) -> Result<InsertOutcome, IngestError> {
        let parent_exists = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.tx_hash == log.tx_hash && l.log_index == log.log_index);
        if !parent_exists {
            return Err(IngestError::Internal(
                "decoded_logs references a missing log".to_string(),
            ));
        }

        let mut decoded_logs = self.decoded_logs.lock().unwrap();
        if decoded_logs
            .iter()
            .any(|l| l.tx_hash == log.tx_hash && l.log_index == log.log_index)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        decoded_logs.push(log.clone());
        Ok(InsertOutcome::Inserted)
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Records the block numbers it is asked to process.
#[derive(Default)]
pub struct RecordingProcessor {
    calls: Mutex<Vec<u64>>,
    failing: Mutex<HashSet<u64>>,
    missing: Mutex<HashSet<u64>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, number: u64) {
        self.failing.lock().unwrap().insert(number);
    }

    pub fn missing(&self, number: u64) {
        self.missing.lock().unwrap().insert(number);
    }

    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessBlock for RecordingProcessor {
    async fn process_block(&self, number: u64) -> BlockReport {
        self.calls.lock().unwrap().push(number);

        let outcome = if self.failing.lock().unwrap().contains(&number) {
            BlockOutcome::Failed("RPC error: timeout".to_string())
        } else if self.missing.lock().unwrap().contains(&number) {
            BlockOutcome::NotFound
        } else {
            BlockOutcome::Processed
        };

        BlockReport {
            number,
            outcome,
            transactions_seen: 0,
            transactions_inserted: 0,
            logs_inserted: 0,
            decoded_logs_inserted: 0,
            duplicates: 0,
            skips: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC over wiremock
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

pub struct RpcRequestMatcher {
    method: String,
    params: Option<Value>,
}

/// Match a JSON-RPC call by method name only.
pub fn rpc_method(method: impl Into<String>) -> RpcRequestMatcher {
    RpcRequestMatcher {
        method: method.into(),
        params: None,
    }
}

/// Match a JSON-RPC call by method name and exact params.
pub fn rpc_request(method: impl Into<String>, params: Value) -> RpcRequestMatcher {
    RpcRequestMatcher {
        method: method.into(),
        params: Some(params),
    }
}

impl Match for RpcRequestMatcher {
    fn matches(&self, req: &Request) -> bool {
        if req.method != Method::POST {
            return false;
        }

        match serde_json::from_slice::<RpcRequest>(&req.body) {
            Ok(rpc_req) => {
                rpc_req.method == self.method
                    && self.params.as_ref().map_or(true, |p| *p == rpc_req.params)
            }
            Err(_) => false,
        }
    }
}

pub struct RpcResponse {
    result: Value,
}

impl RpcResponse {
    pub fn new(result: Value) -> Self {
        Self { result }
    }
}

impl Respond for RpcResponse {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        match serde_json::from_slice::<RpcRequest>(&req.body) {
            Ok(rpc_req) => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": rpc_req.id,
                "result": self.result,
            })),
            Err(_) => ResponseTemplate::new(400),
        }
    }
}

pub struct RpcErrorResponse {
    message: String,
}

impl RpcErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Respond for RpcErrorResponse {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        match serde_json::from_slice::<RpcRequest>(&req.body) {
            Ok(rpc_req) => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": rpc_req.id,
                "error": {
                    "code": -32000,
                    "message": self.message,
                }
            })),
            Err(_) => ResponseTemplate::new(400),
        }
    }
}
