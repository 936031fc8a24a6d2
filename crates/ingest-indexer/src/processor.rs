//! Per-block ingestion.
//!
//! A block is processed as a tree of independent units: the block itself,
//! each of its transactions, each transaction's receipt, and each log in the
//! receipt. A failure is contained at the smallest unit it occurs in and is
//! recorded in the returned [`BlockReport`]; siblings keep going.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use std::sync::Arc;

use ingest_common::{DecodedLog, EventLog, IngestError, Receipt, ReceiptLog};

use crate::chain::ChainClient;
use crate::explorer::Explorer;
use crate::store::{InsertOutcome, Store};
use crate::telemetry;

/// Anything that can ingest a block by number. Drivers depend on this seam so
/// they can be exercised without a chain or a database.
#[async_trait]
pub trait ProcessBlock: Send + Sync {
    async fn process_block(&self, number: u64) -> BlockReport;
}

/// The unit a skip applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Transaction(TxHash),
    Receipt(TxHash),
    Log { tx_hash: TxHash, log_index: u64 },
    Enrichment { tx_hash: TxHash, log_index: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    ContractInfoUnavailable(String),
    DecodeUnavailable,
    Failed { kind: &'static str, message: String },
}

impl SkipReason {
    fn failed(e: &IngestError) -> Self {
        SkipReason::Failed {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub unit: Unit,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Processed,
    NotFound,
    /// Fetching the block or inserting its row failed; no children were attempted.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub number: u64,
    pub outcome: BlockOutcome,
    pub transactions_seen: usize,
    pub transactions_inserted: usize,
    pub logs_inserted: usize,
    pub decoded_logs_inserted: usize,
    /// Inserts that hit an existing row (another driver got there first).
    pub duplicates: usize,
    pub skips: Vec<Skip>,
}

impl BlockReport {
    fn new(number: u64) -> Self {
        Self {
            number,
            outcome: BlockOutcome::Processed,
            transactions_seen: 0,
            transactions_inserted: 0,
            logs_inserted: 0,
            decoded_logs_inserted: 0,
            duplicates: 0,
            skips: Vec::new(),
        }
    }

    pub fn is_processed(&self) -> bool {
        self.outcome == BlockOutcome::Processed
    }

    pub fn is_not_found(&self) -> bool {
        self.outcome == BlockOutcome::NotFound
    }

    pub fn skipped_transactions(&self) -> usize {
        self.skips
            .iter()
            .filter(|s| matches!(s.unit, Unit::Transaction(_)))
            .count()
    }

    pub fn skipped_enrichments(&self) -> usize {
        self.skips
            .iter()
            .filter(|s| matches!(s.unit, Unit::Enrichment { .. }))
            .count()
    }

    fn skip(&mut self, unit: Unit, reason: SkipReason) {
        self.skips.push(Skip { unit, reason });
    }

    /// Count an insert; returns true when a new row was written.
    fn record(&mut self, outcome: InsertOutcome) -> bool {
        match outcome {
            InsertOutcome::Inserted => true,
            InsertOutcome::Duplicate => {
                self.duplicates += 1;
                false
            }
        }
    }
}

pub struct BlockProcessor {
    chain: Arc<dyn ChainClient>,
    explorer: Arc<dyn Explorer>,
    store: Arc<dyn Store>,
}

impl BlockProcessor {
    pub fn new(chain: Arc<dyn ChainClient>, explorer: Arc<dyn Explorer>, store: Arc<dyn Store>) -> Self {
        Self { chain, explorer, store }
    }

    async fn process_transaction(&self, report: &mut BlockReport, hash: TxHash) {
        let transaction = match self.chain.get_transaction(hash).await {
            Ok(Some(transaction)) => transaction,
            Ok(None) => {
                tracing::warn!("Transaction {:?} not found, skipping", hash);
                report.skip(Unit::Transaction(hash), SkipReason::NotFound);
                return;
            }
            Err(e) => {
                tracing::error!("Error fetching transaction {:?}: {}", hash, e);
                report.skip(Unit::Transaction(hash), SkipReason::failed(&e));
                return;
            }
        };

        match self.store.insert_transaction(&transaction).await {
            Ok(outcome) => {
                if report.record(outcome) {
                    report.transactions_inserted += 1;
                }
            }
            Err(e) => {
                // Without the parent row its logs would be orphaned
                tracing::error!("Error inserting transaction {:?}: {}", hash, e);
                report.skip(Unit::Transaction(hash), SkipReason::failed(&e));
                return;
            }
        }

        let receipt = match self.chain.get_receipt(hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                tracing::warn!("Receipt for transaction {:?} not found, skipping logs", hash);
                report.skip(Unit::Receipt(hash), SkipReason::NotFound);
                return;
            }
            Err(e) => {
                tracing::error!("Error fetching receipt for transaction {:?}: {}", hash, e);
                report.skip(Unit::Receipt(hash), SkipReason::failed(&e));
                return;
            }
        };

        for log in &receipt.logs {
            self.process_log(report, log, &receipt).await;
        }
    }

    async fn process_log(&self, report: &mut BlockReport, log: &ReceiptLog, receipt: &Receipt) {
        let row = EventLog::from_receipt_log(log);
        match self.store.insert_log(&row).await {
            Ok(outcome) => {
                if report.record(outcome) {
                    report.logs_inserted += 1;
                }
            }
            Err(e) => {
                tracing::error!(
                    "Error inserting log for tx {:?}, index {}: {}",
                    log.tx_hash,
                    log.log_index,
                    e
                );
                report.skip(
                    Unit::Log {
                        tx_hash: log.tx_hash,
                        log_index: log.log_index,
                    },
                    SkipReason::failed(&e),
                );
                return;
            }
        }

        if let Err(reason) = self.enrich_log(report, log, receipt.status).await {
            tracing::warn!(
                "Skipping log processing for tx {:?}, index {} due to missing data: {:?}",
                log.tx_hash,
                log.log_index,
                reason
            );
            report.skip(
                Unit::Enrichment {
                    tx_hash: log.tx_hash,
                    log_index: log.log_index,
                },
                reason,
            );
        }
    }

    /// Look up contract metadata and the decoding; store both only if both exist.
    async fn enrich_log(
        &self,
        report: &mut BlockReport,
        log: &ReceiptLog,
        is_successful: bool,
    ) -> Result<(), SkipReason> {
        let info = self
            .explorer
            .get_contract_info(log.address)
            .await
            .map_err(|e| SkipReason::ContractInfoUnavailable(e.to_string()))?;

        let call = self
            .explorer
            .decode_log(log)
            .await
            .ok_or(SkipReason::DecodeUnavailable)?;

        let row = DecodedLog::new(log, info, call, is_successful);
        let outcome = self
            .store
            .insert_decoded_log(&row)
            .await
            .map_err(|e| SkipReason::failed(&e))?;

        if report.record(outcome) {
            report.decoded_logs_inserted += 1;
        }
        Ok(())
    }

    fn record_metrics(report: &BlockReport) {
        let outcome = match report.outcome {
            BlockOutcome::Processed => "processed",
            BlockOutcome::NotFound => "not_found",
            BlockOutcome::Failed(_) => "failed",
        };
        metrics::counter!(telemetry::BLOCKS, "outcome" => outcome).increment(1);
        metrics::counter!(telemetry::TRANSACTIONS_INSERTED).increment(report.transactions_inserted as u64);
        metrics::counter!(telemetry::TRANSACTIONS_SKIPPED).increment(report.skipped_transactions() as u64);
        metrics::counter!(telemetry::LOGS_INSERTED).increment(report.logs_inserted as u64);
        metrics::counter!(telemetry::DECODED_LOGS_INSERTED).increment(report.decoded_logs_inserted as u64);
        metrics::counter!(telemetry::ENRICHMENT_SKIPPED).increment(report.skipped_enrichments() as u64);
    }
}

#[async_trait]
impl ProcessBlock for BlockProcessor {
    async fn process_block(&self, number: u64) -> BlockReport {
        let mut report = BlockReport::new(number);

        let fetched = match self.chain.get_block(number, true).await {
            Ok(Some(fetched)) => fetched,
            Ok(None) => {
                tracing::warn!("Block {} not found", number);
                report.outcome = BlockOutcome::NotFound;
                Self::record_metrics(&report);
                return report;
            }
            Err(e) => {
                tracing::error!("Error processing block {}: {}", number, e);
                report.outcome = BlockOutcome::Failed(e.to_string());
                Self::record_metrics(&report);
                return report;
            }
        };

        // A duplicate block row still gets its children walked: the other
        // writer may have stopped part way through.
        match self.store.insert_block(&fetched.block).await {
            Ok(outcome) => {
                report.record(outcome);
            }
            Err(e) => {
                tracing::error!("Error processing block {}: {}", number, e);
                report.outcome = BlockOutcome::Failed(e.to_string());
                Self::record_metrics(&report);
                return report;
            }
        }

        report.transactions_seen = fetched.transaction_hashes.len();
        for hash in fetched.transaction_hashes {
            self.process_transaction(&mut report, hash).await;
        }

        tracing::info!(
            "Processed block {} with {} transactions ({} logs, {} decoded, {} skipped)",
            number,
            report.transactions_seen,
            report.logs_inserted,
            report.decoded_logs_inserted,
            report.skips.len()
        );

        Self::record_metrics(&report);
        report
    }
}
