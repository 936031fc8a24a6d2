use std::sync::Arc;
use std::time::Instant;

use ingest_common::IngestError;

use crate::chain::ChainClient;
use crate::processor::{BlockOutcome, ProcessBlock};
use crate::telemetry;

/// Blocks between progress log lines.
const PROGRESS_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    /// Highest block visited (the head when the walk started).
    pub from: u64,
    /// Lowest block visited.
    pub to: u64,
    pub processed: u64,
    pub not_found: u64,
    pub failed: u64,
}

impl BackfillSummary {
    pub fn visited(&self) -> u64 {
        self.processed + self.not_found + self.failed
    }
}

/// Walks history once, from the head observed at start down to `stop_block`.
pub struct Backfiller {
    chain: Arc<dyn ChainClient>,
    processor: Arc<dyn ProcessBlock>,
    stop_block: u64,
}

impl Backfiller {
    pub fn new(chain: Arc<dyn ChainClient>, processor: Arc<dyn ProcessBlock>, stop_block: u64) -> Self {
        Self {
            chain,
            processor,
            stop_block,
        }
    }

    /// Read the head and walk down from it. Only the head read can fail; the
    /// upper bound is not refreshed while walking.
    pub async fn run(&self) -> Result<BackfillSummary, IngestError> {
        let head = self.chain.head_height().await?;
        tracing::info!("Backfilling from block {} down to {}", head, self.stop_block);

        let summary = self.walk(head).await;

        tracing::info!(
            "Backfill complete: {} blocks visited ({} processed, {} not found, {} failed)",
            summary.visited(),
            summary.processed,
            summary.not_found,
            summary.failed
        );
        Ok(summary)
    }

    /// Process every block from `from` down to the stop block, inclusive.
    pub async fn walk(&self, from: u64) -> BackfillSummary {
        let mut summary = BackfillSummary {
            from,
            to: self.stop_block,
            ..Default::default()
        };
        if from < self.stop_block {
            return summary;
        }

        let mut last_log_time = Instant::now();
        for number in (self.stop_block..=from).rev() {
            let report = self.processor.process_block(number).await;
            match report.outcome {
                BlockOutcome::Processed => summary.processed += 1,
                BlockOutcome::NotFound => summary.not_found += 1,
                BlockOutcome::Failed(_) => summary.failed += 1,
            }
            metrics::gauge!(telemetry::BACKFILL_CURSOR).set(number as f64);

            let visited = summary.visited();
            if visited % PROGRESS_INTERVAL == 0 {
                let elapsed = last_log_time.elapsed();
                let blocks_per_sec = PROGRESS_INTERVAL as f64 / elapsed.as_secs_f64();
                let total = from - self.stop_block + 1;
                let progress = (visited as f64 / total as f64) * 100.0;

                tracing::info!(
                    "Backfill at block {} ({:.1} blocks/sec) | Progress: {:.2}%",
                    number,
                    blocks_per_sec,
                    progress
                );
                last_log_time = Instant::now();
            }
        }

        summary
    }
}
