use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use ingest_common::IngestError;

use crate::chain::ChainClient;
use crate::processor::{BlockReport, ProcessBlock};
use crate::telemetry;

/// Result of a single poll.
#[derive(Debug)]
pub struct TickReport {
    pub head: u64,
    /// One report per block in the gap, in ascending order.
    pub reports: Vec<BlockReport>,
}

/// Follows the chain head. Holds a watermark of the last head it caught up
/// to and, on each tick, processes every block above it.
pub struct LiveWatcher {
    chain: Arc<dyn ChainClient>,
    processor: Arc<dyn ProcessBlock>,
    interval: Duration,
    watermark: u64,
}

impl LiveWatcher {
    /// Start watching from the current head; blocks at or below it are left
    /// to the backfiller.
    pub async fn start(
        chain: Arc<dyn ChainClient>,
        processor: Arc<dyn ProcessBlock>,
        interval: Duration,
    ) -> Result<Self, IngestError> {
        let head = chain.head_height().await?;
        tracing::info!("Live watcher starting at block {}", head);
        Ok(Self::with_watermark(chain, processor, interval, head))
    }

    pub fn with_watermark(
        chain: Arc<dyn ChainClient>,
        processor: Arc<dyn ProcessBlock>,
        interval: Duration,
        watermark: u64,
    ) -> Self {
        metrics::gauge!(telemetry::WATERMARK).set(watermark as f64);
        Self {
            chain,
            processor,
            interval,
            watermark,
        }
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Check the head once and process any new blocks. The watermark moves
    /// to the observed head once the gap has been walked, whatever the
    /// individual block outcomes were. A failed head read leaves it as is.
    pub async fn poll_once(&mut self) -> Result<TickReport, IngestError> {
        let head = self.chain.head_height().await?;
        tracing::debug!("Chain head: {}, watermark: {}", head, self.watermark);

        let mut reports = Vec::new();
        if head > self.watermark {
            for number in (self.watermark + 1)..=head {
                reports.push(self.processor.process_block(number).await);
            }

            let failed = reports.iter().filter(|r| !r.is_processed()).count();
            if failed > 0 {
                tracing::warn!(
                    "{} of {} new blocks were not ingested ({} to {})",
                    failed,
                    reports.len(),
                    self.watermark + 1,
                    head
                );
            }

            self.watermark = head;
            metrics::gauge!(telemetry::WATERMARK).set(head as f64);
        }

        Ok(TickReport { head, reports })
    }

    /// Poll forever on the configured interval. The first poll happens one
    /// interval after the call.
    pub async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = self.poll_once().await {
                tracing::error!("Failed to read chain head: {}. Watermark stays at {}", e, self.watermark);
            }
        }
    }
}
