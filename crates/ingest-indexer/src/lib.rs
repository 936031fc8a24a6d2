pub mod backfill;
pub mod chain;
pub mod config;
pub mod explorer;
pub mod processor;
pub mod retry;
pub mod store;
pub mod telemetry;
pub mod watcher;

pub use backfill::{BackfillSummary, Backfiller};
pub use chain::{ChainClient, RpcChainClient};
pub use config::Config;
pub use explorer::{Explorer, ExplorerClient};
pub use processor::{BlockOutcome, BlockProcessor, BlockReport, ProcessBlock, Skip, SkipReason, Unit};
pub use store::{InsertOutcome, PgStore, Store};
pub use watcher::{LiveWatcher, TickReport};
