use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Explorer error: {0}")]
    Explorer(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Short label used in skip reasons and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Database(_) => "database",
            IngestError::Rpc(_) => "rpc",
            IngestError::RateLimited(_) => "rate_limited",
            IngestError::Explorer(_) => "explorer",
            IngestError::NotFound(_) => "not_found",
            IngestError::Config(_) => "config",
            IngestError::Internal(_) => "internal",
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, IngestError::RateLimited(_))
    }
}

impl From<RpcError<TransportErrorKind>> for IngestError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        IngestError::Rpc(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Internal(err.to_string())
    }
}
