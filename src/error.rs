//! Error types for shardcache-client.
//!
//! Per-item failures during a batch are never reported through this type;
//! they are recorded on the item itself as an [`Outcome`](crate::Outcome).
//! `CacheError` covers call-level faults and codec/protocol failures.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration loading).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol violation (oversized value, malformed frame, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A frame does not fit in the remaining send buffer space.
    #[error("Send buffer full: frame needs {needed} bytes, {available} available")]
    Capacity { needed: usize, available: usize },

    /// Encoded key does not fit the 16-bit key length field.
    #[error("Key too long: {0} bytes")]
    KeyTooLong(usize),

    /// Encoded value exceeds the configured maximum.
    #[error("Value size {size} exceeds maximum {max}")]
    ValueTooLarge { size: usize, max: usize },

    /// Batch call with no items.
    #[error("Batch is empty")]
    EmptyBatch,

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias using CacheError.
pub type Result<T> = std::result::Result<T, CacheError>;
