//! Batch items and their outcomes.

use std::fmt;

use thiserror::Error;

use crate::directory::Destination;
use crate::protocol::ReasonCode;

/// Why an item was rejected without a server answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LocalError {
    /// Key is empty or its encoding exceeds the 16-bit length field.
    #[error("invalid key")]
    InvalidKey,
    /// The codec failed to encode the key or value.
    #[error("encode failed")]
    EncodeFailed,
    /// SET item without a value.
    #[error("missing value")]
    MissingValue,
    /// Encoded value exceeds the configured maximum.
    #[error("value too large")]
    ValueTooLarge,
    /// The node directory has no destination for the key.
    #[error("no destination for key")]
    Unroutable,
    /// No transport could be obtained for the destination.
    #[error("no connection")]
    NoConnection,
    /// GET value arrived but could not be decoded.
    #[error("decode failed")]
    DecodeFailed,
}

/// Terminal result of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The server acknowledged the operation.
    Success,
    /// The server answered with an error frame.
    Failed(ReasonCode),
    /// The item was rejected on the client side.
    Local(LocalError),
}

impl Outcome {
    /// Check if the item succeeded.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Server reason code, if the server rejected the item.
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Failed(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed(reason) => write!(f, "server error {}", reason),
            Self::Local(err) => write!(f, "local error: {}", err),
        }
    }
}

/// One key operation inside a batch.
///
/// `outcome` is `None` until the item reaches a terminal state; it stays
/// `None` when the batch deadline or a transport fault cut the exchange off
/// before the item's response arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem<V> {
    /// Application key.
    pub key: String,
    /// Value to store (SET) or the decoded value (GET).
    pub value: Option<V>,
    /// Version token. Input for SET/DELETE (0 = unconditional), updated
    /// from the server after a successful GET or SET.
    pub cache_id: u64,
    /// Node the key was routed to.
    pub destination: Option<Destination>,
    /// Terminal result.
    pub outcome: Option<Outcome>,
}

impl<V> BatchItem<V> {
    /// Item without a value.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            cache_id: 0,
            destination: None,
            outcome: None,
        }
    }

    /// Item for a batch GET.
    pub fn get(key: impl Into<String>) -> Self {
        Self::new(key)
    }

    /// Item for a batch SET.
    pub fn set(key: impl Into<String>, value: V) -> Self {
        Self {
            value: Some(value),
            ..Self::new(key)
        }
    }

    /// Item for a batch DELETE.
    pub fn delete(key: impl Into<String>) -> Self {
        Self::new(key)
    }

    /// Set the expected version token.
    pub fn with_cache_id(mut self, cache_id: u64) -> Self {
        self.cache_id = cache_id;
        self
    }

    /// Check if the item succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.map_or(false, |outcome| outcome.is_success())
    }

    /// Clear per-call state before the item enters a batch.
    pub(crate) fn reset(&mut self) {
        self.destination = None;
        self.outcome = None;
    }
}

/// Aggregate result of a batch call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Number of items with [`Outcome::Success`].
    pub success_count: usize,
    /// Most recent failure seen during the call, for diagnostics.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let item: BatchItem<String> = BatchItem::set("k", "v".to_string()).with_cache_id(9);
        assert_eq!(item.key, "k");
        assert_eq!(item.value.as_deref(), Some("v"));
        assert_eq!(item.cache_id, 9);
        assert!(item.outcome.is_none());

        let item: BatchItem<String> = BatchItem::delete("k");
        assert!(item.value.is_none());
        assert_eq!(item.cache_id, 0);
    }

    #[test]
    fn test_reset_clears_call_state() {
        let mut item: BatchItem<String> = BatchItem::get("k");
        item.destination = Some(Destination::from("a:1"));
        item.outcome = Some(Outcome::Success);
        assert!(item.is_success());

        item.reset();
        assert!(item.destination.is_none());
        assert!(item.outcome.is_none());
        assert!(!item.is_success());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Success.to_string(), "success");
        assert_eq!(
            Outcome::Local(LocalError::Unroutable).to_string(),
            "local error: no destination for key"
        );
        assert_eq!(
            Outcome::Failed(ReasonCode::NOT_FOUND).reason(),
            Some(ReasonCode::NOT_FOUND)
        );
        assert_eq!(Outcome::Success.reason(), None);
    }
}
