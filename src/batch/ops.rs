//! Per-operation specializations of the batch engine.
//!
//! Each facade fixes the frame shape through [`BatchOperation::OPERATION`]
//! and interprets success responses in [`BatchOperation::on_success`]:
//!
//! | Facade | Success side effect |
//! |---|---|
//! | [`BatchGet`] | decode value into the item, refresh local cache |
//! | [`BatchSet`] | store new token on the item, refresh local cache |
//! | [`BatchDelete`] | invalidate local cache entry |

use bytes::Bytes;

use super::item::{BatchItem, LocalError, Outcome};
use crate::codec::Codec;
use crate::directory::Destination;
use crate::local_cache::{CachedValue, LocalCache};
use crate::protocol::{Operation, Response};

/// Everything a success handler may touch besides the item itself.
pub struct SuccessContext<'a, C> {
    /// Codec of the calling client.
    pub codec: &'a C,
    /// Local cache to keep consistent, if enabled.
    pub local_cache: Option<&'a dyn LocalCache>,
    /// Node that answered.
    pub destination: &'a Destination,
    /// Group identifier of the batch.
    pub group_id: u32,
    /// Encoded value sent with the request (SET only).
    pub written: Option<&'a Bytes>,
}

impl<C> SuccessContext<'_, C> {
    fn update_local_cache(&self, key: &str, value: Option<CachedValue>) {
        if let Some(cache) = self.local_cache {
            cache.invalidate_or_update(self.destination, self.group_id, key, value);
        }
    }
}

/// One batchable operation.
pub trait BatchOperation {
    /// Frame shape and expected success opcode.
    const OPERATION: Operation;

    /// Apply a success response to its item and return the outcome.
    ///
    /// Local cache side effects must happen here, before the caller counts
    /// the success.
    fn on_success<C: Codec>(
        ctx: &SuccessContext<'_, C>,
        item: &mut BatchItem<C::Value>,
        response: Response,
    ) -> Outcome;
}

/// Batch GET.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchGet;

impl BatchOperation for BatchGet {
    const OPERATION: Operation = Operation::Get;

    fn on_success<C: Codec>(
        ctx: &SuccessContext<'_, C>,
        item: &mut BatchItem<C::Value>,
        response: Response,
    ) -> Outcome {
        let Response::Value { cache_id, value } = response else {
            return Outcome::Local(LocalError::DecodeFailed);
        };
        match ctx.codec.decode_value(&value) {
            Ok(decoded) => {
                ctx.update_local_cache(&item.key, Some(CachedValue::new(cache_id, value)));
                item.value = Some(decoded);
                item.cache_id = cache_id;
                Outcome::Success
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to decode value of {} from {}: {}",
                    item.key,
                    ctx.destination,
                    e
                );
                Outcome::Local(LocalError::DecodeFailed)
            }
        }
    }
}

/// Batch SET.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSet;

impl BatchOperation for BatchSet {
    const OPERATION: Operation = Operation::Set;

    fn on_success<C: Codec>(
        ctx: &SuccessContext<'_, C>,
        item: &mut BatchItem<C::Value>,
        response: Response,
    ) -> Outcome {
        let Response::Stored { cache_id } = response else {
            return Outcome::Local(LocalError::DecodeFailed);
        };
        let cached = ctx
            .written
            .map(|data| CachedValue::new(cache_id, data.clone()));
        ctx.update_local_cache(&item.key, cached);
        item.cache_id = cache_id;
        Outcome::Success
    }
}

/// Batch DELETE.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchDelete;

impl BatchOperation for BatchDelete {
    const OPERATION: Operation = Operation::Delete;

    fn on_success<C: Codec>(
        ctx: &SuccessContext<'_, C>,
        item: &mut BatchItem<C::Value>,
        response: Response,
    ) -> Outcome {
        if response != Response::Deleted {
            return Outcome::Local(LocalError::DecodeFailed);
        }
        ctx.update_local_cache(&item.key, None);
        Outcome::Success
    }
}
