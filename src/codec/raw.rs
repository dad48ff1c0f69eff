//! Raw codec - pass-through for binary values.
//!
//! Used when values are already serialized by the application.
//!
//! # Example
//!
//! ```
//! use shardcache_client::codec::{Codec, RawCodec};
//! use bytes::Bytes;
//!
//! // Zero-copy with Bytes
//! let bytes = Bytes::from_static(b"zero copy");
//! let passed = RawCodec.encode_value(&bytes).unwrap();
//! assert_eq!(passed.as_ptr(), bytes.as_ptr()); // Same memory
//! ```

use bytes::Bytes;

use super::Codec;
use crate::error::Result;

/// Codec that passes bytes through without transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Value = Bytes;

    /// Returns a cheap clone of the input (same memory).
    #[inline]
    fn encode_value(&self, value: &Bytes) -> Result<Bytes> {
        Ok(value.clone())
    }

    #[inline]
    fn decode_value(&self, bytes: &Bytes) -> Result<Bytes> {
        Ok(bytes.clone())
    }
}
