//! Codec module - key and value serialization.
//!
//! A [`Codec`] turns application keys and values into the byte sequences that
//! travel in request frames, and decodes values returned by GET.
//!
//! - [`RawCodec`] - Pass-through for raw bytes (zero-copy)
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//!
//! # Example
//!
//! ```
//! use shardcache_client::codec::{Codec, MsgPackCodec, RawCodec};
//! use bytes::Bytes;
//!
//! // MsgPack codec for structured data
//! let codec = MsgPackCodec::<String>::new();
//! let encoded = codec.encode_value(&"hello".to_string()).unwrap();
//! assert_eq!(codec.decode_value(&encoded).unwrap(), "hello");
//!
//! // Raw codec for binary data
//! let raw = RawCodec.encode_value(&Bytes::from_static(b"binary data")).unwrap();
//! assert_eq!(&raw[..], b"binary data");
//! ```

mod msgpack;
mod raw;

use bytes::Bytes;

use crate::error::Result;

pub use msgpack::MsgPackCodec;
pub use raw::RawCodec;

/// Converts keys and values to wire bytes and back.
pub trait Codec: Send + Sync {
    /// Application value type.
    type Value: Send;

    /// Encode a key. The default uses the UTF-8 bytes of the key.
    fn encode_key(&self, key: &str) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(key.as_bytes()))
    }

    /// Encode a value for a SET request.
    fn encode_value(&self, value: &Self::Value) -> Result<Bytes>;

    /// Decode a value returned by GET.
    fn decode_value(&self, bytes: &Bytes) -> Result<Self::Value>;
}
