//! MsgPack codec using `rmp-serde`.
//!
//! Values are written with `to_vec_named` so structs are serialized as maps
//! (field names included) rather than positional arrays. Clients in other
//! languages reading the same keys expect the map form.
//!
//! # Example
//!
//! ```
//! use shardcache_client::codec::{Codec, MsgPackCodec};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Session {
//!     user: u32,
//!     token: String,
//! }
//!
//! let codec = MsgPackCodec::<Session>::new();
//! let value = Session { user: 42, token: "abc".to_string() };
//! let encoded = codec.encode_value(&value).unwrap();
//! assert_eq!(codec.decode_value(&encoded).unwrap(), value);
//! ```

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::Result;

/// MessagePack codec for values of type `T`.
pub struct MsgPackCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> MsgPackCodec<T> {
    /// Create a new codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for MsgPackCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MsgPackCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MsgPackCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MsgPackCodec")
    }
}

impl<T> Codec for MsgPackCodec<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    type Value = T;

    #[inline]
    fn encode_value(&self, value: &T) -> Result<Bytes> {
        // to_vec_named, not to_vec: structs must stay maps.
        Ok(Bytes::from(rmp_serde::to_vec_named(value)?))
    }

    #[inline]
    fn decode_value(&self, bytes: &Bytes) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        id: u32,
        name: String,
        active: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let codec = MsgPackCodec::<TestStruct>::new();
        let original = TestStruct {
            id: 42,
            name: "test".to_string(),
            active: true,
        };

        let encoded = codec.encode_value(&original).unwrap();
        assert_eq!(codec.decode_value(&encoded).unwrap(), original);
    }

    #[test]
    fn test_encode_decode_primitives() {
        let strings = MsgPackCodec::<String>::new();
        let encoded = strings.encode_value(&"hello world".to_string()).unwrap();
        assert_eq!(strings.decode_value(&encoded).unwrap(), "hello world");

        let numbers = MsgPackCodec::<i64>::new();
        let encoded = numbers.encode_value(&12345).unwrap();
        assert_eq!(numbers.decode_value(&encoded).unwrap(), 12345);
    }

    #[test]
    fn test_encode_decode_collections() {
        let codec = MsgPackCodec::<HashMap<String, i32>>::new();
        let mut map = HashMap::new();
        map.insert("key1".to_string(), 100);
        map.insert("key2".to_string(), 200);

        let encoded = codec.encode_value(&map).unwrap();
        assert_eq!(codec.decode_value(&encoded).unwrap(), map);
    }

    #[test]
    fn test_struct_as_map_format() {
        #[derive(Serialize)]
        struct Simple {
            field: i32,
        }

        let codec = MsgPackCodec::<i32>::new();
        let encoded = rmp_serde::to_vec_named(&Simple { field: 42 }).unwrap();

        // fixmap with 1 element is 0x81, fixarray would be 0x91
        assert_eq!(encoded[0], 0x81);
        // Decoding a map as i32 must fail rather than yield garbage.
        assert!(codec.decode_value(&Bytes::from(encoded)).is_err());
    }

    #[test]
    fn test_decode_invalid_data() {
        let codec = MsgPackCodec::<String>::new();
        let invalid = Bytes::from_static(&[0xC1]);
        let result = codec.decode_value(&invalid);
        assert!(matches!(
            result,
            Err(crate::error::CacheError::MsgPackDecode(_))
        ));
    }
}
