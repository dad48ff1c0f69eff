//! Wire format encoding and decoding.
//!
//! Request frame (17-byte fixed header, then key, then optional value):
//! ```text
//! ┌──────────┬────────┬───────┬──────────┬──────────┬─────────┬─────┬───────────┬───────┐
//! │ Category │ Opcode │ Flags │ Cache ID │ Group ID │ Key len │ Key │ Value len │ Value │
//! │ 1 byte   │ 1 byte │ 1 byte│ uint64 BE│ uint32 BE│ uint16 BE│  N │ uint32 BE │   M   │
//! └──────────┴────────┴───────┴──────────┴──────────┴─────────┴─────┴───────────┴───────┘
//!                                                                  └─ SET_REQ only ─────┘
//! ```
//!
//! Response frame: a 2-byte header `[category][opcode]`. When the opcode is the
//! expected success opcode for the request, an operation-specific body follows;
//! otherwise the body is a 2-byte big-endian reason code.
//!
//! There is no request ID on the wire. Responses are matched to requests by
//! arrival order on the connection.
//!
//! All multi-byte integers are Big Endian.

use bytes::BufMut;

use super::reason::ReasonCode;

/// Fixed request header size in bytes.
pub const REQUEST_HEADER_SIZE: usize = 17;

/// Fixed response header size in bytes.
pub const RESPONSE_HEADER_SIZE: usize = 2;

/// Size of the error body that follows a non-success response header.
pub const ERROR_BODY_SIZE: usize = 2;

/// Size of the value length prefix in SET requests and GET responses.
pub const VALUE_LENGTH_SIZE: usize = 4;

/// Size of the version token (cache ID) field.
pub const CACHE_ID_SIZE: usize = 8;

/// Maximum encoded key length (16-bit length field).
pub const MAX_KEY_LENGTH: usize = u16::MAX as usize;

/// Default maximum value size (16 MiB).
pub const DEFAULT_MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

/// Category byte for cache operations.
pub const CATEGORY_CACHE: u8 = 0x01;

/// Opcode constants.
pub mod opcode {
    /// Get request.
    pub const GET_REQ: u8 = 0x01;
    /// Get success response.
    pub const GET_RES: u8 = 0x02;
    /// Set request.
    pub const SET_REQ: u8 = 0x03;
    /// Set success response.
    pub const SET_RES: u8 = 0x04;
    /// Delete request.
    pub const DELETE_REQ: u8 = 0x05;
    /// Delete success response.
    pub const DELETE_RES: u8 = 0x06;
    /// Error response (any non-matching opcode is handled the same way).
    pub const ERROR_RES: u8 = 0x7F;

    /// Whether request frames with this opcode carry a value section.
    #[inline]
    pub fn carries_value(op: u8) -> bool {
        op == SET_REQ
    }
}

/// Request flag constants.
pub mod flags {
    /// No flags.
    pub const NONE: u8 = 0x00;
    /// Ask the server to acknowledge a write.
    pub const REPLY: u8 = 0b0000_0001;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Decoded fixed part of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Category byte (always [`CATEGORY_CACHE`] for this client).
    pub category: u8,
    /// Request opcode.
    pub opcode: u8,
    /// Request flags (see [`flags`]).
    pub flags: u8,
    /// Version token; 0 means unconditional.
    pub cache_id: u64,
    /// Group (namespace) identifier.
    pub group_id: u32,
    /// Key length in bytes.
    pub key_length: u16,
}

impl RequestHeader {
    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `REQUEST_HEADER_SIZE` (17 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= REQUEST_HEADER_SIZE);
        buf[0] = self.category;
        buf[1] = self.opcode;
        buf[2] = self.flags;
        buf[3..11].copy_from_slice(&self.cache_id.to_be_bytes());
        buf[11..15].copy_from_slice(&self.group_id.to_be_bytes());
        buf[15..17].copy_from_slice(&self.key_length.to_be_bytes());
    }

    /// Encode header to bytes.
    pub fn encode(&self) -> [u8; REQUEST_HEADER_SIZE] {
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < REQUEST_HEADER_SIZE {
            return None;
        }
        let mut cache_id = [0u8; 8];
        cache_id.copy_from_slice(&buf[3..11]);
        Some(Self {
            category: buf[0],
            opcode: buf[1],
            flags: buf[2],
            cache_id: u64::from_be_bytes(cache_id),
            group_id: u32::from_be_bytes([buf[11], buf[12], buf[13], buf[14]]),
            key_length: u16::from_be_bytes([buf[15], buf[16]]),
        })
    }
}

/// A request frame borrowing its key and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame<'a> {
    /// Request opcode.
    pub opcode: u8,
    /// Request flags.
    pub flags: u8,
    /// Version token.
    pub cache_id: u64,
    /// Group identifier.
    pub group_id: u32,
    /// Encoded key.
    pub key: &'a [u8],
    /// Encoded value (SET only).
    pub value: Option<&'a [u8]>,
}

impl<'a> RequestFrame<'a> {
    /// Total encoded length of this frame.
    ///
    /// # Example
    ///
    /// ```
    /// use shardcache_client::protocol::{opcode, flags, RequestFrame, REQUEST_HEADER_SIZE};
    ///
    /// let frame = RequestFrame {
    ///     opcode: opcode::SET_REQ,
    ///     flags: flags::REPLY,
    ///     cache_id: 0,
    ///     group_id: 0,
    ///     key: &b"user:1"[..],
    ///     value: Some(&b"alice"[..]),
    /// };
    /// assert_eq!(frame.encoded_len(), REQUEST_HEADER_SIZE + 6 + 4 + 5);
    /// ```
    pub fn encoded_len(&self) -> usize {
        request_frame_len(self.key.len(), self.value.map(<[u8]>::len))
    }

    /// Fixed header for this frame.
    ///
    /// The caller is responsible for keeping `key.len()` within
    /// [`MAX_KEY_LENGTH`]; longer keys are rejected before a frame is built.
    pub fn header(&self) -> RequestHeader {
        RequestHeader {
            category: CATEGORY_CACHE,
            opcode: self.opcode,
            flags: self.flags,
            cache_id: self.cache_id,
            group_id: self.group_id,
            key_length: self.key.len() as u16,
        }
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.header().encode());
        buf.put_slice(self.key);
        if let Some(value) = self.value {
            buf.put_u32(value.len() as u32);
            buf.put_slice(value);
        }
    }

    /// Encode the frame into a fresh vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode one request frame from the front of `buf`.
    ///
    /// Returns the frame and the number of bytes it occupied, or `None` if
    /// `buf` does not yet hold a complete frame.
    pub fn decode(buf: &'a [u8]) -> Option<(Self, usize)> {
        let header = RequestHeader::decode(buf)?;
        let key_end = REQUEST_HEADER_SIZE + header.key_length as usize;
        if buf.len() < key_end {
            return None;
        }
        let key = &buf[REQUEST_HEADER_SIZE..key_end];

        let (value, consumed) = if opcode::carries_value(header.opcode) {
            let len_end = key_end + VALUE_LENGTH_SIZE;
            if buf.len() < len_end {
                return None;
            }
            let value_len = u32::from_be_bytes([
                buf[key_end],
                buf[key_end + 1],
                buf[key_end + 2],
                buf[key_end + 3],
            ]) as usize;
            let value_end = len_end + value_len;
            if buf.len() < value_end {
                return None;
            }
            (Some(&buf[len_end..value_end]), value_end)
        } else {
            (None, key_end)
        };

        Some((
            Self {
                opcode: header.opcode,
                flags: header.flags,
                cache_id: header.cache_id,
                group_id: header.group_id,
                key,
                value,
            },
            consumed,
        ))
    }
}

/// Encoded length of a request frame with the given key and value sizes.
#[inline]
pub fn request_frame_len(key_len: usize, value_len: Option<usize>) -> usize {
    REQUEST_HEADER_SIZE + key_len + value_len.map_or(0, |len| VALUE_LENGTH_SIZE + len)
}

/// Decoded response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Category byte.
    pub category: u8,
    /// Response opcode.
    pub opcode: u8,
}

impl ResponseHeader {
    /// Create a new response header in the cache category.
    pub fn new(opcode: u8) -> Self {
        Self {
            category: CATEGORY_CACHE,
            opcode,
        }
    }

    /// Encode header to bytes.
    pub fn encode(&self) -> [u8; RESPONSE_HEADER_SIZE] {
        [self.category, self.opcode]
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < RESPONSE_HEADER_SIZE {
            return None;
        }
        Some(Self {
            category: buf[0],
            opcode: buf[1],
        })
    }

    /// Whether this header announces the success body for `expected`.
    #[inline]
    pub fn is_success_for(&self, expected: u8) -> bool {
        self.category == CATEGORY_CACHE && self.opcode == expected
    }
}

/// Decode the 2-byte error body that follows a non-success header.
///
/// Returns `None` if buffer is too short.
#[inline]
pub fn decode_error_body(buf: &[u8]) -> Option<ReasonCode> {
    if buf.len() < ERROR_BODY_SIZE {
        return None;
    }
    Some(ReasonCode(u16::from_be_bytes([buf[0], buf[1]])))
}

/// Encode a reason code as an error body.
#[inline]
pub fn encode_error_body(reason: ReasonCode) -> [u8; ERROR_BODY_SIZE] {
    reason.0.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_frame<'a>(key: &'a [u8], value: &'a [u8]) -> RequestFrame<'a> {
        RequestFrame {
            opcode: opcode::SET_REQ,
            flags: flags::REPLY,
            cache_id: 0x0102_0304_0506_0708,
            group_id: 0x0A0B_0C0D,
            key,
            value: Some(value),
        }
    }

    #[test]
    fn test_request_header_size_is_exactly_17() {
        assert_eq!(REQUEST_HEADER_SIZE, 17);
        let frame = RequestFrame {
            opcode: opcode::DELETE_REQ,
            flags: flags::REPLY,
            cache_id: 0,
            group_id: 0,
            key: b"",
            value: None,
        };
        assert_eq!(frame.header().encode().len(), 17);
        assert_eq!(frame.encoded_len(), 17);
    }

    #[test]
    fn test_request_header_big_endian_byte_order() {
        let bytes = set_frame(b"k", b"v").to_vec();

        assert_eq!(bytes[0], CATEGORY_CACHE);
        assert_eq!(bytes[1], opcode::SET_REQ);
        assert_eq!(bytes[2], flags::REPLY);
        assert_eq!(&bytes[3..11], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[11..15], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&bytes[15..17], &[0, 1]);
        assert_eq!(bytes[17], b'k');
        assert_eq!(&bytes[18..22], &[0, 0, 0, 1]);
        assert_eq!(bytes[22], b'v');
        assert_eq!(bytes.len(), 23);
    }

    #[test]
    fn test_request_frame_roundtrip_with_value() {
        let original = set_frame(b"user:42", b"some value bytes");
        let bytes = original.to_vec();

        let (decoded, consumed) = RequestFrame::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_request_frame_roundtrip_without_value() {
        let original = RequestFrame {
            opcode: opcode::GET_REQ,
            flags: flags::NONE,
            cache_id: 7,
            group_id: 315,
            key: b"xixi",
            value: None,
        };
        let bytes = original.to_vec();
        let (decoded, consumed) = RequestFrame::decode(&bytes).unwrap();
        assert_eq!(consumed, REQUEST_HEADER_SIZE + 4);
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_request_frame_decode_incomplete() {
        let bytes = set_frame(b"key", b"value").to_vec();
        for cut in [0, 5, REQUEST_HEADER_SIZE, REQUEST_HEADER_SIZE + 3, bytes.len() - 1] {
            assert!(RequestFrame::decode(&bytes[..cut]).is_none(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_request_frame_decode_leaves_trailing_bytes() {
        let mut bytes = set_frame(b"a", b"b").to_vec();
        let first_len = bytes.len();
        bytes.extend_from_slice(&[0xFF; 3]);

        let (_, consumed) = RequestFrame::decode(&bytes).unwrap();
        assert_eq!(consumed, first_len);
    }

    #[test]
    fn test_response_header_roundtrip() {
        let header = ResponseHeader::new(opcode::DELETE_RES);
        let decoded = ResponseHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.is_success_for(opcode::DELETE_RES));
        assert!(!decoded.is_success_for(opcode::SET_RES));
    }

    #[test]
    fn test_response_header_wrong_category_is_not_success() {
        let header = ResponseHeader {
            category: 0x02,
            opcode: opcode::GET_RES,
        };
        assert!(!header.is_success_for(opcode::GET_RES));
    }

    #[test]
    fn test_error_body_roundtrip() {
        let body = encode_error_body(ReasonCode::MISMATCH);
        assert_eq!(body, [0, 4]);
        assert_eq!(decode_error_body(&body), Some(ReasonCode::MISMATCH));
        assert_eq!(decode_error_body(&body[..1]), None);
    }

    #[test]
    fn test_frame_len_helper() {
        assert_eq!(request_frame_len(3, None), 20);
        assert_eq!(request_frame_len(3, Some(10)), 34);
    }
}
