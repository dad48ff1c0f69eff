//! Bounded, reusable send buffer.
//!
//! A session encodes request frames into the buffer until the next frame would
//! not fit, drains it to the socket (possibly over many partial writes), then
//! calls [`SendBuffer::reset`] and encodes the next chunk into the same
//! allocation.
//!
//! # Example
//!
//! ```
//! use shardcache_client::protocol::{opcode, flags, RequestFrame, SendBuffer};
//!
//! let mut buffer = SendBuffer::with_limit(64);
//! let frame = RequestFrame {
//!     opcode: opcode::DELETE_REQ,
//!     flags: flags::REPLY,
//!     cache_id: 0,
//!     group_id: 0,
//!     key: &b"key"[..],
//!     value: None,
//! };
//! buffer.push(&frame).unwrap();
//! assert_eq!(buffer.unsent().len(), 20);
//!
//! buffer.advance(20);
//! assert!(buffer.is_drained());
//! ```

use bytes::BytesMut;

use super::wire_format::RequestFrame;
use crate::error::{CacheError, Result};

/// Default send buffer limit (64 KiB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Outbound byte buffer with a soft size limit and a drain cursor.
#[derive(Debug)]
pub struct SendBuffer {
    /// Encoded frames of the current chunk.
    buf: BytesMut,
    /// Bytes of `buf` already written to the socket.
    sent: usize,
    /// Maximum bytes per chunk.
    limit: usize,
}

impl SendBuffer {
    /// Create a buffer that holds at most `limit` bytes per chunk.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit),
            sent: 0,
            limit,
        }
    }

    /// Current per-chunk limit.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Space left in the current chunk.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buf.len())
    }

    /// Number of encoded bytes in the current chunk.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the current chunk holds no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one frame to the current chunk.
    ///
    /// A frame larger than the limit is accepted into an empty buffer, which
    /// grows to fit it; otherwise a frame that does not fit is rejected with
    /// [`CacheError::Capacity`] and the buffer is left untouched.
    pub fn push(&mut self, frame: &RequestFrame<'_>) -> Result<()> {
        let needed = frame.encoded_len();
        if needed > self.remaining() {
            if !self.buf.is_empty() {
                return Err(CacheError::Capacity {
                    needed,
                    available: self.remaining(),
                });
            }
            self.limit = needed;
            self.buf.reserve(needed);
        }
        frame.encode_into(&mut self.buf);
        Ok(())
    }

    /// Bytes encoded but not yet written.
    #[inline]
    pub fn unsent(&self) -> &[u8] {
        &self.buf[self.sent..]
    }

    /// Record that `n` bytes of [`unsent`](Self::unsent) were written.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.sent + n <= self.buf.len());
        self.sent = (self.sent + n).min(self.buf.len());
    }

    /// Check if every encoded byte has been written.
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.sent >= self.buf.len()
    }

    /// Start a new chunk, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.sent = 0;
    }
}

impl Default for SendBuffer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_WRITE_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{flags, opcode, REQUEST_HEADER_SIZE};

    fn delete_frame(key: &[u8]) -> RequestFrame<'_> {
        RequestFrame {
            opcode: opcode::DELETE_REQ,
            flags: flags::REPLY,
            cache_id: 0,
            group_id: 0,
            key,
            value: None,
        }
    }

    #[test]
    fn test_push_until_full() {
        // Room for exactly two 20-byte frames.
        let mut buffer = SendBuffer::with_limit(45);

        buffer.push(&delete_frame(b"aaa")).unwrap();
        buffer.push(&delete_frame(b"bbb")).unwrap();
        assert_eq!(buffer.len(), 40);
        assert_eq!(buffer.remaining(), 5);

        let result = buffer.push(&delete_frame(b"ccc"));
        assert!(matches!(
            result,
            Err(CacheError::Capacity {
                needed: 20,
                available: 5
            })
        ));
        // Rejected frame left no partial bytes behind.
        assert_eq!(buffer.len(), 40);
    }

    #[test]
    fn test_oversized_frame_grows_empty_buffer() {
        let mut buffer = SendBuffer::with_limit(8);
        let key = vec![b'k'; 100];

        buffer.push(&delete_frame(&key)).unwrap();
        assert_eq!(buffer.len(), REQUEST_HEADER_SIZE + 100);
        assert_eq!(buffer.limit(), REQUEST_HEADER_SIZE + 100);
    }

    #[test]
    fn test_partial_drain() {
        let mut buffer = SendBuffer::with_limit(64);
        buffer.push(&delete_frame(b"key")).unwrap();
        let all = buffer.unsent().to_vec();

        buffer.advance(7);
        assert!(!buffer.is_drained());
        assert_eq!(buffer.unsent(), &all[7..]);

        buffer.advance(all.len() - 7);
        assert!(buffer.is_drained());
        assert!(buffer.unsent().is_empty());
    }

    #[test]
    fn test_reset_keeps_allocation() {
        let mut buffer = SendBuffer::with_limit(1024);
        buffer.push(&delete_frame(b"first")).unwrap();
        buffer.advance(buffer.len());
        let capacity = buffer.buf.capacity();

        buffer.reset();
        assert!(buffer.is_empty());
        assert!(buffer.is_drained());
        assert_eq!(buffer.remaining(), 1024);
        assert!(buffer.buf.capacity() >= capacity);

        buffer.push(&delete_frame(b"second")).unwrap();
        assert_eq!(&buffer.unsent()[REQUEST_HEADER_SIZE..], b"second");
    }

    #[test]
    fn test_chunks_concatenate_to_frame_stream() {
        let keys: Vec<Vec<u8>> = (0..10).map(|i| format!("key-{}", i).into_bytes()).collect();
        let expected: Vec<u8> = keys.iter().flat_map(|k| delete_frame(k).to_vec()).collect();

        // Each frame is 22 bytes; 50 bytes holds two per chunk.
        let mut buffer = SendBuffer::with_limit(50);
        let mut wire = Vec::new();
        let mut next = 0;
        while next < keys.len() {
            buffer.reset();
            while next < keys.len() && buffer.push(&delete_frame(&keys[next])).is_ok() {
                next += 1;
            }
            // Drain in 3-byte writes.
            while !buffer.is_drained() {
                let n = buffer.unsent().len().min(3);
                wire.extend_from_slice(&buffer.unsent()[..n]);
                buffer.advance(n);
            }
        }

        assert_eq!(wire, expected);
    }
}
