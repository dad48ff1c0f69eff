//! Response decoder for one connection.
//!
//! Uses `bytes::BytesMut` to accumulate socket reads and a state machine to
//! cut the stream into responses, whatever the read boundaries:
//! - `WaitingForHeader`: need the 2-byte response header
//! - `WaitingForBody`: success header seen, need the fixed body prefix
//! - `WaitingForValue`: GET prefix parsed, need N value bytes
//! - `WaitingForError`: non-success header seen, need the 2-byte reason code
//!
//! Responses come out in wire order; the caller pairs the Nth response with
//! the Nth request it sent.
//!
//! # Example
//!
//! ```
//! use shardcache_client::protocol::{opcode, Operation, Response, ResponseDecoder, ResponseHeader};
//!
//! let mut decoder = ResponseDecoder::new(Operation::Delete);
//! let bytes = ResponseHeader::new(opcode::DELETE_RES).encode();
//!
//! assert!(decoder.push(&bytes[..1]).unwrap().is_empty());
//! assert_eq!(decoder.push(&bytes[1..]).unwrap(), vec![Response::Deleted]);
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::operation::Operation;
use super::reason::ReasonCode;
use super::wire_format::{
    decode_error_body, ResponseHeader, DEFAULT_MAX_VALUE_SIZE, ERROR_BODY_SIZE,
    RESPONSE_HEADER_SIZE,
};
use crate::error::{CacheError, Result};

/// Initial read accumulation capacity.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// One decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// GET succeeded.
    Value {
        /// Version token of the stored item.
        cache_id: u64,
        /// Encoded value.
        value: Bytes,
    },
    /// SET succeeded.
    Stored {
        /// New version token.
        cache_id: u64,
    },
    /// DELETE succeeded.
    Deleted,
    /// Server reported a per-item error.
    Error(ReasonCode),
}

impl Response {
    /// Check if this is a success response.
    #[inline]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error(_))
    }
}

/// State machine for response parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForHeader,
    WaitingForBody,
    WaitingForValue { cache_id: u64, remaining: usize },
    WaitingForError,
}

/// Accumulates response bytes and extracts complete responses.
pub struct ResponseDecoder {
    /// Operation every response on this connection answers.
    operation: Operation,
    /// Bytes read but not yet consumed.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum accepted GET value size.
    max_value_size: usize,
}

impl ResponseDecoder {
    /// Create a decoder with the default value size limit.
    pub fn new(operation: Operation) -> Self {
        Self::with_max_value_size(operation, DEFAULT_MAX_VALUE_SIZE)
    }

    /// Create a decoder with a custom value size limit.
    pub fn with_max_value_size(operation: Operation, max_value_size: usize) -> Self {
        Self {
            operation,
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            state: State::WaitingForHeader,
            max_value_size,
        }
    }

    /// Push bytes read from the socket and extract all complete responses.
    ///
    /// Incomplete trailing data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a GET response declares a value larger than the limit.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Response>> {
        self.extend(data);

        let mut responses = Vec::new();
        while let Some(response) = self.next_response()? {
            responses.push(response);
        }
        Ok(responses)
    }

    /// Buffer bytes without decoding them.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Decode the next complete response from the buffered bytes.
    ///
    /// Responses before a malformed one are still returned one by one; the
    /// error surfaces only when the malformed response is reached.
    pub fn next_response(&mut self) -> Result<Option<Response>> {
        match self.state {
            State::WaitingForHeader => {
                if self.buffer.len() < RESPONSE_HEADER_SIZE {
                    return Ok(None);
                }
                let header = ResponseHeader::decode(&self.buffer[..RESPONSE_HEADER_SIZE])
                    .ok_or_else(|| CacheError::Protocol("short response header".to_string()))?;
                self.buffer.advance(RESPONSE_HEADER_SIZE);

                if !header.is_success_for(self.operation.success_opcode()) {
                    self.state = State::WaitingForError;
                } else if self.operation.success_prefix_len() == 0 {
                    return Ok(Some(Response::Deleted));
                } else {
                    self.state = State::WaitingForBody;
                }
                self.next_response()
            }

            State::WaitingForBody => {
                let prefix = self.operation.success_prefix_len();
                if self.buffer.len() < prefix {
                    return Ok(None);
                }
                let cache_id = self.buffer.get_u64();
                match self.operation {
                    Operation::Get => {
                        let remaining = self.buffer.get_u32() as usize;
                        if remaining > self.max_value_size {
                            return Err(CacheError::Protocol(format!(
                                "Value size {} exceeds maximum {}",
                                remaining, self.max_value_size
                            )));
                        }
                        self.state = State::WaitingForValue {
                            cache_id,
                            remaining,
                        };
                        self.next_response()
                    }
                    _ => {
                        self.state = State::WaitingForHeader;
                        Ok(Some(Response::Stored { cache_id }))
                    }
                }
            }

            State::WaitingForValue {
                cache_id,
                remaining,
            } => {
                if self.buffer.len() < remaining {
                    return Ok(None);
                }
                let value = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForHeader;
                Ok(Some(Response::Value { cache_id, value }))
            }

            State::WaitingForError => {
                if self.buffer.len() < ERROR_BODY_SIZE {
                    return Ok(None);
                }
                let reason = decode_error_body(&self.buffer[..ERROR_BODY_SIZE])
                    .ok_or_else(|| CacheError::Protocol("short error body".to_string()))?;
                self.buffer.advance(ERROR_BODY_SIZE);
                self.state = State::WaitingForHeader;
                Ok(Some(Response::Error(reason)))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if no response is partially decoded.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::WaitingForHeader) && self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody => "WaitingForBody",
            State::WaitingForValue { .. } => "WaitingForValue",
            State::WaitingForError => "WaitingForError",
        }
    }
}

/// Encode a response as the server would send it.
///
/// Used by tests and fake servers; the client never sends responses.
pub fn encode_response(operation: Operation, response: &Response) -> Vec<u8> {
    let mut out = Vec::new();
    match response {
        Response::Error(reason) => {
            out.extend_from_slice(&ResponseHeader::new(super::opcode::ERROR_RES).encode());
            out.extend_from_slice(&reason.0.to_be_bytes());
        }
        Response::Deleted => {
            out.extend_from_slice(&ResponseHeader::new(operation.success_opcode()).encode());
        }
        Response::Stored { cache_id } => {
            out.extend_from_slice(&ResponseHeader::new(operation.success_opcode()).encode());
            out.extend_from_slice(&cache_id.to_be_bytes());
        }
        Response::Value { cache_id, value } => {
            out.extend_from_slice(&ResponseHeader::new(operation.success_opcode()).encode());
            out.extend_from_slice(&cache_id.to_be_bytes());
            out.extend_from_slice(&(value.len() as u32).to_be_bytes());
            out.extend_from_slice(value);
        }
    }
    out
}
