//! Protocol module - wire format, send buffering, and response decoding.
//!
//! This module implements the binary cache protocol:
//! - 17-byte request header plus key/value encoding
//! - Bounded send buffer reused across chunks of a batch
//! - Response decoder for accumulating partial reads

mod operation;
mod reason;
mod response_decoder;
mod send_buffer;
mod wire_format;

pub use operation::Operation;
pub use reason::ReasonCode;
pub use response_decoder::{encode_response, Response, ResponseDecoder};
pub use send_buffer::{SendBuffer, DEFAULT_WRITE_BUFFER_SIZE};
pub use wire_format::{
    decode_error_body, encode_error_body, flags, opcode, request_frame_len, RequestFrame,
    RequestHeader, ResponseHeader, CACHE_ID_SIZE, CATEGORY_CACHE, DEFAULT_MAX_VALUE_SIZE,
    ERROR_BODY_SIZE, MAX_KEY_LENGTH, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE,
    VALUE_LENGTH_SIZE,
};
