//! Batchable operations and their frame shapes.

use std::fmt;

use super::wire_format::{flags, opcode, CACHE_ID_SIZE, VALUE_LENGTH_SIZE};

/// Operation kind shared by every frame of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Fetch values.
    Get,
    /// Store values.
    Set,
    /// Remove keys.
    Delete,
}

impl Operation {
    /// Opcode of request frames.
    #[inline]
    pub fn request_opcode(self) -> u8 {
        match self {
            Self::Get => opcode::GET_REQ,
            Self::Set => opcode::SET_REQ,
            Self::Delete => opcode::DELETE_REQ,
        }
    }

    /// Opcode announcing a success body.
    #[inline]
    pub fn success_opcode(self) -> u8 {
        match self {
            Self::Get => opcode::GET_RES,
            Self::Set => opcode::SET_RES,
            Self::Delete => opcode::DELETE_RES,
        }
    }

    /// Flags byte of request frames.
    #[inline]
    pub fn request_flags(self) -> u8 {
        match self {
            Self::Get => flags::NONE,
            Self::Set | Self::Delete => flags::REPLY,
        }
    }

    /// Whether request frames carry a value section.
    #[inline]
    pub fn carries_value(self) -> bool {
        matches!(self, Self::Set)
    }

    /// Size of the fixed part of the success body.
    ///
    /// GET is followed by a variable-length value after this prefix.
    #[inline]
    pub fn success_prefix_len(self) -> usize {
        match self {
            Self::Get => CACHE_ID_SIZE + VALUE_LENGTH_SIZE,
            Self::Set => CACHE_ID_SIZE,
            Self::Delete => 0,
        }
    }

    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
