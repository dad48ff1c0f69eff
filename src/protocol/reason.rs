//! Server reason codes.
//!
//! A reason code is the 2-byte body of an error response. Unknown codes are
//! kept verbatim so callers can still inspect them.

use std::fmt;

/// Reason code reported by the server for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReasonCode(pub u16);

impl ReasonCode {
    /// Operation succeeded.
    pub const SUCCESS: Self = Self(0);
    /// Unspecified server error.
    pub const ERROR: Self = Self(1);
    /// Key does not exist.
    pub const NOT_FOUND: Self = Self(2);
    /// Key already exists.
    pub const EXISTS: Self = Self(3);
    /// Version token did not match the stored item.
    pub const MISMATCH: Self = Self(4);
    /// Item too large for the server.
    pub const TOO_LARGE: Self = Self(5);
    /// Server could not allocate memory for the item.
    pub const OUT_OF_MEMORY: Self = Self(6);
    /// Watch ID unknown to the server.
    pub const WATCH_NOT_FOUND: Self = Self(7);
    /// Malformed request field.
    pub const INVALID_PARAMETER: Self = Self(8);
    /// Opcode not understood by the server.
    pub const UNKNOWN_COMMAND: Self = Self(9);

    /// Raw numeric value.
    #[inline]
    pub fn code(self) -> u16 {
        self.0
    }

    /// Check if this is the success code.
    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Symbolic name, if the code is known.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SUCCESS => "success",
            Self::ERROR => "error",
            Self::NOT_FOUND => "not_found",
            Self::EXISTS => "exists",
            Self::MISMATCH => "mismatch",
            Self::TOO_LARGE => "too_large",
            Self::OUT_OF_MEMORY => "out_of_memory",
            Self::WATCH_NOT_FOUND => "watch_not_found",
            Self::INVALID_PARAMETER => "invalid_parameter",
            Self::UNKNOWN_COMMAND => "unknown_command",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "reason {}", self.0),
        }
    }
}

impl From<u16> for ReasonCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_display_name() {
        assert_eq!(ReasonCode::NOT_FOUND.to_string(), "not_found (2)");
        assert_eq!(ReasonCode::MISMATCH.name(), Some("mismatch"));
    }

    #[test]
    fn test_unknown_code_is_preserved() {
        let reason = ReasonCode::from(4242);
        assert_eq!(reason.code(), 4242);
        assert_eq!(reason.name(), None);
        assert_eq!(reason.to_string(), "reason 4242");
    }

    #[test]
    fn test_success() {
        assert!(ReasonCode::SUCCESS.is_success());
        assert!(!ReasonCode::ERROR.is_success());
    }
}
