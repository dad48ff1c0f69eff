//! Client configuration.
//!
//! Every field has a default, so a JSON document only needs the keys it
//! wants to override:
//!
//! ```
//! use shardcache_client::ClientConfig;
//!
//! let config = ClientConfig::from_json_str(r#"{ "group_id": 315, "max_busy_time_ms": 200 }"#).unwrap();
//! assert_eq!(config.group_id, 315);
//! assert_eq!(config.max_busy_time().as_millis(), 200);
//! assert_eq!(config.write_buffer_size, 64 * 1024);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::local_cache::{DEFAULT_LOCAL_CACHE_MAX_SIZE, DEFAULT_WARNING_RATE};
use crate::protocol::{DEFAULT_MAX_VALUE_SIZE, DEFAULT_WRITE_BUFFER_SIZE};

/// Default batch deadline in milliseconds.
pub const DEFAULT_MAX_BUSY_TIME_MS: u64 = 5000;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Settings shared by every call of a [`CacheClient`](crate::CacheClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Group identifier carried by every request frame.
    pub group_id: u32,
    /// Deadline used by the `*_default` batch calls.
    pub max_busy_time_ms: u64,
    /// TCP connect timeout.
    pub connect_timeout_ms: u64,
    /// Send buffer capacity per session.
    pub write_buffer_size: usize,
    /// Largest value accepted on encode or decode.
    pub max_value_size: usize,
    /// Set `TCP_NODELAY` on new connections.
    pub no_delay: bool,
    /// Local cache capacity in accounted bytes.
    pub local_cache_max_size: usize,
    /// Local cache usage ratio that triggers a warning.
    pub local_cache_warning_rate: f64,
}

impl ClientConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.write_buffer_size == 0 {
            return Err(CacheError::Config(
                "write_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.max_value_size == 0 || self.max_value_size > u32::MAX as usize {
            return Err(CacheError::Config(format!(
                "max_value_size out of range: {}",
                self.max_value_size
            )));
        }
        if !(self.local_cache_warning_rate > 0.0 && self.local_cache_warning_rate <= 1.0) {
            return Err(CacheError::Config(format!(
                "local_cache_warning_rate must be in (0, 1], got {}",
                self.local_cache_warning_rate
            )));
        }
        Ok(())
    }

    /// Default batch deadline.
    pub fn max_busy_time(&self) -> Duration {
        Duration::from_millis(self.max_busy_time_ms)
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            group_id: 0,
            max_busy_time_ms: DEFAULT_MAX_BUSY_TIME_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            no_delay: true,
            local_cache_max_size: DEFAULT_LOCAL_CACHE_MAX_SIZE,
            local_cache_warning_rate: DEFAULT_WARNING_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.group_id, 0);
        assert_eq!(config.max_busy_time(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.write_buffer_size, 64 * 1024);
        assert_eq!(config.max_value_size, 16 * 1024 * 1024);
        assert!(config.no_delay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ClientConfig::from_json_str(r#"{"no_delay": false, "write_buffer_size": 128}"#)
            .unwrap();
        assert!(!config.no_delay);
        assert_eq!(config.write_buffer_size, 128);
        assert_eq!(config.max_busy_time_ms, DEFAULT_MAX_BUSY_TIME_MS);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ClientConfig {
            group_id: 7,
            ..ClientConfig::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(ClientConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        let result = ClientConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(CacheError::Json(_))));
    }

    #[test]
    fn test_rejects_zero_buffer() {
        let result = ClientConfig::from_json_str(r#"{"write_buffer_size": 0}"#);
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_warning_rate() {
        for rate in ["0.0", "1.5", "-0.2"] {
            let json = format!(r#"{{"local_cache_warning_rate": {}}}"#, rate);
            let result = ClientConfig::from_json_str(&json);
            assert!(matches!(result, Err(CacheError::Config(_))), "rate {}", rate);
        }
    }
}
