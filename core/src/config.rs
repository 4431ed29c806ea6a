//! Per-request configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_DEPTH: usize = 16;
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

/// Limits applied to one request chain.
///
/// Every builder starts from `RequestConfig::default()`. The struct can be
/// embedded in application configuration, where the timeout is written in
/// milliseconds:
///
/// ```
/// # use fluent_request::RequestConfig;
/// let config: RequestConfig = serde_json::from_str(r#"{ "timeout_ms": 500 }"#).unwrap();
/// assert_eq!(config.timeout.as_millis(), 500);
/// assert_eq!(config.max_depth, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deadline for the whole attempt, connect through body read.
    #[serde(rename = "timeout_ms", deserialize_with = "millis")]
    pub timeout: Duration,
    /// Nesting budget for flattened headers, params and forms.
    pub max_depth: usize,
    /// Responses larger than this fail as transport errors.
    pub max_response_bytes: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.max_response_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: RequestConfig =
            serde_json::from_str(r#"{ "timeout_ms": 250, "max_depth": 4 }"#).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_response_bytes, DEFAULT_MAX_RESPONSE_BYTES);
    }
}
