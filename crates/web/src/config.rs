use std::time::Duration;

use serde::Deserialize;
use wick_http::connection::{ConnectionConfig, DEFAULT_KEEP_ALIVE_TIMEOUT, DEFAULT_READ_BUFFER_SIZE};

/// Server settings as they appear in a configuration file.
///
/// Every field is optional, durations are in milliseconds.
///
/// ```
/// use wick_web::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{ "read_timeout_ms": 30000 }"#).unwrap();
/// assert_eq!(config.read_timeout_ms, Some(30000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bound of a single socket read. Absent: no bound.
    pub read_timeout_ms: Option<u64>,
    /// Idle time allowed between two requests. Absent: 5 seconds, `0`: no limit.
    pub keep_alive_timeout_ms: Option<u64>,
    /// Requests served per connection before it is closed. Absent: no limit.
    pub max_requests: Option<usize>,
    /// Initial capacity of the read buffer in bytes. Absent: 8 KiB.
    pub read_buffer_size: Option<usize>,
}

impl From<ServerConfig> for ConnectionConfig {
    fn from(config: ServerConfig) -> Self {
        let keep_alive_timeout = match config.keep_alive_timeout_ms {
            None => Some(DEFAULT_KEEP_ALIVE_TIMEOUT),
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        };

        ConnectionConfig::default()
            .read_timeout(config.read_timeout_ms.map(Duration::from_millis))
            .keep_alive_timeout(keep_alive_timeout)
            .max_requests(config.max_requests)
            .read_buffer_size(config.read_buffer_size.unwrap_or(DEFAULT_READ_BUFFER_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_keeps_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(ConnectionConfig::from(config), ConnectionConfig::default());
    }

    #[test]
    fn fields_convert_to_connection_config() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "read_timeout_ms": 250, "keep_alive_timeout_ms": 0, "max_requests": 10, "read_buffer_size": 1024 }"#,
        )
        .unwrap();
        let connection = ConnectionConfig::from(config);

        assert_eq!(connection.get_read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(connection.get_keep_alive_timeout(), None);
        assert_eq!(connection.get_max_requests(), Some(10));
        assert_eq!(connection.get_read_buffer_size(), 1024);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ServerConfig>(r#"{ "read_timeout": 5 }"#);
        assert!(result.is_err_and(|e| e.to_string().contains("unknown field")));
    }
}
