use std::time::Duration;

/// Default idle time allowed between two requests on one connection.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the connection read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Settings of one server connection.
///
/// ```
/// use std::time::Duration;
/// use wick_http::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .read_timeout(Some(Duration::from_secs(30)))
///     .max_requests(Some(100));
/// assert_eq!(config.get_max_requests(), Some(100));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    read_timeout: Option<Duration>,
    keep_alive_timeout: Option<Duration>,
    max_requests: Option<usize>,
    read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            keep_alive_timeout: Some(DEFAULT_KEEP_ALIVE_TIMEOUT),
            max_requests: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Bounds every socket read, `None` waits forever.
    pub fn read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// How long to wait for the next request before closing, `None` waits forever.
    pub fn keep_alive_timeout(mut self, keep_alive_timeout: Option<Duration>) -> Self {
        self.keep_alive_timeout = keep_alive_timeout;
        self
    }

    /// Closes the connection after this many requests, `None` for no limit.
    pub fn max_requests(mut self, max_requests: Option<usize>) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub fn read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    pub fn get_read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn get_keep_alive_timeout(&self) -> Option<Duration> {
        self.keep_alive_timeout
    }

    pub fn get_max_requests(&self) -> Option<usize> {
        self.max_requests
    }

    pub fn get_read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }
}
