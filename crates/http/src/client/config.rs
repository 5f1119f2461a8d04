use std::time::Duration;

/// Settings of an [`Agent`](super::Agent).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    read_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl AgentConfig {
    /// Bounds every read of a response, `None` waits forever.
    pub fn read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn get_read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn get_connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }
}
