use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate bridge instance, addressed by host and port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// Absolute URL for `path` on this endpoint. `path` must start with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Liveness judgement for one endpoint at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthResult {
    pub alive: bool,
}

/// One notification unit; only the display payload survives decoding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub message: String,
}

/// Decoded result of one pull call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollResponse {
    pub events: Vec<Event>,
    pub last: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// One advisory, timestamped status line recorded by a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub timestamp: String,
    pub state: SessionState,
    pub message: String,
}
