use std::time::Duration;

use crate::error::{PullError, TransportKind};

/// What the session does after a failed pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The endpoint answered (or might); wait and pull it again.
    RetrySameEndpoint(Duration),
    /// The endpoint refused the connection; resolve a new one.
    Rediscover,
    /// The session is stopping; no recovery.
    Cancelled,
}

/// Maps pull failures to recovery actions using fixed delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryClassifier {
    retry_delay: Duration,
}

impl RecoveryClassifier {
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    pub fn classify(&self, err: &PullError) -> Recovery {
        match err {
            PullError::Cancelled => Recovery::Cancelled,
            PullError::Transport {
                kind: TransportKind::Refused,
                ..
            } => Recovery::Rediscover,
            PullError::HttpStatus { .. } | PullError::Protocol { .. } => {
                Recovery::RetrySameEndpoint(self.retry_delay)
            }
            PullError::Transport { .. } => Recovery::RetrySameEndpoint(self.retry_delay),
        }
    }
}
