//! Pull failure taxonomy

use thiserror::Error;

/// How a request failed before any response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connection refused or host unreachable; the bridge is probably gone from this port.
    Refused,
    Timeout,
    Other,
}

impl TransportKind {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            TransportKind::Refused
        } else if err.is_timeout() {
            TransportKind::Timeout
        } else {
            TransportKind::Other
        }
    }
}

/// Errors surfaced by one pull call.
#[derive(Debug, Error)]
pub enum PullError {
    #[error("bridge HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("{message}: {body}")]
    Protocol { message: String, body: String },

    #[error("bridge unreachable ({kind:?}): {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("pull cancelled")]
    Cancelled,
}

impl PullError {
    pub fn transport(err: &reqwest::Error) -> Self {
        PullError::Transport {
            kind: TransportKind::from_reqwest(err),
            message: err.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PullError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        let err = PullError::HttpStatus {
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(err.to_string(), "bridge HTTP 503: busy");

        let err = PullError::Protocol {
            message: "non-JSON from bridge".into(),
            body: "<html>".into(),
        };
        assert_eq!(err.to_string(), "non-JSON from bridge: <html>");
    }

    #[test]
    fn only_cancelled_is_cancelled() {
        assert!(PullError::Cancelled.is_cancelled());
        assert!(!PullError::Transport {
            kind: TransportKind::Refused,
            message: "refused".into()
        }
        .is_cancelled());
    }
}
