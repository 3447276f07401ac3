use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cursor::cursor_from_value;
use crate::error::PullError;
use crate::probe::is_json;
use crate::types::{Endpoint, Event, PollResponse};

pub const PULL_PATH: &str = "/pull";

/// Raw bodies quoted in diagnostics are cut to this many characters.
pub const BODY_PREFIX_CHARS: usize = 120;

/// Event fields holding the display payload, most preferred first.
const PAYLOAD_FIELDS: &[&str] = &["roll", "text"];

/// One cursor-bounded pull against a bridge.
#[async_trait]
pub trait PullTransport: Send + Sync {
    async fn pull(
        &self,
        endpoint: &Endpoint,
        since: u64,
        cancel: &CancellationToken,
    ) -> Result<PollResponse, PullError>;
}

/// `GET /pull?since=<cursor>&target=<tag>` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    target: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            target: target.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PullTransport for HttpTransport {
    async fn pull(
        &self,
        endpoint: &Endpoint,
        since: u64,
        cancel: &CancellationToken,
    ) -> Result<PollResponse, PullError> {
        if cancel.is_cancelled() {
            return Err(PullError::Cancelled);
        }

        let since_param = since.to_string();
        let request = self
            .client
            .get(endpoint.url(PULL_PATH))
            .query(&[("since", since_param.as_str()), ("target", self.target.as_str())])
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.timeout);

        let fetch = async {
            let resp = request.send().await.map_err(|e| PullError::transport(&e))?;
            let status = resp.status().as_u16();
            let json = is_json(resp.headers().get(CONTENT_TYPE));
            let body = resp.text().await.map_err(|e| PullError::transport(&e))?;
            Ok::<_, PullError>((status, json, body))
        };

        // Dropping `fetch` aborts the in-flight request.
        let (status, json, body) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PullError::Cancelled),
            res = fetch => res?,
        };
        debug!(%endpoint, since, status, "pull response");
        decode_pull(status, json, &body)
    }
}

/// Decode a received pull response. Status is checked before content type,
/// and both before the body is parsed.
pub fn decode_pull(status: u16, content_is_json: bool, body: &str) -> Result<PollResponse, PullError> {
    if !(200..300).contains(&status) {
        return Err(PullError::HttpStatus {
            status,
            body: body_prefix(body),
        });
    }
    if !content_is_json {
        return Err(PullError::Protocol {
            message: "non-JSON from bridge".to_string(),
            body: body_prefix(body),
        });
    }
    let data: Value = serde_json::from_str(body).map_err(|e| PullError::Protocol {
        message: format!("malformed JSON from bridge ({e})"),
        body: body_prefix(body),
    })?;

    let events = match data.get("events") {
        Some(Value::Array(items)) => items.iter().filter_map(event_from_value).collect(),
        _ => Vec::new(),
    };
    let last = data.get("last").and_then(cursor_from_value);
    Ok(PollResponse { events, last })
}

/// Extract the display payload of one wire event; malformed or empty entries yield `None`.
fn event_from_value(v: &Value) -> Option<Event> {
    let obj = v.as_object()?;
    PAYLOAD_FIELDS
        .iter()
        .find_map(|field| obj.get(*field).and_then(payload_text))
        .map(|message| Event { message })
}

/// Render a scalar payload field. `""`, `0`, `false` and `null` count as absent,
/// so the next field is tried; objects and arrays are never payloads.
fn payload_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return (i != 0).then(|| i.to_string());
            }
            if let Some(u) = n.as_u64() {
                return Some(u.to_string());
            }
            let f = n.as_f64()?;
            if f == 0.0 {
                None
            } else if f.fract() == 0.0 && f.abs() < 1e15 {
                Some((f as i64).to_string())
            } else {
                Some(f.to_string())
            }
        }
        _ => None,
    }
}

pub fn body_prefix(body: &str) -> String {
    body.chars().take(BODY_PREFIX_CHARS).collect()
}
