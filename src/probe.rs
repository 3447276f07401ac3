use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use tracing::debug;

use crate::types::{Endpoint, HealthResult};

pub const HEALTH_PATH: &str = "/health";

/// Liveness check for a single endpoint. Implementations never fail; every
/// problem folds into `alive = false`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> HealthResult;
}

/// `GET /health` over HTTP, alive on a success status with a JSON content type.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, endpoint: &Endpoint) -> HealthResult {
        let res = self
            .client
            .get(endpoint.url(HEALTH_PATH))
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await;
        let resp = match res {
            Ok(r) => r,
            Err(e) => {
                debug!(%endpoint, error = %e, "health probe failed");
                return HealthResult { alive: false };
            }
        };
        if !resp.status().is_success() {
            debug!(%endpoint, status = resp.status().as_u16(), "health probe non-success");
            return HealthResult { alive: false };
        }
        HealthResult {
            alive: is_json(resp.headers().get(CONTENT_TYPE)),
        }
    }
}

/// Whether a content-type header declares JSON.
pub(crate) fn is_json(value: Option<&reqwest::header::HeaderValue>) -> bool {
    value
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}
