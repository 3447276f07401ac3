use std::sync::Arc;

use tracing::{debug, info};

use crate::probe::HealthProbe;
use crate::types::Endpoint;

/// Finds the first live endpoint among ordered candidates.
#[derive(Clone)]
pub struct EndpointResolver {
    probe: Arc<dyn HealthProbe>,
}

impl EndpointResolver {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self { probe }
    }

    /// Probe `candidates` one at a time, in order, and return the first alive one.
    ///
    /// Stops at the first hit; later candidates are never probed. `None` means
    /// nothing answered. No retries and no sleeping happen here.
    pub async fn resolve(&self, candidates: &[Endpoint]) -> Option<Endpoint> {
        for endpoint in candidates {
            if self.probe.probe(endpoint).await.alive {
                info!(%endpoint, "bridge found");
                return Some(endpoint.clone());
            }
            debug!(%endpoint, "candidate not alive");
        }
        None
    }

    /// Probe a single endpoint.
    pub async fn is_alive(&self, endpoint: &Endpoint) -> bool {
        self.probe.probe(endpoint).await.alive
    }
}
