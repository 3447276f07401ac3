use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::Result;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::cursor::EventCursor;
use crate::probe::{HealthProbe, HttpProbe};
use crate::recovery::{Recovery, RecoveryClassifier};
use crate::resolver::EndpointResolver;
use crate::sink::EventSink;
use crate::transport::{HttpTransport, PullTransport};
use crate::types::{Endpoint, PollResponse, SessionState, StatusLine};

/// Control handle for one polling session.
///
/// `start` spawns a single driver task that alternates between resolving an
/// endpoint and pulling from it; `stop` cancels that task and waits for it to
/// finish. The driver is the only writer of state, endpoint and cursor and
/// publishes them through watch slots.
pub struct PollSession {
    config: SessionConfig,
    resolver: EndpointResolver,
    transport: Arc<dyn PullTransport>,
    sink: Arc<dyn EventSink>,
    shared: Arc<Shared>,
    driver: Mutex<Option<Driver>>,
}

struct Driver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    state: watch::Sender<SessionState>,
    endpoint: watch::Sender<Option<Endpoint>>,
    cursor: watch::Sender<u64>,
    log: StdMutex<VecDeque<StatusLine>>,
    log_capacity: usize,
}

impl Shared {
    /// Move to `next` and record `message`. A stopping session only accepts `Stopped`.
    fn transition(&self, next: SessionState, message: impl Into<String>) {
        let changed = self.state.send_if_modified(|cur| {
            if *cur == next || (*cur == SessionState::Stopping && next != SessionState::Stopped) {
                return false;
            }
            *cur = next;
            true
        });
        if changed {
            self.note(message);
        }
    }

    /// Record an advisory status line under the current state.
    fn note(&self, message: impl Into<String>) {
        let state = *self.state.borrow();
        let message = message.into();
        info!(%state, "{message}");
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        if log.len() >= self.log_capacity {
            log.pop_front();
        }
        log.push_back(StatusLine {
            timestamp: now_rfc3339(),
            state,
            message,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scanning,
    Running,
}

impl PollSession {
    pub fn new(
        config: SessionConfig,
        probe: Arc<dyn HealthProbe>,
        transport: Arc<dyn PullTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (endpoint, _) = watch::channel(config.preferred.clone());
        let (cursor, _) = watch::channel(config.since);
        let shared = Arc::new(Shared {
            state,
            endpoint,
            cursor,
            log: StdMutex::new(VecDeque::new()),
            log_capacity: config.status_log_capacity.max(1),
        });
        Self {
            config,
            resolver: EndpointResolver::new(probe),
            transport,
            sink,
            shared,
            driver: Mutex::new(None),
        }
    }

    /// Session over HTTP with one shared `reqwest` client.
    pub fn http(config: SessionConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder().build()?;
        let probe = HttpProbe::new(client.clone(), config.probe_timeout());
        let transport = HttpTransport::new(client, config.target.clone(), config.pull_timeout());
        Ok(Self::new(config, Arc::new(probe), Arc::new(transport), sink))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Watch state changes. Intermediate states may be coalesced; use
    /// `status_log` for the full history.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.shared.endpoint.borrow().clone()
    }

    /// Replace the current endpoint. A running loop uses it from its next pull.
    pub fn set_endpoint(&self, endpoint: Endpoint) {
        self.shared.note(format!("endpoint set to {endpoint}"));
        self.shared.endpoint.send_replace(Some(endpoint));
    }

    pub fn cursor(&self) -> u64 {
        *self.shared.cursor.borrow()
    }

    pub fn status_log(&self) -> Vec<StatusLine> {
        let log = self.shared.log.lock().unwrap_or_else(|e| e.into_inner());
        log.iter().cloned().collect()
    }

    /// Start polling. A no-op while a driver is already active.
    ///
    /// The current endpoint, if any, is probed first; when it answers the session
    /// goes straight to `Running`, otherwise it begins in `Scanning`.
    pub async fn start(&self) {
        let mut driver = self.driver.lock().await;
        if driver.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            debug!(state = %self.status(), "start ignored");
            return;
        }
        if let Some(old) = driver.take() {
            let _ = old.handle.await;
        }

        let phase = match self.endpoint() {
            Some(ep) if self.resolver.is_alive(&ep).await => {
                self.shared
                    .transition(SessionState::Running, format!("running against {ep}"));
                Phase::Running
            }
            _ => {
                self.shared.transition(SessionState::Scanning, "scanning");
                Phase::Scanning
            }
        };

        let cancel = CancellationToken::new();
        let worker = Worker {
            resolver: self.resolver.clone(),
            transport: self.transport.clone(),
            sink: self.sink.clone(),
            classifier: RecoveryClassifier::new(self.config.retry_delay()),
            shared: self.shared.clone(),
            candidates: self.config.candidates(),
            poll_interval: self.config.poll_interval(),
            rescan_delay: self.config.rescan_delay(),
            cursor: EventCursor::new(self.cursor()),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run(phase));
        *driver = Some(Driver { cancel, handle });
    }

    /// Stop polling and wait for the driver to exit. A no-op when nothing runs.
    pub async fn stop(&self) {
        let mut guard = self.driver.lock().await;
        let Some(driver) = guard.take() else {
            return;
        };
        self.shared.transition(SessionState::Stopping, "stopping");
        driver.cancel.cancel();
        if let Err(e) = driver.handle.await {
            warn!(error = %e, "poll task ended abnormally");
            self.shared.transition(SessionState::Stopped, "stopped");
        }
    }

    /// One resolution pass outside the loop; adopts the endpoint it finds.
    pub async fn scan(&self) -> Option<Endpoint> {
        self.shared.note("scanning for bridge");
        let candidates = self.config.candidates();
        let found = self.resolver.resolve(&candidates).await;
        match &found {
            Some(ep) => {
                self.shared.endpoint.send_replace(Some(ep.clone()));
                self.shared.note(format!("connected to bridge on {ep}"));
            }
            None => self.shared.note(not_found_message(&candidates)),
        }
        found
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().as_ref() {
            driver.cancel.cancel();
        }
    }
}

/// State owned by the driver task for one run.
struct Worker {
    resolver: EndpointResolver,
    transport: Arc<dyn PullTransport>,
    sink: Arc<dyn EventSink>,
    classifier: RecoveryClassifier,
    shared: Arc<Shared>,
    candidates: Vec<Endpoint>,
    poll_interval: Duration,
    rescan_delay: Duration,
    cursor: EventCursor,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self, mut phase: Phase) {
        while !self.cancel.is_cancelled() {
            phase = match phase {
                Phase::Scanning => self.scan_step().await,
                Phase::Running => self.pull_step().await,
            };
        }
        self.shared.transition(SessionState::Stopped, "stopped");
    }

    async fn scan_step(&mut self) -> Phase {
        self.shared.transition(SessionState::Scanning, "scanning");
        let found = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Phase::Scanning,
            found = self.resolver.resolve(&self.candidates) => found,
        };
        match found {
            Some(ep) => {
                self.shared.note(format!("ready: connected to bridge on {ep}"));
                self.shared.endpoint.send_replace(Some(ep));
                Phase::Running
            }
            None => {
                self.shared.note(not_found_message(&self.candidates));
                self.pause(self.rescan_delay).await;
                Phase::Scanning
            }
        }
    }

    async fn pull_step(&mut self) -> Phase {
        let current = self.shared.endpoint.borrow().clone();
        let Some(endpoint) = current else {
            return Phase::Scanning;
        };
        self.shared
            .transition(SessionState::Running, format!("running against {endpoint}"));
        if self.cancel.is_cancelled() {
            return Phase::Running;
        }

        let token = self.cancel.child_token();
        let err = match self
            .transport
            .pull(&endpoint, self.cursor.current(), &token)
            .await
        {
            Ok(resp) => {
                self.deliver(resp);
                self.pause(self.poll_interval).await;
                return Phase::Running;
            }
            Err(err) => err,
        };
        if self.cancel.is_cancelled() {
            return Phase::Running;
        }

        match self.classifier.classify(&err) {
            Recovery::Cancelled => Phase::Running,
            Recovery::Rediscover => {
                self.shared.note(format!("{err}; rescanning"));
                Phase::Scanning
            }
            Recovery::RetrySameEndpoint(delay) => {
                self.shared.note(err.to_string());
                self.pause(delay).await;
                Phase::Running
            }
        }
    }

    /// Forward every event in order, then adopt the response cursor.
    fn deliver(&mut self, resp: PollResponse) {
        for event in &resp.events {
            debug!(message = %event.message, "forwarding event");
            if let Err(e) = self.sink.notify(event) {
                debug!(error = %e, "sink notify failed");
            }
        }
        self.cursor.advance(resp.last);
        self.shared.cursor.send_replace(self.cursor.current());
    }

    async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn not_found_message(candidates: &[Endpoint]) -> String {
    match (candidates.first(), candidates.last()) {
        (Some(first), Some(last)) if candidates.len() > 1 => {
            format!("not found: no bridge found on {first} .. {last}")
        }
        (Some(only), _) => format!("not found: no bridge found on {only}"),
        _ => "not found: no candidate endpoints".to_string(),
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
