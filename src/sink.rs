//! Outbound event sinks.
//!
//! A sink is a best-effort observer: `notify` is called at most once per event,
//! in order, must not block, and any error it returns is logged and dropped.

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::types::Event;

pub trait EventSink: Send + Sync {
    fn notify(&self, event: &Event) -> Result<()>;
}

/// Prints each payload on its own stdout line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn notify(&self, event: &Event) -> Result<()> {
        println!("{}", event.message);
        Ok(())
    }
}

/// Emits each payload as an info-level log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn notify(&self, event: &Event) -> Result<()> {
        info!(message = %event.message, "bridge event");
        Ok(())
    }
}

/// Hands events to a bounded channel. A full or closed channel drops the event.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, event: &Event) -> Result<()> {
        self.tx
            .try_send(event.clone())
            .map_err(|e| anyhow!("event dropped: {e}"))
    }
}
