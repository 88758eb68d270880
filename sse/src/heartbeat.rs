use crate::error::Result;
use crate::event_source::{EventSource, History};
use crate::frame::EventId;
use crate::message::Ping;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodically tells listeners of a channel that the hub is alive and who else
/// is connected. Neither message is kept in history, so reconnecting clients never
/// get stale pings replayed.
pub struct Heartbeat {
    source: Arc<EventSource>,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(source: Arc<EventSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Sends one ping followed by one presence snapshot.
    pub fn beat(&self) -> Result<()> {
        let pruned = self.source.prune_closed();
        if pruned > 0 {
            debug!(
                "Heartbeat pruned {pruned} closed listener(s) from channel {}",
                self.source.name()
            );
        }

        self.source
            .send_payload(&Ping::new(), Some(EventId::now()), History::Skip)?;
        self.source
            .send_payload(&self.source.presence(), None, History::Skip)?;
        Ok(())
    }

    /// Runs [`Heartbeat::beat`] every `interval` on the current tokio runtime
    /// until the returned task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "Starting heartbeat on channel {} every {:?}",
            self.source.name(),
            self.interval
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.beat() {
                    warn!("Heartbeat on channel {} failed: {e}", self.source.name());
                }
            }
        })
    }
}
