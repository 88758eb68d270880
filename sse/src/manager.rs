use crate::client::Client;
use crate::error::Result;
use crate::event_source::{EventSource, History};
use crate::frame::EventId;
use crate::message::ChatMessage;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;

/// Name of the channel every chat client joins.
pub const DEFAULT_CHANNEL: &str = "default";

/// Registry of named channels, constructed once at startup and passed around
/// in application state.
pub struct Manager {
    channels: DashMap<String, Arc<EventSource>>,
}

impl Manager {
    pub fn new() -> Self {
        let channels = DashMap::new();
        channels.insert(
            DEFAULT_CHANNEL.to_string(),
            Arc::new(EventSource::new(DEFAULT_CHANNEL)),
        );
        Self { channels }
    }

    pub fn default_channel(&self) -> Arc<EventSource> {
        self.channel(DEFAULT_CHANNEL)
    }

    /// Returns the named channel, creating it on first use.
    pub fn channel(&self, name: &str) -> Arc<EventSource> {
        if let Some(channel) = self.channels.get(name) {
            return Arc::clone(channel.value());
        }

        let channel = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| {
                info!("Created SSE channel {name}");
                Arc::new(EventSource::new(name))
            });
        Arc::clone(channel.value())
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Creates a client for a new connection, subscribes it to the default
    /// channel (replaying history from `since`), and announces that it joined.
    pub fn connect(
        &self,
        identity: impl Into<String>,
        since: Option<EventId>,
    ) -> Result<Arc<Client>> {
        let client = Client::new(identity);
        let channel = self.default_channel();
        client.subscribe(&channel, since)?;

        info!(
            "Registered SSE client {} ({})",
            client.id().as_str(),
            client.identity()
        );

        channel.send_payload(
            &ChatMessage::joined(client.identity()),
            Some(EventId::now()),
            History::Record,
        )?;
        Ok(client)
    }

    /// Broadcasts a chat message on the default channel and records it for replay.
    pub fn publish(&self, message: &ChatMessage) -> Result<EventId> {
        let id = EventId::now();
        let delivered = self
            .default_channel()
            .send_payload(message, Some(id), History::Record)?;

        debug!(
            "Published message from {} to {delivered} listener(s) with id {id}",
            message.user
        );
        Ok(id)
    }

    /// Prunes closed listeners from every channel. Returns the total removed.
    pub fn prune_closed(&self) -> usize {
        self.channels
            .iter()
            .map(|entry| entry.value().prune_closed())
            .sum()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
