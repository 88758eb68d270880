use crate::error::{Error, Result};
use crate::event_source::{EventSource, History};
use crate::frame::{EncodedFrame, EventId};
use crate::message::ChatMessage;
use log::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Unique identifier for a client (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

struct ClientState {
    closed: bool,
    sender: Option<UnboundedSender<EncodedFrame>>,
    subscriptions: Vec<Arc<EventSource>>,
}

/// One subscriber connection: a closable, ordered queue of outgoing frames plus
/// the set of event sources it listens to.
///
/// The connection that creates a client owns it. Event sources only keep a weak
/// reference, so a client that is dropped without being closed simply stops
/// receiving and is pruned on the next send.
pub struct Client {
    id: ClientId,
    identity: String,
    state: Mutex<ClientState>,
    receiver: tokio::sync::Mutex<UnboundedReceiver<EncodedFrame>>,
}

impl Client {
    pub fn new(identity: impl Into<String>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            id: ClientId::new(),
            identity: identity.into(),
            state: Mutex::new(ClientState {
                closed: false,
                sender: Some(tx),
                subscriptions: Vec::new(),
            }),
            receiver: tokio::sync::Mutex::new(rx),
        })
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Display name shown to other listeners
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Appends an encoded frame to the outgoing queue. Fails with `Closed` once
    /// the client has been closed.
    pub fn enqueue(&self, frame: EncodedFrame) -> Result<()> {
        let state = self.state.lock();
        if state.closed {
            return Err(Error::closed());
        }

        match &state.sender {
            Some(sender) => sender.send(frame).map_err(|_| Error::closed()),
            None => Err(Error::closed()),
        }
    }

    /// Waits for the next queued frame. Frames already queued when the client is
    /// closed are still handed out; after that `None` marks the end of the stream.
    pub async fn recv(&self) -> Option<EncodedFrame> {
        self.receiver.lock().await.recv().await
    }

    /// Non-blocking variant of [`Client::recv`]. Returns `None` when nothing is
    /// queued or another task is currently draining.
    pub fn try_recv(&self) -> Option<EncodedFrame> {
        self.receiver.try_lock().ok()?.try_recv().ok()
    }

    /// Starts listening to `source`, first replaying its history from `since` on
    /// when an id is given.
    pub fn subscribe(
        self: &Arc<Self>,
        source: &Arc<EventSource>,
        since: Option<EventId>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(Error::closed());
            }
            if !state.subscriptions.iter().any(|s| Arc::ptr_eq(s, source)) {
                state.subscriptions.push(Arc::clone(source));
            }
        }

        source.register(self, since);
        Ok(())
    }

    /// Stops listening to `source`. Fails with `NotRegistered` if this client
    /// never subscribed to it.
    pub fn unsubscribe(&self, source: &Arc<EventSource>) -> Result<()> {
        {
            let mut state = self.state.lock();
            let position = state
                .subscriptions
                .iter()
                .position(|s| Arc::ptr_eq(s, source))
                .ok_or_else(Error::not_registered)?;
            state.subscriptions.swap_remove(position);
        }

        source.unregister(self)
    }

    pub fn is_subscribed(&self, source: &Arc<EventSource>) -> bool {
        self.state
            .lock()
            .subscriptions
            .iter()
            .any(|s| Arc::ptr_eq(s, source))
    }

    /// Closes the client. Only the first call succeeds; every later call fails
    /// with `Closed`.
    ///
    /// The client leaves every source it listens to, and each of those sources
    /// then broadcasts a "left the chat" message to its remaining listeners.
    pub fn close(&self) -> Result<()> {
        let subscriptions = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(Error::closed());
            }
            state.closed = true;
            // Dropping the sender lets the consumer drain what is queued, then end.
            state.sender = None;
            std::mem::take(&mut state.subscriptions)
        };

        for source in &subscriptions {
            source.discard(&self.id);
        }

        let farewell = ChatMessage::left(self.identity.as_str());
        for source in &subscriptions {
            if let Err(e) = source.send_payload(&farewell, Some(EventId::now()), History::Record) {
                warn!(
                    "Failed to announce departure of {} on channel {}: {e}",
                    self.identity,
                    source.name()
                );
            }
        }

        debug!(
            "Closed client {} ({}) after {} subscription(s)",
            self.id.as_str(),
            self.identity,
            subscriptions.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
