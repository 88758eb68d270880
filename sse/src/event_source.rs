use crate::client::{Client, ClientId};
use crate::error::{Error, Result};
use crate::frame::{EncodedFrame, EventId, Frame};
use crate::message::{EventType, Presence};
use log::*;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

/// Number of recently sent frames kept for replay to reconnecting clients.
pub const HISTORY_CAPACITY: usize = 10;

/// Whether a sent frame is kept for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum History {
    Record,
    Skip,
}

struct Inner {
    listeners: HashMap<ClientId, Weak<Client>>,
    history: VecDeque<(EventId, EncodedFrame)>,
}

/// A broadcast topic: fans frames out to every registered client and keeps a
/// short ring of recent frames for replay.
///
/// Every mutation goes through one lock, which also makes the order of `send`
/// calls the order every listener observes.
pub struct EventSource {
    name: String,
    inner: Mutex<Inner>,
}

impl EventSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                listeners: HashMap::new(),
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encodes `frame` once and queues it on every listener. Listeners that turn
    /// out to be closed (or dropped) are removed after the pass. Returns the
    /// number of listeners the frame was delivered to.
    pub fn send(&self, frame: &Frame, history: History) -> usize {
        let encoded = frame.encode();
        let mut inner = self.inner.lock();

        let mut gone = Vec::new();
        let mut delivered = 0;
        for (client_id, listener) in inner.listeners.iter() {
            let accepted = listener
                .upgrade()
                .is_some_and(|client| client.enqueue(encoded.clone()).is_ok());
            if accepted {
                delivered += 1;
            } else {
                gone.push(client_id.clone());
            }
        }

        for client_id in &gone {
            inner.listeners.remove(client_id);
        }
        if !gone.is_empty() {
            debug!(
                "Removed {} closed listener(s) from channel {}",
                gone.len(),
                self.name
            );
        }

        if history == History::Record {
            if inner.history.len() == HISTORY_CAPACITY {
                inner.history.pop_front();
            }
            inner
                .history
                .push_back((frame.id().unwrap_or_default(), encoded));
        }

        trace!("Sent frame on channel {} to {delivered} listener(s)", self.name);
        delivered
    }

    /// Serializes `payload` to JSON and sends it with the payload's event type.
    pub fn send_payload<T>(
        &self,
        payload: &T,
        id: Option<EventId>,
        history: History,
    ) -> Result<usize>
    where
        T: Serialize + EventType,
    {
        let data = serde_json::to_string(payload)?;
        let frame = Frame::new(data)?
            .with_event(payload.event_type())
            .with_id(id);

        Ok(self.send(&frame, history))
    }

    /// Adds `client` as a listener. Registering twice is a no-op.
    ///
    /// With `since`, every history entry whose id is `>= since` is queued on the
    /// client first, oldest first, without being re-encoded or re-recorded.
    pub fn register(&self, client: &Arc<Client>, since: Option<EventId>) {
        let mut inner = self.inner.lock();
        if inner.listeners.contains_key(client.id()) {
            return;
        }

        if let Some(since) = since {
            let mut replayed = 0;
            for (_, frame) in inner.history.iter().filter(|(id, _)| *id >= since) {
                if client.enqueue(frame.clone()).is_err() {
                    debug!(
                        "Client {} closed during replay on channel {}",
                        client.id().as_str(),
                        self.name
                    );
                    return;
                }
                replayed += 1;
            }
            debug!(
                "Replayed {replayed} frame(s) since id {since} to {} on channel {}",
                client.identity(),
                self.name
            );
        }

        inner
            .listeners
            .insert(client.id().clone(), Arc::downgrade(client));
    }

    /// Removes `client` from the listeners. Fails with `NotRegistered` if it is
    /// not one. Use [`Client::unsubscribe`] so both sides stay in agreement.
    pub fn unregister(&self, client: &Client) -> Result<()> {
        self.inner
            .lock()
            .listeners
            .remove(client.id())
            .map(|_| ())
            .ok_or_else(Error::not_registered)
    }

    /// Removes the listener if present.
    pub(crate) fn discard(&self, client_id: &ClientId) {
        self.inner.lock().listeners.remove(client_id);
    }

    /// Drops every listener that is closed or no longer alive. Returns how many
    /// were removed.
    pub fn prune_closed(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner
            .listeners
            .retain(|_, listener| listener.upgrade().is_some_and(|c| !c.is_closed()));
        before - inner.listeners.len()
    }

    pub fn is_registered(&self, client: &Client) -> bool {
        self.inner.lock().listeners.contains_key(client.id())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Identities of the listeners still alive right now, in no particular order.
    pub fn listener_identities(&self) -> Vec<String> {
        self.inner
            .lock()
            .listeners
            .values()
            .filter_map(Weak::upgrade)
            .map(|client| client.identity().to_string())
            .collect()
    }

    pub fn presence(&self) -> Presence {
        let users = self.listener_identities();
        Presence {
            user_count: users.len(),
            users,
        }
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventSource")
            .field("name", &self.name)
            .field("listeners", &inner.listeners.len())
            .field("history", &inner.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::message::ChatMessage;

    fn frame(data: &str, id: u64) -> Frame {
        Frame::new(data).unwrap().with_id(Some(EventId::new(id)))
    }

    fn drain(client: &Client) -> Vec<Frame> {
        std::iter::from_fn(|| client.try_recv())
            .map(|encoded| Frame::decode(encoded.as_str()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_every_listener_receives_all_frames_in_send_order() {
        let source = EventSource::new("default");
        let clients: Vec<_> = (0..3).map(|i| Client::new(format!("user{i}"))).collect();
        for client in &clients {
            source.register(client, None);
        }

        for i in 0..25u64 {
            assert_eq!(source.send(&frame(&format!("m{i}"), i), History::Record), 3);
        }

        for client in &clients {
            let data: Vec<_> = drain(client).iter().map(|f| f.data().to_string()).collect();
            let expected: Vec<_> = (0..25).map(|i| format!("m{i}")).collect();
            assert_eq!(data, expected);
        }
    }

    #[tokio::test]
    async fn test_register_replays_history_from_since_inclusive() {
        let source = EventSource::new("default");
        for id in [10, 20, 30, 40] {
            source.send(&frame(&format!("m{id}"), id), History::Record);
        }
        let client = Client::new("late");

        source.register(&client, Some(EventId::new(20)));

        let ids: Vec<_> = drain(&client).iter().map(|f| f.id().unwrap().value()).collect();
        assert_eq!(ids, vec![20, 30, 40]);
        assert_eq!(source.history_len(), 4);
    }

    #[tokio::test]
    async fn test_register_without_since_replays_nothing() {
        let source = EventSource::new("default");
        source.send(&frame("old", 1), History::Record);
        let client = Client::new("fresh");

        source.register(&client, None);

        assert!(client.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_evicts_oldest() {
        let source = EventSource::new("default");
        for id in 1..=(HISTORY_CAPACITY as u64 + 1) {
            source.send(&frame(&format!("m{id}"), id), History::Record);
        }
        let client = Client::new("late");

        source.register(&client, Some(EventId::new(0)));

        let ids: Vec<_> = drain(&client).iter().map(|f| f.id().unwrap().value()).collect();
        assert_eq!(source.history_len(), HISTORY_CAPACITY);
        assert_eq!(ids.len(), HISTORY_CAPACITY);
        assert_eq!(ids.first(), Some(&2));
    }

    #[tokio::test]
    async fn test_skipped_frames_are_not_replayed() {
        let source = EventSource::new("default");
        source.send(&frame("kept", 5), History::Record);
        source.send(&frame("ping", 6), History::Skip);
        let client = Client::new("late");

        source.register(&client, Some(EventId::new(0)));

        let data: Vec<_> = drain(&client).iter().map(|f| f.data().to_string()).collect();
        assert_eq!(data, vec!["kept".to_string()]);
    }

    #[tokio::test]
    async fn test_frames_without_id_only_replay_from_zero() {
        let source = EventSource::new("default");
        source.send(&Frame::new("anonymous").unwrap(), History::Record);

        let from_one = Client::new("a");
        source.register(&from_one, Some(EventId::new(1)));
        let from_zero = Client::new("b");
        source.register(&from_zero, Some(EventId::new(0)));

        assert!(from_one.try_recv().is_none());
        assert_eq!(drain(&from_zero).len(), 1);
    }

    #[tokio::test]
    async fn test_register_twice_is_a_noop() {
        let source = EventSource::new("default");
        source.send(&frame("old", 1), History::Record);
        let client = Client::new("alice");

        source.register(&client, Some(EventId::new(1)));
        source.register(&client, Some(EventId::new(1)));
        source.send(&frame("new", 2), History::Record);

        assert_eq!(source.listener_count(), 1);
        assert_eq!(drain(&client).len(), 2);
    }

    #[tokio::test]
    async fn test_unregister_unknown_client_fails() {
        let source = EventSource::new("default");
        let client = Client::new("alice");

        let err = source.unregister(&client).unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::NotRegistered);
    }

    #[tokio::test]
    async fn test_send_prunes_closed_listeners_without_blocking_others() {
        let source = Arc::new(EventSource::new("default"));
        let alive = Client::new("alive");
        let closed = Client::new("closed");
        source.register(&alive, None);
        source.register(&closed, None);
        // Registered directly, so closing does not detach it from the source
        closed.close().unwrap();
        assert_eq!(source.listener_count(), 2);

        let delivered = source.send(&frame("hello", 1), History::Record);

        assert_eq!(delivered, 1);
        assert_eq!(source.listener_count(), 1);
        assert_eq!(drain(&alive).last().unwrap().data(), "hello");
    }

    #[tokio::test]
    async fn test_dropped_client_is_pruned_on_send() {
        let source = EventSource::new("default");
        let client = Client::new("gone");
        source.register(&client, None);
        drop(client);

        assert_eq!(source.send(&frame("hello", 1), History::Record), 0);
        assert_eq!(source.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_prune_closed_removes_exactly_the_closed_listeners() {
        let source = EventSource::new("default");
        let clients: Vec<_> = (0..4).map(|i| Client::new(format!("user{i}"))).collect();
        for client in &clients {
            source.register(client, None);
        }
        clients[1].close().unwrap();
        clients[3].close().unwrap();

        let removed = source.prune_closed();

        assert_eq!(removed, 2);
        assert!(source.is_registered(&clients[0]));
        assert!(!source.is_registered(&clients[1]));
        assert!(source.is_registered(&clients[2]));
        assert!(!source.is_registered(&clients[3]));
    }

    #[tokio::test]
    async fn test_presence_lists_current_listeners() {
        let source = EventSource::new("default");
        let alice = Client::new("alice");
        let bob = Client::new("bob");
        source.register(&alice, None);
        source.register(&bob, None);

        let mut presence = source.presence();
        presence.users.sort();

        assert_eq!(presence.user_count, 2);
        assert_eq!(presence.users, vec!["alice".to_string(), "bob".to_string()]);
    }

    fn tick_ids(client: &Client) -> Vec<u64> {
        drain(client)
            .iter()
            .filter(|f| f.data() == "tick")
            .map(|f| f.id().unwrap().value())
            .collect()
    }

    #[test]
    fn test_close_racing_sends_never_deadlocks_or_reorders() {
        const TICKS: u64 = 2_000;
        let source = Arc::new(EventSource::new("default"));
        let survivors: Vec<_> = (0..2).map(|i| Client::new(format!("stay{i}"))).collect();
        let leavers: Vec<_> = (0..4).map(|i| Client::new(format!("leave{i}"))).collect();
        for client in survivors.iter().chain(&leavers) {
            client.subscribe(&source, None).unwrap();
        }
        let start = Arc::new(std::sync::Barrier::new(leavers.len() + 1));

        let sender = {
            let source = Arc::clone(&source);
            let start = Arc::clone(&start);
            std::thread::spawn(move || {
                start.wait();
                for id in 1..=TICKS {
                    source.send(&frame("tick", id), History::Skip);
                }
            })
        };
        let closers: Vec<_> = leavers
            .iter()
            .map(|client| {
                let client = Arc::clone(client);
                let start = Arc::clone(&start);
                std::thread::spawn(move || {
                    start.wait();
                    client.close().unwrap();
                    // Whatever was queued before close is still handed out
                    tick_ids(&client)
                })
            })
            .collect();

        sender.join().unwrap();
        for (client, closer) in leavers.iter().zip(closers) {
            let before_close = closer.join().unwrap();
            assert!(before_close.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(client.try_recv().is_none());
            assert!(!source.is_registered(client));
        }
        for client in &survivors {
            assert_eq!(tick_ids(client), (1..=TICKS).collect::<Vec<_>>());
        }
        assert_eq!(source.listener_count(), survivors.len());
    }

    #[test]
    fn test_concurrent_senders_produce_one_order_for_every_listener() {
        let source = Arc::new(EventSource::new("default"));
        let clients: Vec<_> = (0..3).map(|i| Client::new(format!("user{i}"))).collect();
        for client in &clients {
            source.register(client, None);
        }

        let senders: Vec<_> = (0..4)
            .map(|thread| {
                let source = Arc::clone(&source);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let frame = Frame::new(format!("t{thread}-{i}")).unwrap();
                        source.send(&frame, History::Record);
                    }
                })
            })
            .collect();
        for sender in senders {
            sender.join().unwrap();
        }

        let orders: Vec<Vec<String>> = clients
            .iter()
            .map(|client| drain(client).iter().map(|f| f.data().to_string()).collect())
            .collect();
        assert_eq!(orders[0].len(), 1_000);
        assert!(orders.iter().all(|order| *order == orders[0]));
        for thread in 0..4 {
            let prefix = format!("t{thread}-");
            let own: Vec<_> = orders[0]
                .iter()
                .filter(|data| data.starts_with(&prefix))
                .cloned()
                .collect();
            let expected: Vec<_> = (0..250).map(|i| format!("{prefix}{i}")).collect();
            assert_eq!(own, expected);
        }
    }

    // alice listens from the start, bob reconnects with the last id he saw,
    // and alice's departure is only announced to bob.
    #[tokio::test]
    async fn test_chat_replay_and_departure_scenario() {
        let source = Arc::new(EventSource::new("default"));
        let alice = Client::new("alice");
        alice.subscribe(&source, None).unwrap();

        source
            .send_payload(
                &ChatMessage::new("alice", "hi"),
                Some(EventId::new(100)),
                History::Record,
            )
            .unwrap();

        assert_eq!(
            alice.try_recv().unwrap().as_str(),
            "data:{\"user\":\"alice\",\"text\":\"hi\"}\nid:100\n\n"
        );

        let bob = Client::new("bob");
        bob.subscribe(&source, Some(EventId::new(100))).unwrap();
        assert_eq!(
            bob.try_recv().unwrap().as_str(),
            "data:{\"user\":\"alice\",\"text\":\"hi\"}\nid:100\n\n"
        );
        assert!(bob.try_recv().is_none());

        alice.close().unwrap();

        let departure = Frame::decode(bob.try_recv().unwrap().as_str()).unwrap();
        assert_eq!(departure.data(), r#"{"user":"alice","text":"left the chat"}"#);
        assert!(alice.try_recv().is_none());
        assert_eq!(source.listener_count(), 1);
    }
}
