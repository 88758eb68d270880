//! Server-Sent Events (SSE) broadcast hub for the chat server.
//!
//! Every connected browser is a [`Client`]: a closable queue of encoded frames
//! that the HTTP layer drains into a `text/event-stream` response. Messages are
//! published on an [`EventSource`] (a channel), which encodes each frame once and
//! fans it out to all registered clients in send order.
//!
//! # Architecture
//!
//! - **Weak listener references**: an event source keys its listeners by
//!   [`ClientId`] and only holds a `Weak<Client>`. The connection owns the
//!   client; a closed or dropped client is pruned on the next send.
//! - **Symmetric bookkeeping**: a client remembers the sources it listens to
//!   and each source remembers its listeners. `subscribe`, `unsubscribe` and
//!   `close` keep both sides in agreement.
//! - **Bounded replay**: each source keeps the last 10 recorded frames.
//!   A reconnecting client passes the last id it saw (`Last-Event-ID`) and
//!   gets every stored frame with an id at or after it before live traffic.
//! - **One lock per source**: sends, registrations and pruning on one source
//!   are serialized, which gives every listener the same total order. Sources
//!   are independent of one another.
//! - **Heartbeat**: a periodic ping and presence snapshot, never recorded in
//!   history.
//!
//! # Message Flow
//!
//! 1. A browser opens `/events/`; the web layer calls [`Manager::connect`]
//! 2. The client is subscribed to the default channel and a "joined" line is
//!    broadcast
//! 3. A `/commands/` post calls [`Manager::publish`], queuing the frame on
//!    every listener
//! 4. The web layer streams frames from [`Client::recv`] until it returns `None`
//! 5. On disconnect the web layer calls [`Client::close`], which detaches the
//!    client and broadcasts a "left" line to the remaining listeners
//!
//! # Modules
//!
//! - `frame`: wire codec for a single event and the `EventId` ordering key
//! - `client`: per-connection queue and subscription set
//! - `event_source`: listener registry, fan-out and replay history
//! - `manager`: named channel registry and chat-level operations
//! - `heartbeat`: periodic liveness and presence broadcast
//! - `message`: typed chat payloads and their SSE event types
//! - `error`: error kinds raised by the above

pub mod client;
pub mod error;
pub mod event_source;
pub mod frame;
pub mod heartbeat;
pub mod manager;
pub mod message;

pub use client::{Client, ClientId};
pub use event_source::{EventSource, History, HISTORY_CAPACITY};
pub use frame::{EncodedFrame, EventId, Frame};
pub use heartbeat::Heartbeat;
pub use manager::Manager;
