//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the event stream endpoint.
//! The broadcast engine (Manager, EventSource, Client) lives in the `sse` crate.

pub mod handler;
