//! This module holds typed parameters for the hub's endpoint inputs.
//!
//! Query strings and form bodies are deserialized into these structs by axum's
//! extractors, so handlers only ever see decoded, typed values. User supplied
//! text is escaped with [`sanitize::escape`] before it reaches the broadcast hub.

pub(crate) mod command;
pub(crate) mod sanitize;
pub(crate) mod subscribe;
