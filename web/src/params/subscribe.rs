use axum::http::{HeaderMap, HeaderName};
use log::*;
use serde::Deserialize;
use sse::EventId;

/// Name shown for subscribers that do not pass a `username`.
pub(crate) const ANONYMOUS_USERNAME: &str = "A BIG DUMMY";

static LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubscribeParams {
    pub(crate) username: Option<String>,
    pub(crate) last_event_id: Option<String>,
}

impl SubscribeParams {
    pub(crate) fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(ANONYMOUS_USERNAME)
    }

    /// The id to replay history from. The `Last-Event-ID` header sent by a
    /// reconnecting browser wins over the query parameter; unparsable ids are
    /// ignored.
    pub(crate) fn last_event_id(&self, headers: &HeaderMap) -> Option<EventId> {
        let raw = headers
            .get(&LAST_EVENT_ID)
            .and_then(|value| value.to_str().ok())
            .or(self.last_event_id.as_deref())?;

        match raw.parse::<EventId>() {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("Ignoring unparsable last event id {raw:?}: {e}");
                None
            }
        }
    }
}
