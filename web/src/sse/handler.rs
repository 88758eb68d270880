use crate::error::Error;
use crate::params::sanitize;
use crate::params::subscribe::SubscribeParams;
use async_stream::stream;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use log::*;
use service::AppState;
use sse::Client;
use std::convert::Infallible;
use std::sync::Arc;

/// Closes the client when the response stream is dropped, whether the
/// browser disconnected, the server shut down or the stream ended.
struct ConnectionGuard(Arc<Client>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        match self.0.close() {
            Ok(()) => debug!("SSE connection closed for {}", self.0.identity()),
            Err(e) if e.is_closed() => {}
            Err(e) => warn!("Failed to close SSE client {}: {e}", self.0.id().as_str()),
        }
    }
}

/// SSE handler that establishes a long-lived connection to the default channel.
/// Frames are written to the body exactly as they were encoded by the hub.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    Query(params): Query<SubscribeParams>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let identity = sanitize::escape(params.username());
    let since = params.last_event_id(&headers);
    debug!("Establishing SSE connection for {identity} (last event id {since:?})");

    let client = app_state.sse_manager.connect(identity, since)?;
    let guard = ConnectionGuard(Arc::clone(&client));

    let stream = stream! {
        let _guard = guard;
        while let Some(frame) = client.recv().await {
            yield Ok::<_, Infallible>(String::from(frame));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
