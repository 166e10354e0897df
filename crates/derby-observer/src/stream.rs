//! Server-Sent Events stream of lobby and race announcements.
//!
//! Each announcement becomes one SSE frame whose `event:` is the
//! announcement kind and whose `data:` is the pre-serialized JSON payload.
//! The first frame is the snapshot queued at subscription time.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::state::AppState;
use crate::visitor::visitor_from_headers;

/// Open an event stream.
///
/// A visitor identity is optional here; without one the lobby
/// snapshots simply report `you_joined: false`.
pub async fn events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let visitor = visitor_from_headers(&headers);
    let subscription = state.controller.subscribe(visitor).await;
    debug!(observer = %subscription.id(), "event stream opened");

    let stream = subscription.map(|announcement| {
        Ok(Event::default()
            .event(announcement.kind.as_str())
            .data(announcement.data.as_str()))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
