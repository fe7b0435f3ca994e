//! Server-sent snapshots: every matching change re-runs the query and pushes
//! the full result.

use std::convert::Infallible;
use std::future::Future;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{stream, Stream, StreamExt};
use serde::Serialize;

use crate::changes::Subscription;
use crate::error::Result;

pub fn snapshot_event<T: Serialize>(result: Result<T>) -> Event {
    match result {
        Ok(value) => Event::default()
            .event("snapshot")
            .json_data(&value)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
        Err(e) => {
            tracing::warn!("Failed to refresh stream snapshot: {}", e);
            Event::default().event("error").data(e.to_string())
        }
    }
}

/// Emits one snapshot straight away and another after each change the
/// subscription reports.
pub fn snapshot_stream<T, F, Fut>(
    subscription: Subscription,
    fetch: F,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>
where
    T: Serialize,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let triggers = stream::once(async {}).chain(subscription.into_stream().map(|_| ()));
    let events = triggers.then(move |_| {
        let fut = fetch();
        async move { Ok(snapshot_event(fut.await)) }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
