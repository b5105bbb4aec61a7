//! Server-sent events endpoint backed by the notification hub.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use common::ConnectionId;
use futures_util::Stream;
use futures_util::stream;
use notify::{ChannelSink, Hub, Subscriber};
use order_store::OrderStore;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::MaybeIdentity;

/// Deregisters the connection when the response stream is dropped.
struct Registration {
    hub: Arc<Hub>,
    id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

fn frames(
    rx: UnboundedReceiver<Arc<str>>,
    registration: Registration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((rx, registration), |(mut rx, registration)| async move {
        let frame = rx.recv().await?;
        Some((Ok(Event::default().data(frame.as_ref())), (rx, registration)))
    })
}

/// GET /events: subscribes the caller to live notifications.
///
/// Anonymous callers only receive broadcasts. The stream ends when the hub
/// shuts down.
pub async fn subscribe<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeIdentity(actor): MaybeIdentity,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscriber = actor.map(Subscriber::from).unwrap_or_else(Subscriber::anonymous);
    let (sink, rx) = ChannelSink::new();
    let id = state
        .hub
        .subscribe(subscriber, Arc::new(sink))
        .map_err(|_| ApiError::Unavailable("server is shutting down".to_string()))?;

    tracing::debug!(connection_id = %id, "event stream opened");
    let registration = Registration {
        hub: state.hub.clone(),
        id,
    };
    Ok(Sse::new(frames(rx, registration)).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}
