use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use std::convert::Infallible;
use tokio_stream::StreamExt as _;

use crate::live::LiveEvent;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(live_updates))
}

/// Server-sent events for every accepted write. The subscription is
/// dropped, and so unregistered, when the client goes away.
async fn live_updates(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.hub.subscribe();
    let stream = subscription.map(|event| Ok(to_sse(event)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.config.live.keepalive())
            .text("ping"),
    )
}

fn to_sse(event: LiveEvent) -> Event {
    let name = event.kind.as_str();
    match Event::default().event(name).json_data(&event.payload) {
        Ok(sse) => sse,
        Err(e) => {
            tracing::error!("Failed to encode {} event: {}", name, e);
            Event::default().comment("dropped")
        }
    }
}
