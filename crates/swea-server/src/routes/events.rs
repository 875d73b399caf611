use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events: SSE stream of realtime channel events. Events sent before
/// the client connected are not replayed.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.channel.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        msg.ok().map(|ev| {
            Ok::<Event, Infallible>(Event::default().event(ev.event).data(ev.data.to_string()))
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
