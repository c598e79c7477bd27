//! Progress API Handler
//!
//! Server-sent events for one build. Progress updates use the default event
//! name; the final event is named `complete` or `error`.

use std::convert::Infallible;

use apkforge_core::dto::progress::ProgressEvent;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::service::EventStream;
use crate::state::AppState;

/// GET /build-progress/{id}
/// Stream progress events until the build finishes
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events: EventStream = match Uuid::parse_str(&id) {
        Ok(id) => {
            tracing::debug!(job_id = %id, "Progress stream opened");
            state.progress.subscribe(id)
        }
        Err(_) => Box::pin(tokio_stream::once(ProgressEvent::unknown_job())),
    };

    Sse::new(events.map(|event| Ok(to_sse(&event)))).keep_alive(KeepAlive::default())
}

fn to_sse(event: &ProgressEvent) -> Event {
    let json = serde_json::to_string(&event.payload).unwrap_or_default();
    let sse = Event::default().data(json);

    match event.kind.event_name() {
        Some(name) => sse.event(name),
        None => sse,
    }
}
