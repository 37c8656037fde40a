//! Server-Sent Events (SSE) for import progress streaming

use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Optional filter on `GET /import/events`
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Only forward events for this import record
    pub import_id: Option<Uuid>,
}

/// GET /import/events - SSE event stream for import progress
///
/// Streams `ImportProgressUpdated`, `ImportPreparationProgress` and
/// `ImportRunFinished`, each with its event name as the SSE `event:` field.
pub async fn import_event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(import_id = ?filter.import_id, "New SSE client connected to import events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "SSE: Client lagging, events dropped");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if filter.import_id.is_some_and(|id| id != event.import_id()) {
                        continue;
                    }

                    let event_type = event.event_type().to_string();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting import event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/import/events", get(import_event_stream))
}
