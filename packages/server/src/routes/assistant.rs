//! Writing assistant endpoints
//!
//! - `POST /api/assistant/tasks` - start a task on a page (202)
//! - `POST /api/assistant/stop` - interrupt the running task
//! - `GET /api/assistant/status` - current task and engine state
//! - `GET /api/assistant/events` - SSE stream of [`AssistantEvent`]s
//!
//! Only one task runs at a time; a second start gets 409 until the first
//! finishes or is stopped. Progress reaches clients through the event
//! stream, the task request itself returns as soon as the task is claimed.

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Json, Sse,
    },
    routing::{get, post},
    Router,
};
use futures::Stream;
use notesai_core::{AssistantEvent, AssistantStatus, TaskKind, TaskRequest};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

use crate::{AppState, HttpError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAccepted {
    pub task: TaskKind,
    pub page_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: AssistantStatus,
    pub enabled: bool,
}

fn unavailable() -> HttpError {
    HttpError::new(
        "The assistant is disabled: the in-browser engine is selected without server fallback",
        "ASSISTANT_UNAVAILABLE",
    )
}

async fn start_task(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> Result<(StatusCode, Json<TaskAccepted>), HttpError> {
    if !state.assistant_enabled() {
        return Err(unavailable());
    }

    let accepted = TaskAccepted {
        task: request.task,
        page_id: request.page_id.clone(),
    };
    let task = state
        .orchestrator()
        .start_page_task(state.pages.clone(), request)
        .map_err(|e| HttpError::from_assistant(e, "Failed to start task"))?;

    tracing::info!("Started {} on page {}", accepted.task, accepted.page_id);
    tokio::spawn(async move {
        // Failures were already logged and broadcast by the task itself
        let _ = task.await;
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn stop_task(State(state): State<AppState>) -> Json<StatusResponse> {
    let orchestrator = state.orchestrator();
    orchestrator.stop().await;
    Json(StatusResponse {
        status: orchestrator.status(),
        enabled: state.assistant_enabled(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.orchestrator().status(),
        enabled: state.assistant_enabled(),
    })
}

fn to_sse(event: &AssistantEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.name()).data(json)),
        Err(e) => {
            tracing::error!("Failed to serialize assistant event: {}", e);
            None
        }
    }
}

/// One JSON payload per event, named after the event type
async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("Assistant event client connected");
    let rx = state.orchestrator().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => to_sse(&event).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!("Assistant event client lagged by {} events", n);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/assistant/tasks", post(start_task))
        .route("/api/assistant/stop", post(stop_task))
        .route("/api/assistant/status", get(status))
        .route("/api/assistant/events", get(events))
        .with_state(state)
}
