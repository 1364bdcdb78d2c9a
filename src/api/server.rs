//! API Server module
//!
//! This module provides the HTTP surface the view binding talks to: it
//! serves tree snapshots, accepts user intents, and streams change events.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::models::{Core, TaskId, Tree, TreeError};

/// Request to add a new root task
#[derive(Serialize, Deserialize)]
pub struct AddTaskRequest {
    pub label: String,
}

/// Request to add a child task under an existing task
#[derive(Serialize, Deserialize)]
pub struct AddChildRequest {
    pub label: String,
}

/// Request to replace a task's attached document
#[derive(Serialize, Deserialize)]
pub struct SetDocumentRequest {
    pub document: String,
}

/// Request to move a task to a new parent (or the root level) and position
#[derive(Serialize, Deserialize)]
pub struct MoveTaskRequest {
    /// Destination parent; `None` targets the root sequence
    pub parent: Option<TaskId>,
    /// Insertion position among the destination's children
    pub position: usize,
}

/// Query parameters for the visible-tree projection
#[derive(Serialize, Deserialize)]
pub struct VisibleQuery {
    #[serde(default)]
    pub show_completed: bool,
}

/// Response for task creation: the new task's id plus the new snapshot
#[derive(Serialize, Deserialize)]
pub struct TaskCreated {
    pub id: TaskId,
    pub tree: Tree,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 3000).into(),
        }
    }
}

/// API responses
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Helper function to map tree results to Axum responses
fn map_tree_result<T: Serialize>(result: Result<T, TreeError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(e) => {
            let status = match e {
                TreeError::InvalidInput => StatusCode::BAD_REQUEST,
                TreeError::NotFound(_) => StatusCode::NOT_FOUND,
                TreeError::Cycle { .. } | TreeError::DuplicateId(_) => StatusCode::CONFLICT,
            };
            (status, Json(ApiResponse::<T>::error(e.to_string()))).into_response()
        }
    }
}

/// Builds the application router; split out so tests can drive it directly.
pub fn router(core: Core) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // --- Snapshots --- //
        .route("/api/tree", get(get_tree))
        .route("/api/tree/visible", get(get_visible_tree))
        // --- Intents --- //
        .route("/api/tasks", post(add_task))
        .route("/api/tasks/:id/children", post(add_child))
        .route("/api/tasks/:id/toggle", post(toggle_task))
        .route("/api/tasks/:id/document", put(set_document))
        .route("/api/tasks/:id/move", post(move_task))
        .route("/api/tasks/:id", delete(remove_task))
        // --- Events --- //
        .route("/api/events", get(events_handler))
        .layer(cors)
        .with_state(core)
}

/// Starts the API server
pub async fn serve(core: Core, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let app = router(core);

    // Start server
    tracing::info!("Starting server on {}", config.address);
    let listener = TcpListener::bind(config.address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn get_tree(State(core): State<Core>) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(core.tree())))
}

async fn get_visible_tree(
    State(core): State<Core>,
    Query(query): Query<VisibleQuery>,
) -> impl IntoResponse {
    let projected = core.visible(query.show_completed);
    (StatusCode::OK, Json(ApiResponse::success(projected)))
}

async fn add_task(
    State(core): State<Core>,
    Json(payload): Json<AddTaskRequest>,
) -> impl IntoResponse {
    let result = core
        .add_root(&payload.label)
        .map(|(tree, id)| TaskCreated { id, tree });
    map_tree_result(result)
}

async fn add_child(
    State(core): State<Core>,
    Path(id): Path<TaskId>,
    Json(payload): Json<AddChildRequest>,
) -> impl IntoResponse {
    let result = core
        .add_child(id, &payload.label)
        .map(|(tree, id)| TaskCreated { id, tree });
    map_tree_result(result)
}

async fn toggle_task(State(core): State<Core>, Path(id): Path<TaskId>) -> impl IntoResponse {
    map_tree_result(core.toggle(id))
}

async fn set_document(
    State(core): State<Core>,
    Path(id): Path<TaskId>,
    Json(payload): Json<SetDocumentRequest>,
) -> impl IntoResponse {
    map_tree_result(core.set_document(id, &payload.document))
}

async fn move_task(
    State(core): State<Core>,
    Path(id): Path<TaskId>,
    Json(payload): Json<MoveTaskRequest>,
) -> impl IntoResponse {
    map_tree_result(core.move_task(id, payload.parent, payload.position))
}

async fn remove_task(State(core): State<Core>, Path(id): Path<TaskId>) -> impl IntoResponse {
    map_tree_result(core.remove(id))
}

// --- Event Stream --- //

async fn events_handler(State(core): State<Core>) -> impl IntoResponse {
    let receiver = core.subscribe();
    let stream = EventStream::new(core.clone(), receiver);

    // Set headers for event stream
    let headers = [
        (
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("text/event-stream"),
        ),
        (
            axum::http::header::CACHE_CONTROL,
            axum::http::HeaderValue::from_static("no-cache"),
        ),
    ];

    (headers, axum::body::Body::from_stream(stream))
}

struct EventStream {
    core: Core,
    receiver: tokio::sync::broadcast::Receiver<()>,
}

impl EventStream {
    fn new(core: Core, receiver: tokio::sync::broadcast::Receiver<()>) -> Self {
        Self { core, receiver }
    }
}

impl Stream for EventStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Try to receive from the broadcast channel with a non-blocking approach
        match self.receiver.try_recv() {
            Ok(()) => {
                // A mutation happened; tell the client to re-fetch
                Poll::Ready(Some(Ok("event: update\ndata: change\n\n".to_string())))
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Empty) => {
                // No updates available now, register the waker to be notified later
                let waker = cx.waker().clone();
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    waker.wake();
                });
                Poll::Pending
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => {
                // Some notifications were missed; one change event still
                // prompts the client to re-fetch the latest snapshot
                Poll::Ready(Some(Ok("event: update\ndata: change\n\n".to_string())))
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Closed) => {
                // Channel closed, try to resubscribe
                self.receiver = self.core.subscribe();
                Poll::Pending
            }
        }
    }
}
