//! Axum router implementing the operator HTTP surface and the peer-to-peer
//! `/webdir` ingress route (§6).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use webdir_core::{client, Code, Message, MessageBody, MessageHeader, NodeHandle, Node, Oauth, ResponseStatus};

pub struct AppState {
    pub node: NodeHandle,
    pub http_password: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        .route("/record", get(record))
        .route("/dir", get(dir))
        .route("/nodes", get(nodes))
        .route("/ping", get(ping))
        .route(
            "/file",
            get(read_file).post(create_file).put(update_file).patch(update_file).delete(delete_file),
        )
        .route("/stop", get(stop))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_http_password));

    Router::new()
        .merge(guarded)
        .route("/webdir", post(web_dir))
        .with_state(state)
}

/// Rejects requests to the operator surface that don't present a matching
/// `X-Http-Password` header, when a password was configured. A no-op when
/// the host was started without `--http-password` (the browser-facing
/// cookie gate this guards in place of is out of scope here).
async fn require_http_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    if state.http_password.is_empty() {
        return next.run(request).await;
    }
    let presented = headers.get("X-Http-Password").and_then(|v| v.to_str().ok());
    if presented != Some(state.http_password.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    next.run(request).await
}

/// Writes the snapshot's content verbatim (already-serialized JSON) when
/// the call succeeded, else the full `MessageBody` as JSON — mirrors the
/// original's `recordHandler`/`dirHandler`/`nodesHandler`.
fn snapshot_response(body: MessageBody) -> Response {
    if body.status == ResponseStatus::Ok {
        ([("content-type", "application/json")], body.content).into_response()
    } else {
        (StatusCode::OK, Json(body)).into_response()
    }
}

async fn record(State(state): State<Arc<AppState>>) -> Response {
    snapshot_response(client::record(&state.node.ctx))
}

async fn dir(State(state): State<Arc<AppState>>) -> Response {
    snapshot_response(client::directory(&state.node.ctx))
}

async fn nodes(State(state): State<Arc<AppState>>) -> Response {
    snapshot_response(client::nodes(&state.node.ctx))
}

/// Reuses the record snapshot as a liveness probe, same as the original.
async fn ping(State(state): State<Arc<AppState>>) -> Response {
    snapshot_response(client::record(&state.node.ctx))
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    name: String,
}

async fn read_file(State(state): State<Arc<AppState>>, Query(q): Query<FileQuery>) -> Json<MessageBody> {
    Json(client::read_file(&state.node.ctx, &q.name).await)
}

async fn create_file(State(state): State<Arc<AppState>>, Query(q): Query<FileQuery>) -> Json<MessageBody> {
    Json(client::create_file(&state.node.ctx, &q.name).await)
}

async fn update_file(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FileQuery>,
    body: axum::body::Bytes,
) -> Json<MessageBody> {
    let content = String::from_utf8_lossy(&body).into_owned();
    Json(client::update_file(&state.node.ctx, &q.name, &content).await)
}

async fn delete_file(State(state): State<Arc<AppState>>, Query(q): Query<FileQuery>) -> Json<MessageBody> {
    Json(client::delete_file(&state.node.ctx, &q.name).await)
}

async fn stop(State(state): State<Arc<AppState>>) -> StatusCode {
    tracing::info!("stop requested over HTTP");
    state.node.ctx.cancel.cancel();
    StatusCode::OK
}

/// Decode failures on the outer `Message` return `BadFormat` here, at the
/// HTTP layer, rather than propagating an `InternalError` the way a decode
/// failure on a nested payload does inside the dispatcher (§7).
async fn web_dir(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Message> {
    let msg: Message = match serde_json::from_slice(&body) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(error = %e, "malformed /webdir request body");
            return Json(bad_format_message());
        }
    };
    Json(client::web_dir(&state.node.ctx, &msg).await)
}

fn bad_format_message() -> Message {
    Message {
        header: MessageHeader {
            node: Node {
                address: String::new(),
                oauth: Oauth {
                    user_name: String::new(),
                    password: String::new(),
                },
            },
            destination: String::new(),
        },
        body: MessageBody::new(Code::Response, ResponseStatus::BadFormat, "Bad Request"),
    }
}
