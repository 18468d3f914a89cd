use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use headwatch_core::pipeline::frame_analysis::FrameAnalysis;
use headwatch_core::pipeline::monitor::monitor_service::MonitorStatus;

use crate::api_error::ApiError;
use crate::app_state::AppState;

/// Base64 screenshots from browsers easily exceed axum's 2 MB default.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const STREAM_POLL: Duration = Duration::from_millis(30);
const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";
const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

const ENDPOINTS: [&str; 12] = [
    "GET /",
    "GET /health",
    "POST /detect",
    "GET /detect_result",
    "GET /stream",
    "GET /video_feed",
    "POST /start",
    "POST /stop",
    "GET /status",
    "GET /sessions?user_id=",
    "GET /sessions/{id}",
    "DELETE /sessions/{id}",
];

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/detect", post(detect))
        .route("/detect_result", get(detect_result))
        .route("/stream", get(stream))
        .route("/video_feed", get(stream))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(session_details).delete(delete_session))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct DetectRequest {
    image: Option<String>,
}

#[derive(Serialize)]
pub struct DetectResponse {
    success: bool,
    status: &'static str,
    #[serde(flatten)]
    analysis: FrameAnalysis,
}

#[derive(Deserialize)]
pub struct StartRequest {
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    user_id: Option<String>,
    limit: Option<usize>,
}

async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "device": state.device,
        "endpoints": ENDPOINTS,
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "device": state.device }))
}

async fn detect(
    State(state): State<AppState>,
    body: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let image = request
        .image
        .filter(|image| !image.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image provided".into()))?;

    let use_case = state.detect.clone();
    let analysis = tokio::task::spawn_blocking(move || use_case.execute(&image)).await??;
    Ok(Json(DetectResponse {
        success: true,
        status: "ok",
        analysis,
    }))
}

async fn detect_result(State(state): State<AppState>) -> Json<Option<FrameAnalysis>> {
    Json(state.monitor.latest().analysis())
}

/// MJPEG preview of the running session: one JPEG part per published frame.
async fn stream(State(state): State<AppState>) -> Response {
    let latest = state.monitor.latest().clone();
    let shutdown = state.shutdown.clone();

    let parts = async_stream::stream! {
        let mut last_seq = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let snapshot = latest.snapshot();
            if snapshot.seq != last_seq {
                if let Some(jpeg) = snapshot.jpeg {
                    last_seq = snapshot.seq;
                    yield Ok::<Bytes, std::convert::Infallible>(mjpeg_part(&jpeg));
                }
            }
            tokio::time::sleep(STREAM_POLL).await;
        }
    };

    (
        [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)],
        Body::from_stream(parts),
    )
        .into_response()
}

fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

async fn start(
    State(state): State<AppState>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let user_id = body
        .ok()
        .and_then(|Json(request)| request.user_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id is required".into()))?;

    let monitor = state.monitor.clone();
    let session_id = tokio::task::spawn_blocking(move || monitor.start(&user_id)).await??;
    Ok(Json(json!({ "status": "started", "session_id": session_id })))
}

async fn stop(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let monitor = state.monitor.clone();
    let session_id = tokio::task::spawn_blocking(move || monitor.stop()).await??;
    Ok(Json(json!({ "status": "stopped", "session_id": session_id })))
}

async fn status(State(state): State<AppState>) -> Result<Json<MonitorStatus>, ApiError> {
    let monitor = state.monitor.clone();
    Ok(Json(
        tokio::task::spawn_blocking(move || monitor.status()).await?,
    ))
}

async fn session_details(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.monitor.store();
    let details = tokio::task::spawn_blocking(move || {
        let Some(session) = store.session(&session_id)? else {
            return Ok(None);
        };
        let screenshots = store.screenshots(&session_id)?;
        Ok::<_, ApiError>(Some((session, screenshots)))
    })
    .await??;

    match details {
        Some((session, screenshots)) => Ok(Json(json!({
            "session": session,
            "screenshots": screenshots,
        }))),
        None => Err(ApiError::NotFound("session not found".into())),
    }
}

/// A user's sessions, newest first, each with its capture count.
async fn list_sessions(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id is required".into()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let store = state.monitor.store();
    let sessions = tokio::task::spawn_blocking(move || {
        let mut rows = Vec::new();
        for session in store.sessions_for_user(user_id.trim(), limit)? {
            let count = store.screenshots(&session.id)?.len();
            let mut row = serde_json::to_value(&session)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            row["screenshot_count"] = json!(count);
            rows.push(row);
        }
        Ok::<_, ApiError>(rows)
    })
    .await??;

    Ok(Json(json!({ "success": true, "sessions": sessions })))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let monitor = state.monitor.clone();
    let id = session_id.clone();
    tokio::task::spawn_blocking(move || monitor.delete_session(&id)).await??;
    Ok(Json(json!({ "status": "deleted", "session_id": session_id })))
}
