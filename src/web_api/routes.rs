//! API Routes

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pipeline::{activity, identity, mob, suspicion};
use crate::state::AppState;
use crate::video_source::{SourceDescriptor, SourceKind};
use crate::worker::{WorkerStatus, WorkerSupervisor};

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & status
        .route("/healthz", get(super::health_check))
        .route("/api/status", get(super::system_status))
        // Uploads
        .route("/api/upload", post(upload_video))
        // Batch scans
        .route("/api/detect-image", post(detect_image))
        .route("/api/mob-detect", post(mob_detect))
        .route("/api/suspicious-detect", post(suspicious_detect))
        .route("/api/activity-detect", post(activity_detect))
        // Event feed
        .route("/api/events", get(list_events))
        .route("/api/events/reset", post(reset_events))
        // Alert feed
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/reset", post(reset_alerts))
        // Identity matching
        .route("/api/identity/match-image", post(match_image))
        // Worker control
        .route("/api/workers/:pipeline/start", post(start_worker))
        .route("/api/workers/:pipeline/stop", post(stop_worker))
        .route("/api/workers/:pipeline/status", get(worker_status))
        .with_state(state)
}

// ============================================
// Uploads
// ============================================

async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("video") {
            continue;
        }

        let filename = sanitize_filename(field.file_name().unwrap_or("upload.mp4"));
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::Validation(format!("failed to read upload: {e}")))?;

        tokio::fs::create_dir_all(&state.config.video_dir).await?;
        let target = state.config.video_dir.join(&filename);
        tokio::fs::write(&target, &data).await?;

        tracing::info!(
            filename = %filename,
            size_bytes = data.len(),
            "Video uploaded"
        );

        let dir_name = state
            .config
            .video_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "videos".to_string());

        return Ok(Json(json!({
            "message": "Video uploaded successfully",
            "video_path": format!("{dir_name}/{filename}"),
        })));
    }

    Err(Error::Validation("No video file".to_string()))
}

/// Keep only the final path component of a client-supplied filename
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_string();
    if base.is_empty() || base == "." || base == ".." {
        "upload.mp4".to_string()
    } else {
        base
    }
}

// ============================================
// Batch scans
// ============================================

#[derive(Debug, Deserialize)]
struct VideoPathRequest {
    video_path: Option<String>,
}

impl VideoPathRequest {
    fn path(&self) -> Result<&str> {
        self.video_path
            .as_deref()
            .ok_or_else(|| Error::Validation("video_path is required".to_string()))
    }
}

async fn detect_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<mob::ImageDetection>> {
    let image = read_image_field(multipart, "image").await?;
    let result = mob::detect_image(&state, image).await?;
    Ok(Json(result))
}

async fn mob_detect(
    State(state): State<AppState>,
    Json(req): Json<VideoPathRequest>,
) -> Result<Json<mob::MobScanSummary>> {
    let summary = mob::run_scan(&state, req.path()?).await?;
    Ok(Json(summary))
}

async fn suspicious_detect(
    State(state): State<AppState>,
    Json(req): Json<VideoPathRequest>,
) -> Result<Json<suspicion::SuspicionScanSummary>> {
    let summary = suspicion::run_scan(&state, req.path()?).await?;
    Ok(Json(summary))
}

async fn activity_detect(
    State(state): State<AppState>,
    Json(req): Json<VideoPathRequest>,
) -> Result<Json<activity::ActivityScanSummary>> {
    let summary = activity::run_scan(&state, req.path()?).await?;
    Ok(Json(summary))
}

async fn read_image_field(mut multipart: Multipart, name: &str) -> Result<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some(name) {
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::Validation(format!("failed to read upload: {e}")))?;
            return Ok(data.to_vec());
        }
    }
    Err(Error::Validation(format!("No {name} provided")))
}

// ============================================
// Event / alert feed
// ============================================

#[derive(Debug, Deserialize)]
struct FeedQuery {
    limit: Option<usize>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Json<serde_json::Value> {
    let events = match query.limit {
        Some(limit) => state.events.recent(limit).await,
        None => state.events.all().await,
    };
    Json(json!({ "events": events }))
}

async fn reset_events(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.events.reset().await;
    tracing::info!(cleared, "Event log reset");
    Json(json!({ "message": "Events cleared", "cleared": cleared }))
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Json<serde_json::Value> {
    let alerts = match query.limit {
        Some(limit) => state.alerts.recent(limit).await,
        None => state.alerts.all().await,
    };
    Json(json!({ "alerts": alerts }))
}

async fn reset_alerts(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.alerts.reset().await;
    tracing::info!(cleared, "Alert log reset");
    Json(json!({ "message": "Alerts cleared", "cleared": cleared }))
}

// ============================================
// Identity matching
// ============================================

async fn match_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<identity::MatchImageResult>> {
    let image = read_image_field(multipart, "image").await?;
    let result = identity::match_image(&state, image).await?;
    Ok(Json(result))
}

// ============================================
// Worker control
// ============================================

#[derive(Debug, Deserialize)]
struct StartWorkerRequest {
    #[serde(default = "default_source_kind")]
    source: SourceKind,
    video_path: Option<String>,
}

fn default_source_kind() -> SourceKind {
    SourceKind::Webcam
}

impl StartWorkerRequest {
    fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            kind: self.source,
            path: self.video_path.clone(),
        }
    }
}

fn supervisor_for<'a>(state: &'a AppState, pipeline: &str) -> Result<&'a Arc<WorkerSupervisor>> {
    match pipeline {
        "activity" => Ok(&state.activity_worker),
        "identity" => Ok(&state.identity_worker),
        other => Err(Error::NotFound(format!("unknown pipeline: {other}"))),
    }
}

async fn start_worker(
    State(state): State<AppState>,
    Path(pipeline): Path<String>,
    Json(req): Json<StartWorkerRequest>,
) -> Result<Json<WorkerStatus>> {
    let descriptor = req.descriptor();
    let video_dir = state.config.video_dir.clone();

    let status = match pipeline.as_str() {
        "activity" => {
            let task_state = state.clone();
            let task_descriptor = descriptor.clone();
            state
                .activity_worker
                .start(descriptor, &video_dir, move |cancel| {
                    activity::run_stream(task_state, task_descriptor, cancel)
                })
                .await?
        }
        "identity" => {
            let task_state = state.clone();
            let task_descriptor = descriptor.clone();
            state
                .identity_worker
                .start(descriptor, &video_dir, move |cancel| {
                    identity::run_stream(task_state, task_descriptor, cancel)
                })
                .await?
        }
        other => return Err(Error::NotFound(format!("unknown pipeline: {other}"))),
    };

    Ok(Json(status))
}

async fn stop_worker(
    State(state): State<AppState>,
    Path(pipeline): Path<String>,
) -> Result<Json<WorkerStatus>> {
    let supervisor = supervisor_for(&state, &pipeline)?;
    Ok(Json(supervisor.stop().await))
}

async fn worker_status(
    State(state): State<AppState>,
    Path(pipeline): Path<String>,
) -> Result<Json<WorkerStatus>> {
    let supervisor = supervisor_for(&state, &pipeline)?;
    Ok(Json(supervisor.status().await))
}
