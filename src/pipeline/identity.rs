//! Identity matching: continuous missing-person loop and single-image match

use crate::dedup::IdentityCooldown;
use crate::error::{Error, Result};
use crate::models::Alert;
use crate::state::AppState;
use crate::video_source::{SourceDescriptor, VideoSource};
use crate::worker::CancelSignal;
use serde::Serialize;
use std::time::Duration;

use super::{commit_pipeline_error, epoch_secs};

/// Match-distance ceiling for the single-image endpoint
pub const MATCH_DISTANCE_IMAGE: f64 = 100.0;

/// Match-distance ceiling for the continuous loop.
///
/// Deliberately looser than the single-image path; the two have always
/// been tuned separately.
pub const MATCH_DISTANCE_STREAM: f64 = 110.0;

/// Seconds before the same identity may re-alert
pub const REALERT_WINDOW_SECS: f64 = 300.0;

/// Frames skipped between recognition attempts in the continuous loop
pub const STREAM_FRAME_STRIDE: usize = 5;

/// How long to wait on a live source before re-checking cancellation
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Single-image match result
#[derive(Debug, Clone, Serialize)]
pub struct MatchImageResult {
    pub matched: bool,
    pub faces_checked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

/// Continuous identity matching loop, run under a WorkerSupervisor.
///
/// The trained recognizer artifact is a hard requirement: its absence is
/// a resource fault that terminates the loop before any frame is read.
pub async fn run_stream(state: AppState, descriptor: SourceDescriptor, cancel: CancelSignal) {
    match state.inference.recognizer_ready().await {
        Ok(true) => {}
        Ok(false) => {
            commit_pipeline_error(&state.events, "identity", "face recognizer model not trained")
                .await;
            return;
        }
        Err(e) => {
            commit_pipeline_error(&state.events, "identity", &e.to_string()).await;
            return;
        }
    }

    let mut source = match VideoSource::open(&descriptor, &state.config.video_dir).await {
        Ok(source) => source,
        Err(e) => {
            commit_pipeline_error(&state.events, "identity", &e.to_string()).await;
            return;
        }
    };

    let mut dedup = IdentityCooldown::new(REALERT_WINDOW_SECS);
    let mut frame_idx = 0usize;

    'outer: loop {
        if *cancel.borrow() {
            tracing::info!("Identity loop cancelled");
            break;
        }

        let frame = match tokio::time::timeout(READ_POLL_TIMEOUT, source.read_frame()).await {
            Err(_) => continue,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Frame read failed, retrying");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            Ok(Ok(None)) => {
                tracing::info!("Identity source reached end of stream");
                break;
            }
            Ok(Ok(Some(frame))) => frame,
        };

        let idx = frame_idx;
        frame_idx += 1;
        if idx % STREAM_FRAME_STRIDE != 0 {
            continue;
        }

        let faces = match state.inference.detect_faces(frame.jpeg.clone()).await {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, "Face detection failed, skipping frame");
                continue;
            }
        };

        for bbox in faces {
            let matched = match state.inference.recognize_face(frame.jpeg.clone(), &bbox).await {
                Ok(m) => m,
                Err(Error::ResourceUnavailable(msg)) => {
                    // trained artifact disappeared mid-run
                    commit_pipeline_error(&state.events, "identity", &msg).await;
                    break 'outer;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Face recognition failed, skipping face");
                    continue;
                }
            };

            if matched.distance >= MATCH_DISTANCE_STREAM {
                continue;
            }
            if !dedup.allow(matched.label_id, epoch_secs()) {
                continue;
            }

            match commit_match(&state, matched.label_id, matched.distance).await {
                Ok(Some(alert)) => {
                    tracing::info!(
                        person_id = alert.person_id,
                        name = %alert.name,
                        confidence = alert.confidence,
                        "Missing person alert committed"
                    );
                }
                Ok(None) => {
                    tracing::debug!(label_id = matched.label_id, "Match has no identity record");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Identity lookup failed, skipping match");
                }
            }
        }
    }

    source.release().await;
}

/// Match faces in a single uploaded image against registered identities
pub async fn match_image(state: &AppState, jpeg: Vec<u8>) -> Result<MatchImageResult> {
    if !state.inference.recognizer_ready().await? {
        return Err(Error::ResourceUnavailable(
            "face recognizer model not trained".to_string(),
        ));
    }

    let faces = state.inference.detect_faces(jpeg.clone()).await?;
    let faces_checked = faces.len();

    // strongest (lowest-distance) acceptable match wins
    let mut best: Option<crate::inference::FaceMatch> = None;
    for bbox in &faces {
        let matched = state.inference.recognize_face(jpeg.clone(), bbox).await?;
        if matched.distance < MATCH_DISTANCE_IMAGE
            && best.as_ref().map_or(true, |b| matched.distance < b.distance)
        {
            best = Some(matched);
        }
    }

    let alert = match best {
        Some(m) => commit_match(state, m.label_id, m.distance).await?,
        None => None,
    };

    Ok(MatchImageResult {
        matched: alert.is_some(),
        faces_checked,
        alert,
    })
}

/// Build and commit the alert plus its mirrored event for a match
async fn commit_match(state: &AppState, label_id: i64, distance: f64) -> Result<Option<Alert>> {
    let Some(record) = state.identities.lookup(&state.inference, label_id).await? else {
        return Ok(None);
    };

    let alert = Alert::new(record.name, record.age, label_id, match_confidence(distance));
    state.alerts.append(alert.clone()).await;
    state.events.append(alert.to_event()).await;
    Ok(Some(alert))
}

/// Map recognizer distance (lower = stronger) onto a 0-100 confidence
fn match_confidence(distance: f64) -> f32 {
    (100.0 - distance / 2.0).clamp(0.0, 100.0) as f32
}
