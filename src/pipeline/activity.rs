//! Activity classification: continuous clip loop and batch video scan

use crate::dedup::LabelCooldown;
use crate::error::Result;
use crate::frame_sampler::{FrameSampler, DEFAULT_SAMPLE_INTERVAL_SECS, MAX_SAMPLES};
use crate::models::{Event, Severity};
use crate::state::AppState;
use crate::video_source::{SourceDescriptor, VideoSource};
use crate::worker::CancelSignal;
use serde::Serialize;
use std::time::Duration;

use super::{commit_pipeline_error, epoch_secs};

/// Frames per clip submitted to the classifier
pub const CLIP_LEN: usize = 16;

/// Continuous loop: same-label cooldown (s)
pub const STREAM_SAME_LABEL_WINDOW_SECS: f64 = 10.0;

/// Continuous loop: any-label cooldown (s)
pub const STREAM_GLOBAL_WINDOW_SECS: f64 = 2.0;

/// Continuous loop: minimum confidence to commit (percent)
pub const STREAM_MIN_CONFIDENCE: f32 = 70.0;

/// Classifier label meaning "no notable activity"; never commits
pub const RESERVED_LABEL: &str = "normal";

/// Batch scan: same-label cooldown (s)
pub const BATCH_SAME_LABEL_WINDOW_SECS: f64 = 30.0;

/// Batch scan: minimum confidence to commit (percent)
pub const BATCH_MIN_CONFIDENCE: f32 = 60.0;

/// Benign class excluded from batch commits
pub const BATCH_BENIGN_LABEL: &str = "walking";

/// How long to wait on a live source before re-checking cancellation
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Batch scan result
#[derive(Debug, Clone, Serialize)]
pub struct ActivityScanSummary {
    pub message: String,
    pub video_path: String,
    pub clips_classified: usize,
    pub events_total: usize,
    pub latest_events: Vec<Event>,
}

/// Continuous activity classification loop, run under a WorkerSupervisor.
///
/// Frames accumulate into fixed-length clips; each full clip goes to the
/// external classifier and survivors of the dedup policy are committed.
pub async fn run_stream(state: AppState, descriptor: SourceDescriptor, cancel: CancelSignal) {
    let mut source = match VideoSource::open(&descriptor, &state.config.video_dir).await {
        Ok(source) => source,
        Err(e) => {
            commit_pipeline_error(&state.events, "activity", &e.to_string()).await;
            return;
        }
    };

    let mut dedup = LabelCooldown::new(STREAM_SAME_LABEL_WINDOW_SECS)
        .with_global_window(STREAM_GLOBAL_WINDOW_SECS)
        .with_min_confidence(STREAM_MIN_CONFIDENCE)
        .with_excluded_label(RESERVED_LABEL);
    let mut clip: Vec<Vec<u8>> = Vec::with_capacity(CLIP_LEN);

    loop {
        if *cancel.borrow() {
            tracing::info!("Activity loop cancelled");
            break;
        }

        let frame = match tokio::time::timeout(READ_POLL_TIMEOUT, source.read_frame()).await {
            // idle source; the timeout doubles as the bounded poll sleep
            Err(_) => continue,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Frame read failed, retrying");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            Ok(Ok(None)) => {
                tracing::info!("Activity source reached end of stream");
                break;
            }
            Ok(Ok(Some(frame))) => frame,
        };

        clip.push(frame.jpeg);
        if clip.len() < CLIP_LEN {
            continue;
        }
        let frames = std::mem::take(&mut clip);

        match state.inference.classify_clip(&frames).await {
            Ok(prediction) => {
                let confidence = prediction.probability * 100.0;
                if dedup.allow(&prediction.label, confidence, epoch_secs()) {
                    tracing::info!(
                        label = %prediction.label,
                        confidence,
                        "Activity committed"
                    );
                    state
                        .events
                        .append(activity_event(&prediction.label, confidence))
                        .await;
                }
            }
            Err(e) => {
                // single-clip inference failure is transient
                tracing::warn!(error = %e, "Clip classification failed, skipping");
            }
        }
    }

    source.release().await;
}

/// Batch activity-model scan over an uploaded video
pub async fn run_scan(state: &AppState, video_path: &str) -> Result<ActivityScanSummary> {
    let descriptor = SourceDescriptor::video(video_path);
    let mut source = VideoSource::open(&descriptor, &state.config.video_dir).await?;

    let result = scan_frames(state, &mut source).await;
    source.release().await;
    let clips_classified = result?;

    Ok(ActivityScanSummary {
        message: "Activity detection completed".to_string(),
        video_path: video_path.to_string(),
        clips_classified,
        events_total: state.events.len().await,
        latest_events: state.events.recent(10).await,
    })
}

async fn scan_frames(state: &AppState, source: &mut VideoSource) -> Result<usize> {
    let sampler = FrameSampler::new(source.fps(), DEFAULT_SAMPLE_INTERVAL_SECS);
    let dt = sampler.effective_dt();

    let mut dedup = LabelCooldown::new(BATCH_SAME_LABEL_WINDOW_SECS)
        .with_min_confidence(BATCH_MIN_CONFIDENCE)
        .with_excluded_label(BATCH_BENIGN_LABEL);

    let mut clip: Vec<Vec<u8>> = Vec::with_capacity(CLIP_LEN);
    let mut frame_idx = 0usize;
    let mut frames_processed = 0usize;
    let mut clips_classified = 0usize;

    while let Some(frame) = source.read_frame().await? {
        if sampler.should_process(frame_idx) {
            frames_processed += 1;
            clip.push(frame.jpeg);

            if clip.len() >= CLIP_LEN {
                let frames = std::mem::take(&mut clip);
                // scan clock is stream time, like the suspicion scan
                let now = frames_processed as f64 * dt;

                match state.inference.classify_clip(&frames).await {
                    Ok(prediction) => {
                        clips_classified += 1;
                        let confidence = prediction.probability * 100.0;
                        if dedup.allow(&prediction.label, confidence, now) {
                            state
                                .events
                                .append(activity_event(&prediction.label, confidence))
                                .await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Clip classification failed, skipping");
                    }
                }
            }

            if frames_processed >= MAX_SAMPLES {
                break;
            }
        }
        frame_idx += 1;
    }

    Ok(clips_classified)
}

fn activity_event(label: &str, confidence: f32) -> Event {
    Event::new(
        format!("Activity: {label}"),
        format!("Classifier reported '{label}' activity"),
        "Live Feed",
        Severity::Suspicious,
        confidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_event_shape() {
        let evt = activity_event("fighting", 84.2);
        assert_eq!(evt.event_type, "Activity: fighting");
        assert_eq!(evt.status, Severity::Suspicious);
        assert_eq!(evt.confidence, 84);
    }

    #[test]
    fn test_stream_policy_suppresses_reserved_label() {
        let mut dedup = LabelCooldown::new(STREAM_SAME_LABEL_WINDOW_SECS)
            .with_global_window(STREAM_GLOBAL_WINDOW_SECS)
            .with_min_confidence(STREAM_MIN_CONFIDENCE)
            .with_excluded_label(RESERVED_LABEL);
        assert!(!dedup.allow(RESERVED_LABEL, 99.0, 0.0));
        assert!(dedup.allow("fighting", 80.0, 0.0));
        // global 2s window blocks a different label right after
        assert!(!dedup.allow("running", 80.0, 1.0));
        assert!(dedup.allow("running", 80.0, 3.0));
    }

    #[test]
    fn test_batch_policy_windows() {
        let mut dedup = LabelCooldown::new(BATCH_SAME_LABEL_WINDOW_SECS)
            .with_min_confidence(BATCH_MIN_CONFIDENCE)
            .with_excluded_label(BATCH_BENIGN_LABEL);
        assert!(!dedup.allow(BATCH_BENIGN_LABEL, 99.0, 0.0));
        assert!(dedup.allow("fighting", 65.0, 0.0));
        assert!(!dedup.allow("fighting", 65.0, 29.0));
        assert!(dedup.allow("fighting", 65.0, 31.0));
        assert!(!dedup.allow("falling", 59.0, 40.0)); // below batch floor
    }
}
