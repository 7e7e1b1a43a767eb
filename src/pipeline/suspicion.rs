//! Suspicious-activity scan: sampler -> detector -> trackers -> rules -> feed

use crate::dedup::LabelCooldown;
use crate::error::Result;
use crate::frame_sampler::{FrameSampler, DEFAULT_SAMPLE_INTERVAL_SECS, MAX_SAMPLES};
use crate::inference::Detection;
use crate::models::Event;
use crate::rule_engine::{FrameDims, RuleEngine};
use crate::state::AppState;
use crate::tracker::{CentroidTracker, Observation, Point};
use crate::video_source::{SourceDescriptor, VideoSource};
use serde::Serialize;
use std::time::Instant;

/// COCO class id for a person
pub const PERSON_CLASS_ID: u32 = 0;

/// Object classes watched for unattended dwell (COCO ids)
pub const FLAGGED_CLASSES: [(u32, &str); 3] = [(24, "Backpack"), (26, "Handbag"), (28, "Suitcase")];

/// Detections below this confidence are ignored
pub const MIN_DETECTION_CONFIDENCE: f32 = 0.35;

/// Same-label cooldown applied to rule-engine candidates (s)
pub const RULE_DEDUP_WINDOW_SECS: f64 = 10.0;

/// Scan result returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct SuspicionScanSummary {
    pub message: String,
    pub video_path: String,
    pub frames_sampled: usize,
    pub runtime_sec: f64,
    pub events_total: usize,
    pub latest_events: Vec<Event>,
}

/// Run a suspicious-activity scan over an uploaded video.
///
/// The scan clock is stream time (sample index x effective dt), so dwell
/// heuristics behave the same however fast the file decodes.
pub async fn run_scan(state: &AppState, video_path: &str) -> Result<SuspicionScanSummary> {
    let descriptor = SourceDescriptor::video(video_path);
    let mut source = VideoSource::open(&descriptor, &state.config.video_dir).await?;

    let started = Instant::now();
    let result = scan_frames(state, &mut source).await;
    source.release().await;
    let frames_sampled = result?;

    let events_total = state.events.len().await;
    let latest_events = state.events.recent(10).await;

    tracing::info!(
        video_path = %video_path,
        frames_sampled,
        events_total,
        "Suspicious-activity scan completed"
    );

    Ok(SuspicionScanSummary {
        message: "Suspicious detection completed".to_string(),
        video_path: video_path.to_string(),
        frames_sampled,
        runtime_sec: (started.elapsed().as_secs_f64() * 100.0).round() / 100.0,
        events_total,
        latest_events,
    })
}

async fn scan_frames(state: &AppState, source: &mut VideoSource) -> Result<usize> {
    let sampler = FrameSampler::new(source.fps(), DEFAULT_SAMPLE_INTERVAL_SECS);
    let dims = FrameDims {
        width: source.width() as f64,
        height: source.height() as f64,
    };
    let dt = sampler.effective_dt();

    let mut people = CentroidTracker::for_people();
    let mut objects = CentroidTracker::for_objects();
    let mut engine = RuleEngine::new();
    let mut dedup = LabelCooldown::new(RULE_DEDUP_WINDOW_SECS);

    let mut frame_idx: usize = 0;
    let mut frames_processed: usize = 0;

    while let Some(frame) = source.read_frame().await? {
        if sampler.should_process(frame_idx) {
            let now = frames_processed as f64 * dt;
            frames_processed += 1;

            // transient inference faults degrade to an empty detection set
            let detections = match state.inference.detect_objects(frame.jpeg).await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(error = %e, frame_idx, "Detection failed for sample, skipping");
                    Vec::new()
                }
            };

            let (people_obs, object_obs) = split_detections(&detections);
            let assigned = people.update(&people_obs, now);
            objects.update(&object_obs, now);

            let candidates = engine.evaluate(&mut people, &mut objects, &assigned, dims, dt, now);
            for candidate in candidates {
                if dedup.allow(candidate.event_type, candidate.confidence, now) {
                    state
                        .events
                        .append(Event::new(
                            candidate.event_type,
                            candidate.description,
                            candidate.location,
                            candidate.status,
                            candidate.confidence,
                        ))
                        .await;
                }
            }

            if frames_processed >= MAX_SAMPLES {
                break;
            }
        }
        frame_idx += 1;
    }

    Ok(frames_processed)
}

/// Split raw detections into person and flagged-object observations
pub fn split_detections(detections: &[Detection]) -> (Vec<Observation>, Vec<Observation>) {
    let mut people = Vec::new();
    let mut objects = Vec::new();

    for det in detections {
        if det.confidence < MIN_DETECTION_CONFIDENCE {
            continue;
        }
        let (cx, cy) = det.bbox.centroid();
        let position = Point::new(cx, cy);

        if det.class_id == PERSON_CLASS_ID {
            people.push(Observation::at(position));
        } else if let Some((_, label)) = FLAGGED_CLASSES.iter().find(|(id, _)| *id == det.class_id)
        {
            objects.push(Observation::labeled(position, *label));
        }
    }

    (people, objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::BBox;

    fn det(class_id: u32, confidence: f32, x: f64, y: f64) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BBox {
                x1: x - 10.0,
                y1: y - 10.0,
                x2: x + 10.0,
                y2: y + 10.0,
            },
        }
    }

    #[test]
    fn test_split_keeps_people_and_flagged_classes() {
        let detections = vec![
            det(0, 0.9, 100.0, 100.0),
            det(24, 0.8, 200.0, 200.0),
            det(2, 0.9, 300.0, 300.0), // car: neither person nor flagged
        ];
        let (people, objects) = split_detections(&detections);
        assert_eq!(people.len(), 1);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].label.as_deref(), Some("Backpack"));
    }

    #[test]
    fn test_split_applies_confidence_floor() {
        let detections = vec![det(0, 0.34, 100.0, 100.0), det(0, 0.35, 200.0, 200.0)];
        let (people, _) = split_detections(&detections);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].position, Point::new(200.0, 200.0));
    }

    #[test]
    fn test_split_uses_bbox_centroid() {
        let detections = vec![det(0, 0.9, 150.0, 120.0)];
        let (people, _) = split_detections(&detections);
        assert_eq!(people[0].position, Point::new(150.0, 120.0));
    }
}
