//! Mob detection: people counting over single images and sampled videos

use crate::error::Result;
use crate::frame_sampler::{FrameSampler, DEFAULT_SAMPLE_INTERVAL_SECS, MAX_SAMPLES};
use crate::inference::Detection;
use crate::pipeline::suspicion::PERSON_CLASS_ID;
use crate::state::AppState;
use crate::video_source::{SourceDescriptor, VideoSource};
use serde::Serialize;

/// People in one frame at or above which a mob alert raises
pub const MOB_THRESHOLD: usize = 6;

/// Single-image detection result
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetection {
    pub people_count: usize,
    pub mob_alert: bool,
    pub boxes: Vec<Detection>,
}

/// Mob scan result over a sampled video
#[derive(Debug, Clone, Serialize)]
pub struct MobScanSummary {
    pub people_count: usize,
    pub mob_alert: bool,
    pub frames_sampled: usize,
    pub video_path: String,
}

/// Detect people in a single uploaded image
pub async fn detect_image(state: &AppState, jpeg: Vec<u8>) -> Result<ImageDetection> {
    let boxes = state.inference.detect_objects(jpeg).await?;
    let people_count = count_people(&boxes);

    Ok(ImageDetection {
        people_count,
        mob_alert: people_count >= MOB_THRESHOLD,
        boxes,
    })
}

/// Scan an uploaded video for the peak simultaneous people count
pub async fn run_scan(state: &AppState, video_path: &str) -> Result<MobScanSummary> {
    let descriptor = SourceDescriptor::video(video_path);
    let mut source = VideoSource::open(&descriptor, &state.config.video_dir).await?;

    let result = scan_frames(state, &mut source).await;
    source.release().await;
    let (max_people, frames_sampled) = result?;

    tracing::info!(
        video_path = %video_path,
        max_people,
        frames_sampled,
        "Mob scan completed"
    );

    Ok(MobScanSummary {
        people_count: max_people,
        mob_alert: max_people >= MOB_THRESHOLD,
        frames_sampled,
        video_path: video_path.to_string(),
    })
}

async fn scan_frames(state: &AppState, source: &mut VideoSource) -> Result<(usize, usize)> {
    let sampler = FrameSampler::new(source.fps(), DEFAULT_SAMPLE_INTERVAL_SECS);

    let mut max_people = 0usize;
    let mut frame_idx = 0usize;
    let mut frames_processed = 0usize;

    while let Some(frame) = source.read_frame().await? {
        if sampler.should_process(frame_idx) {
            frames_processed += 1;

            match state.inference.detect_objects(frame.jpeg).await {
                Ok(detections) => {
                    max_people = max_people.max(count_people(&detections));
                }
                Err(e) => {
                    tracing::warn!(error = %e, frame_idx, "Detection failed for sample, skipping");
                }
            }

            if frames_processed >= MAX_SAMPLES {
                break;
            }
        }
        frame_idx += 1;
    }

    Ok((max_people, frames_processed))
}

fn count_people(detections: &[Detection]) -> usize {
    detections
        .iter()
        .filter(|d| d.class_id == PERSON_CLASS_ID)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::BBox;

    fn person() -> Detection {
        Detection {
            class_id: PERSON_CLASS_ID,
            confidence: 0.9,
            bbox: BBox {
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
            },
        }
    }

    #[test]
    fn test_count_people_ignores_other_classes() {
        let mut detections = vec![person(), person()];
        detections.push(Detection {
            class_id: 24,
            ..person()
        });
        assert_eq!(count_people(&detections), 2);
    }

    #[test]
    fn test_mob_threshold_boundary() {
        assert!(MOB_THRESHOLD >= 1);
        let below = vec![person(); MOB_THRESHOLD - 1];
        let at = vec![person(); MOB_THRESHOLD];
        assert!(count_people(&below) < MOB_THRESHOLD);
        assert!(count_people(&at) >= MOB_THRESHOLD);
    }
}
