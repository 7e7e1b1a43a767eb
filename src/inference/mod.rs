//! InferenceClient - Inference Service Adapter
//!
//! ## Responsibilities
//!
//! - Object/person detection over single frames
//! - Activity classification over fixed-length clips
//! - Face detection and identity recognition
//! - Identity metadata lookups (read-only, memoized)
//!
//! All model execution lives in an external inference service spoken to
//! over HTTP multipart. Per-sample failures surface as `Error::Inference`
//! and are treated as transient by the pipelines; a missing trained
//! recognizer is a resource fault.

use crate::error::{Error, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    /// Centroid used as the tracked position
    pub fn centroid(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// One detection from the object detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BBox,
}

#[derive(Debug, Clone, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Activity classifier output over a clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPrediction {
    pub label: String,
    pub probability: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct FacesResponse {
    #[serde(default)]
    faces: Vec<BBox>,
}

/// Identity match for one face; lower distance = stronger match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceMatch {
    pub label_id: i64,
    pub distance: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RecognizerStatus {
    trained: bool,
}

/// Identity metadata record from the external store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub label_id: i64,
    pub name: String,
    pub age: u32,
}

/// HTTP adapter for the inference service
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    /// Create a client with the default 30s timeout
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Check inference service health
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Detect objects/people in a single JPEG frame
    pub async fn detect_objects(&self, jpeg: Vec<u8>) -> Result<Vec<Detection>> {
        let url = format!("{}/v1/detect", self.base_url);
        let form = Form::new().part("image", jpeg_part(jpeg, "frame.jpg")?);

        let resp = self.client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Inference(format!(
                "detection failed: {}",
                resp.status()
            )));
        }

        let result: DetectResponse = resp.json().await?;
        Ok(result.detections)
    }

    /// Classify a fixed-length clip of JPEG frames
    pub async fn classify_clip(&self, frames: &[Vec<u8>]) -> Result<ActivityPrediction> {
        let url = format!("{}/v1/activity", self.base_url);
        let mut form = Form::new();
        for (i, frame) in frames.iter().enumerate() {
            form = form.part("frames", jpeg_part(frame.clone(), &format!("frame{i}.jpg"))?);
        }

        let resp = self.client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Inference(format!(
                "activity classification failed: {}",
                resp.status()
            )));
        }

        let result: ActivityPrediction = resp.json().await?;
        Ok(result)
    }

    /// Detect face bounding boxes in a JPEG frame
    pub async fn detect_faces(&self, jpeg: Vec<u8>) -> Result<Vec<BBox>> {
        let url = format!("{}/v1/faces", self.base_url);
        let form = Form::new().part("image", jpeg_part(jpeg, "frame.jpg")?);

        let resp = self.client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Inference(format!(
                "face detection failed: {}",
                resp.status()
            )));
        }

        let result: FacesResponse = resp.json().await?;
        Ok(result.faces)
    }

    /// Recognize the face inside `bbox`; the crop happens service-side
    pub async fn recognize_face(&self, jpeg: Vec<u8>, bbox: &BBox) -> Result<FaceMatch> {
        let url = format!("{}/v1/recognize", self.base_url);
        let form = Form::new()
            .part("image", jpeg_part(jpeg, "frame.jpg")?)
            .text("x1", bbox.x1.to_string())
            .text("y1", bbox.y1.to_string())
            .text("x2", bbox.x2.to_string())
            .text("y2", bbox.y2.to_string());

        let resp = self.client.post(&url).multipart(form).send().await?;
        if resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(Error::ResourceUnavailable(
                "face recognizer model not trained".to_string(),
            ));
        }
        if !resp.status().is_success() {
            return Err(Error::Inference(format!(
                "face recognition failed: {}",
                resp.status()
            )));
        }

        let result: FaceMatch = resp.json().await?;
        Ok(result)
    }

    /// Whether the trained recognizer artifact is present service-side
    pub async fn recognizer_ready(&self) -> Result<bool> {
        let url = format!("{}/v1/recognizer/status", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::ResourceUnavailable(format!(
                "recognizer status unavailable: {}",
                resp.status()
            )));
        }

        let status: RecognizerStatus = resp.json().await?;
        Ok(status.trained)
    }

    /// Fetch all registered identity records
    pub async fn identities(&self) -> Result<Vec<IdentityRecord>> {
        let url = format!("{}/v1/identities", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::ResourceUnavailable(format!(
                "identity store unavailable: {}",
                resp.status()
            )));
        }

        let records: Vec<IdentityRecord> = resp.json().await?;
        Ok(records)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn jpeg_part(data: Vec<u8>, name: &str) -> Result<Part> {
    Part::bytes(data)
        .file_name(name.to_string())
        .mime_str("image/jpeg")
        .map_err(|e| Error::Internal(format!("invalid mime: {e}")))
}

/// Read-only identity metadata store, fetched once and memoized.
///
/// Replaces a lazily-initialized global: the cell lives on the store
/// instance held by `AppState`, and first use performs the single load.
pub struct IdentityStore {
    cache: OnceCell<HashMap<i64, IdentityRecord>>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            cache: OnceCell::new(),
        }
    }

    /// Look up a recognizer label id, loading the map on first use
    pub async fn lookup(
        &self,
        client: &InferenceClient,
        label_id: i64,
    ) -> Result<Option<IdentityRecord>> {
        let map = self
            .cache
            .get_or_try_init(|| async {
                let records = client.identities().await?;
                tracing::info!(count = records.len(), "Identity metadata loaded");
                Ok::<_, Error>(records.into_iter().map(|r| (r.label_id, r)).collect())
            })
            .await?;

        Ok(map.get(&label_id).cloned())
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_centroid() {
        let bbox = BBox {
            x1: 10.0,
            y1: 20.0,
            x2: 30.0,
            y2: 60.0,
        };
        assert_eq!(bbox.centroid(), (20.0, 40.0));
    }

    #[test]
    fn test_detect_response_tolerates_missing_field() {
        let resp: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.detections.is_empty());
    }

    #[test]
    fn test_detection_deserializes() {
        let json = r#"{
            "detections": [
                {"class_id": 0, "confidence": 0.92,
                 "bbox": {"x1": 1.0, "y1": 2.0, "x2": 3.0, "y2": 4.0}}
            ]
        }"#;
        let resp: DetectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.detections.len(), 1);
        assert_eq!(resp.detections[0].class_id, 0);
    }
}
