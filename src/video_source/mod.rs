//! VideoSource - Frame Acquisition via ffmpeg
//!
//! ## Responsibilities
//!
//! - Validate source descriptors (webcam / uploaded video path)
//! - Probe stream geometry and native frame rate with ffprobe
//! - Decode frames to JPEG through an ffmpeg child process
//! - Release the decoder exactly once on every exit path
//!
//! Video decoding itself stays external: this module only supervises the
//! ffmpeg process and splits its MJPEG output into frames.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// Default webcam device
const WEBCAM_DEVICE: &str = "/dev/video0";

/// Geometry assumed for webcam capture
const WEBCAM_WIDTH: u32 = 640;
const WEBCAM_HEIGHT: u32 = 480;
const WEBCAM_FPS: f64 = 15.0;

/// Source kind for a detection pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Webcam,
    Video,
}

/// Where a pipeline reads its frames from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    /// Path relative to the upload directory; required for `Video`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SourceDescriptor {
    pub fn webcam() -> Self {
        Self {
            kind: SourceKind::Webcam,
            path: None,
        }
    }

    pub fn video(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Video,
            path: Some(path.into()),
        }
    }

    /// Check the descriptor synchronously, resolving the video path.
    ///
    /// Failures here are configuration errors: no worker is spawned and
    /// no source is opened.
    pub fn validate(&self, video_dir: &Path) -> Result<()> {
        match self.kind {
            SourceKind::Webcam => Ok(()),
            SourceKind::Video => {
                let path = self
                    .path
                    .as_deref()
                    .ok_or_else(|| Error::Validation("video_path is required".to_string()))?;
                let resolved = resolve_video_path(video_dir, path)?;
                if !resolved.is_file() {
                    return Err(Error::Validation(format!(
                        "video file not found: {}",
                        resolved.display()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Human-readable source tag for status/log output
    pub fn describe(&self) -> String {
        match self.kind {
            SourceKind::Webcam => "webcam".to_string(),
            SourceKind::Video => format!("video:{}", self.path.as_deref().unwrap_or("")),
        }
    }
}

/// Reject path traversal out of the upload directory
fn resolve_video_path(video_dir: &Path, path: &str) -> Result<PathBuf> {
    if path.contains("..") {
        return Err(Error::Validation("invalid video path".to_string()));
    }
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(Error::Validation("video path must be relative".to_string()));
    }
    // uploads are returned as "videos/<name>"; accept both with and
    // without the directory prefix
    let stripped = match video_dir.file_name() {
        Some(dir_name) => candidate.strip_prefix(dir_name).unwrap_or(candidate),
        None => candidate,
    };
    Ok(video_dir.join(stripped))
}

/// One decoded frame, JPEG-encoded
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
}

/// Stream geometry and rate from the probe
#[derive(Debug, Clone, Copy)]
struct StreamInfo {
    width: u32,
    height: u32,
    fps: f64,
}

/// An open frame stream backed by an ffmpeg child process
pub struct VideoSource {
    child: Child,
    stdout: ChildStdout,
    buf: Vec<u8>,
    info: StreamInfo,
    released: bool,
    descriptor: SourceDescriptor,
}

impl VideoSource {
    /// Open the source. Failures here are resource faults.
    pub async fn open(descriptor: &SourceDescriptor, video_dir: &Path) -> Result<Self> {
        descriptor.validate(video_dir)?;

        let (info, input_args) = match descriptor.kind {
            SourceKind::Webcam => (
                StreamInfo {
                    width: WEBCAM_WIDTH,
                    height: WEBCAM_HEIGHT,
                    fps: WEBCAM_FPS,
                },
                vec![
                    "-f".to_string(),
                    "v4l2".to_string(),
                    "-framerate".to_string(),
                    format!("{WEBCAM_FPS}"),
                    "-video_size".to_string(),
                    format!("{WEBCAM_WIDTH}x{WEBCAM_HEIGHT}"),
                    "-i".to_string(),
                    WEBCAM_DEVICE.to_string(),
                ],
            ),
            SourceKind::Video => {
                let path =
                    resolve_video_path(video_dir, descriptor.path.as_deref().unwrap_or_default())?;
                let info = probe(&path).await?;
                (
                    info,
                    vec!["-i".to_string(), path.to_string_lossy().into_owned()],
                )
            }
        };

        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .args(&input_args)
            .args(["-f", "image2pipe", "-vcodec", "mjpeg", "-q:v", "5", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ResourceUnavailable(format!("failed to start ffmpeg: {e}"))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ResourceUnavailable("ffmpeg stdout unavailable".to_string()))?;

        tracing::info!(
            source = %descriptor.describe(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Video source opened"
        );

        Ok(Self {
            child,
            stdout,
            buf: Vec::new(),
            info,
            released: false,
            descriptor: descriptor.clone(),
        })
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Native frame rate of the stream
    pub fn fps(&self) -> f64 {
        self.info.fps
    }

    /// Read the next JPEG frame. `None` means end of stream.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.extract_frame() {
                return Ok(Some(frame));
            }

            let mut chunk = [0u8; 65536];
            let n = self.stdout.read(&mut chunk).await?;
            if n == 0 {
                // drained decoder output
                return Ok(self.extract_frame());
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Split one complete JPEG (SOI..EOI) off the front of the buffer
    fn extract_frame(&mut self) -> Option<Frame> {
        let soi = find_marker(&self.buf, 0xD8)?;
        let eoi = find_marker(&self.buf[soi..], 0xD9).map(|off| soi + off)?;
        let frame: Vec<u8> = self.buf[soi..eoi + 2].to_vec();
        self.buf.drain(..eoi + 2);
        Some(Frame { jpeg: frame })
    }

    /// Release the decoder process. Safe to call more than once.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        tracing::debug!(source = %self.descriptor.describe(), "Video source released");
    }
}

/// Find a `FF xx` JPEG marker, returning the offset of the FF byte
fn find_marker(buf: &[u8], marker: u8) -> Option<usize> {
    buf.windows(2)
        .position(|w| w[0] == 0xFF && w[1] == marker)
}

/// Probe width/height/fps with ffprobe
async fn probe(path: &Path) -> Result<StreamInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| Error::ResourceUnavailable(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(Error::ResourceUnavailable(format!(
            "ffprobe failed for {}",
            path.display()
        )));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let stream = json["streams"]
        .get(0)
        .ok_or_else(|| Error::ResourceUnavailable("no video stream found".to_string()))?;

    let width = stream["width"].as_u64().unwrap_or(WEBCAM_WIDTH as u64) as u32;
    let height = stream["height"].as_u64().unwrap_or(WEBCAM_HEIGHT as u64) as u32;
    let fps = stream["avg_frame_rate"]
        .as_str()
        .map(parse_rate)
        .unwrap_or(0.0);

    Ok(StreamInfo { width, height, fps })
}

/// Parse an ffprobe rational like "30000/1001"
fn parse_rate(rate: &str) -> f64 {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(1.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => rate.parse().unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webcam_descriptor_validates_without_path() {
        let desc = SourceDescriptor::webcam();
        assert!(desc.validate(Path::new("/nonexistent")).is_ok());
    }

    #[test]
    fn test_video_descriptor_requires_path() {
        let desc = SourceDescriptor {
            kind: SourceKind::Video,
            path: None,
        };
        let err = desc.validate(Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_file_is_a_validation_error() {
        let desc = SourceDescriptor::video("does-not-exist.mp4");
        let err = desc.validate(Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let desc = SourceDescriptor::video("../etc/passwd");
        assert!(desc.validate(Path::new("/tmp")).is_err());

        let desc = SourceDescriptor::video("/etc/passwd");
        assert!(desc.validate(Path::new("/tmp")).is_err());
    }

    #[test]
    fn test_existing_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();

        let desc = SourceDescriptor::video("clip.mp4");
        assert!(desc.validate(dir.path()).is_ok());
    }

    #[test]
    fn test_parse_rate_forms() {
        assert!((parse_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25/1"), 25.0);
        assert_eq!(parse_rate("0/0"), 0.0);
        assert_eq!(parse_rate("24"), 24.0);
    }

    #[test]
    fn test_find_marker() {
        let data = [0x00, 0xFF, 0xD8, 0xFF, 0xEE, 0xFF, 0xD9];
        assert_eq!(find_marker(&data, 0xD8), Some(1));
        assert_eq!(find_marker(&data, 0xD9), Some(5));
        assert_eq!(find_marker(&data, 0xC0), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(SourceDescriptor::webcam().describe(), "webcam");
        assert_eq!(
            SourceDescriptor::video("videos/a.mp4").describe(),
            "video:videos/a.mp4"
        );
    }
}
