//! Sentinel Server Library
//!
//! Surveillance backend: detection pipelines, event feed and worker control.
//!
//! ## Architecture (10 Components)
//!
//! 1. FrameSampler - Stride-based frame selection from video sources
//! 2. CentroidTracker - Identity assignment across sampled frames
//! 3. RuleEngine - Behavioral heuristics over tracked entities
//! 4. Dedup - Label and identity cooldown suppression
//! 5. EventLog - Bounded event/alert ring buffers
//! 6. VideoSource - ffmpeg-backed frame decoding (webcam and files)
//! 7. Inference - HTTP adapter to the model-serving sidecar
//! 8. Pipeline - Batch scans and streaming loops (suspicion, mob, activity, identity)
//! 9. WorkerSupervisor - Lifecycle control for streaming loops
//! 10. WebAPI - REST API endpoints
//!
//! ## Design Principles
//!
//! - SSoT: AppState owns every shared service
//! - SOLID: Single responsibility per module
//! - No global mutable state: everything flows through injected handles

pub mod dedup;
pub mod error;
pub mod event_log;
pub mod frame_sampler;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod rule_engine;
pub mod state;
pub mod tracker;
pub mod video_source;
pub mod web_api;
pub mod worker;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState};
