//! Application state
//!
//! Holds all shared components and state. Each worker supervisor owns its
//! own phase, cancellation signal and lock; handlers receive everything
//! through this state rather than process-wide globals.

use crate::event_log::{AlertLog, EventLog};
use crate::inference::{IdentityStore, InferenceClient};
use crate::worker::WorkerSupervisor;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Inference service URL
    pub infer_url: String,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
    /// Upload directory for video files
    pub video_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            infer_url: std::env::var("INFER_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            video_dir: std::env::var("VIDEO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("videos")),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Inference service adapter
    pub inference: Arc<InferenceClient>,
    /// Identity metadata store (memoized)
    pub identities: Arc<IdentityStore>,
    /// Committed security events
    pub events: Arc<EventLog>,
    /// Committed missing-person alerts
    pub alerts: Arc<AlertLog>,
    /// Continuous activity classification worker
    pub activity_worker: Arc<WorkerSupervisor>,
    /// Continuous identity matching worker
    pub identity_worker: Arc<WorkerSupervisor>,
}

impl AppState {
    /// Assemble state from config
    pub fn new(config: AppConfig) -> Self {
        Self {
            inference: Arc::new(InferenceClient::new(config.infer_url.clone())),
            identities: Arc::new(IdentityStore::new()),
            events: Arc::new(EventLog::default()),
            alerts: Arc::new(AlertLog::default()),
            activity_worker: Arc::new(WorkerSupervisor::new("activity")),
            identity_worker: Arc::new(WorkerSupervisor::new("identity")),
            config,
        }
    }
}
