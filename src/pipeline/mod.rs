//! Detection pipelines
//!
//! ## Responsibilities
//!
//! - Batch scans over uploaded videos (suspicious activity, mob, activity)
//! - Continuous loops run under a WorkerSupervisor (activity, identity)
//!
//! Loop fault policy: transient per-sample faults are logged and skipped;
//! resource faults commit one terminal error event and exit the loop; the
//! frame source is released exactly once on every exit path.

pub mod activity;
pub mod identity;
pub mod mob;
pub mod suspicion;

use crate::event_log::EventLog;
use crate::models::{Event, Severity};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds since the epoch, for cooldown bookkeeping
pub(crate) fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Commit the terminal error event for a pipeline that hit a resource fault
pub(crate) async fn commit_pipeline_error(events: &EventLog, pipeline: &str, message: &str) {
    tracing::error!(pipeline = %pipeline, message = %message, "Pipeline stopped on resource fault");
    events
        .append(Event::new(
            "Pipeline Error",
            format!("{pipeline} pipeline stopped: {message}"),
            "System",
            Severity::Warning,
            100.0,
        ))
        .await;
}
