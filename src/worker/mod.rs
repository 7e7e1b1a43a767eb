//! WorkerSupervisor - Pipeline Lifecycle Control
//!
//! ## Responsibilities
//!
//! - At most one running loop per pipeline (idempotent start)
//! - Cooperative cancellation via a watch channel the loop polls
//! - Optimistic stop with a bounded join (3s, best-effort)
//! - Side-effect-free status queries
//!
//! One supervisor instance exists per continuous pipeline; pipelines are
//! otherwise independent and may run concurrently. The internal mutex
//! guards phase transitions and handle bookkeeping only, never the hot
//! per-frame loop.

use crate::error::Result;
use crate::video_source::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Bounded wait for a stopping loop to exit
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Cancellation signal receiver handed to each loop
pub type CancelSignal = watch::Receiver<bool>;

/// Worker status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDescriptor>,
}

impl WorkerStatus {
    fn idle() -> Self {
        Self {
            running: false,
            source: None,
        }
    }
}

#[derive(Default)]
struct WorkerInner {
    running: bool,
    source: Option<SourceDescriptor>,
    cancel: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerInner {
    fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.running,
            source: self.source.clone(),
        }
    }

    /// A loop may exit on its own (end of stream, resource fault); fold
    /// that back into Idle before answering any request.
    fn sync_phase(&mut self) {
        if self.running && self.handle.as_ref().map_or(true, |h| h.is_finished()) {
            self.running = false;
            self.source = None;
            self.cancel = None;
            self.handle = None;
        }
    }
}

/// Supervises one detection pipeline's long-lived loop
pub struct WorkerSupervisor {
    name: &'static str,
    inner: Mutex<WorkerInner>,
}

impl WorkerSupervisor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(WorkerInner::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Start the pipeline loop built by `task`.
    ///
    /// Idempotent: if already running, the current status is returned and
    /// no second loop spawns. Descriptor validation failures return
    /// synchronously without transitioning the phase.
    pub async fn start<F, Fut>(
        &self,
        source: SourceDescriptor,
        video_dir: &Path,
        task: F,
    ) -> Result<WorkerStatus>
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;
        inner.sync_phase();

        if inner.running {
            tracing::warn!(worker = self.name, "Worker already running");
            return Ok(inner.status());
        }

        source.validate(video_dir)?;

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(task(rx));

        inner.running = true;
        inner.source = Some(source.clone());
        inner.cancel = Some(tx);
        inner.handle = Some(handle);

        tracing::info!(
            worker = self.name,
            source = %source.describe(),
            "Worker started"
        );

        Ok(inner.status())
    }

    /// Request the loop to stop and wait briefly for it to exit.
    ///
    /// The phase flips to Idle immediately; a loop that fails to join
    /// within the timeout neither reverts the phase nor blocks the caller
    /// further.
    pub async fn stop(&self) -> WorkerStatus {
        let handle = {
            let mut inner = self.inner.lock().await;
            inner.sync_phase();

            if !inner.running {
                return inner.status();
            }

            if let Some(cancel) = inner.cancel.take() {
                let _ = cancel.send(true);
            }
            inner.running = false;
            inner.source = None;
            inner.handle.take()
        };

        if let Some(handle) = handle {
            match tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {
                    tracing::info!(worker = self.name, "Worker stopped");
                }
                Ok(Err(e)) => {
                    tracing::error!(worker = self.name, error = %e, "Worker task failed");
                }
                Err(_) => {
                    tracing::warn!(
                        worker = self.name,
                        timeout_secs = STOP_JOIN_TIMEOUT.as_secs(),
                        "Worker did not exit within join timeout"
                    );
                }
            }
        }

        WorkerStatus::idle()
    }

    /// Current status without side effects beyond phase sync
    pub async fn status(&self) -> WorkerStatus {
        let mut inner = self.inner.lock().await;
        inner.sync_phase();
        inner.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn video_dir() -> &'static Path {
        Path::new("/tmp")
    }

    async fn poll_loop(mut cancel: CancelSignal) {
        while !*cancel.borrow() {
            if cancel.changed().await.is_err() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_start_transitions_to_running() {
        let sup = WorkerSupervisor::new("test");
        let status = sup
            .start(SourceDescriptor::webcam(), video_dir(), poll_loop)
            .await
            .unwrap();
        assert!(status.running);
        assert_eq!(status.source, Some(SourceDescriptor::webcam()));
        sup.stop().await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let sup = WorkerSupervisor::new("test");
        let spawns = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let spawns = spawns.clone();
            sup.start(SourceDescriptor::webcam(), video_dir(), move |cancel| {
                spawns.fetch_add(1, Ordering::SeqCst);
                poll_loop(cancel)
            })
            .await
            .unwrap();
        }

        // give the single spawned task a chance to run
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(spawns.load(Ordering::SeqCst), 1);
        sup.stop().await;
    }

    #[tokio::test]
    async fn test_stop_idle_is_noop() {
        let sup = WorkerSupervisor::new("test");
        let status = sup.stop().await;
        assert!(!status.running);
        assert!(status.source.is_none());
    }

    #[tokio::test]
    async fn test_stop_cancels_loop() {
        let sup = WorkerSupervisor::new("test");
        let exited = Arc::new(AtomicUsize::new(0));
        let exited_clone = exited.clone();

        sup.start(SourceDescriptor::webcam(), video_dir(), move |cancel| async move {
            poll_loop(cancel).await;
            exited_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        let status = sup.stop().await;
        assert!(!status.running);
        assert_eq!(exited.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_keeps_idle() {
        let sup = WorkerSupervisor::new("test");
        let bad = SourceDescriptor::video("missing.mp4");
        let err = sup
            .start(bad, Path::new("/nonexistent-dir"), poll_loop)
            .await;
        assert!(err.is_err());
        assert!(!sup.status().await.running);
    }

    #[tokio::test]
    async fn test_self_exited_loop_reads_idle() {
        let sup = WorkerSupervisor::new("test");
        sup.start(SourceDescriptor::webcam(), video_dir(), |_cancel| async {})
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sup.status().await.running);

        // and a new start succeeds after self-exit
        let status = sup
            .start(SourceDescriptor::webcam(), video_dir(), poll_loop)
            .await
            .unwrap();
        assert!(status.running);
        sup.stop().await;
    }

    #[tokio::test]
    async fn test_two_supervisors_independent() {
        let a = WorkerSupervisor::new("activity");
        let b = WorkerSupervisor::new("identity");

        a.start(SourceDescriptor::webcam(), video_dir(), poll_loop)
            .await
            .unwrap();
        assert!(a.status().await.running);
        assert!(!b.status().await.running);

        b.start(SourceDescriptor::webcam(), video_dir(), poll_loop)
            .await
            .unwrap();
        a.stop().await;
        assert!(!a.status().await.running);
        assert!(b.status().await.running);
        b.stop().await;
    }
}
