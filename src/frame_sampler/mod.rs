//! FrameSampler - Analysis Cadence Control
//!
//! ## Responsibilities
//!
//! - Decide which frames of a stream are analyzed, given the target
//!   analysis cadence and the stream's native frame rate
//! - Provide the effective elapsed time between processed samples for
//!   speed computation

/// Target analysis cadence in seconds of stream time
pub const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 2.0;

/// Frame rate assumed when the source reports none
pub const FALLBACK_FPS: f64 = 15.0;

/// Hard cap on processed samples per batch scan
pub const MAX_SAMPLES: usize = 300;

/// Decides which frames are analyzed
#[derive(Debug, Clone)]
pub struct FrameSampler {
    fps: f64,
    stride: usize,
}

impl FrameSampler {
    /// Create a sampler for a stream with the given native frame rate
    pub fn new(fps: f64, sample_interval_secs: f64) -> Self {
        let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };
        let stride = ((fps * sample_interval_secs) as usize).max(1);
        Self { fps, stride }
    }

    /// True if the frame at this index should be analyzed
    pub fn should_process(&self, frame_idx: usize) -> bool {
        frame_idx % self.stride == 0
    }

    /// Effective elapsed stream time between processed samples.
    ///
    /// Floored at 0.5s so near-zero intervals never blow up the
    /// speed computation.
    pub fn effective_dt(&self) -> f64 {
        (self.stride as f64 / self.fps.max(1.0)).max(0.5)
    }

    /// Native frame rate the sampler was built for
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Frames skipped between processed samples
    pub fn stride(&self) -> usize {
        self.stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_from_fps_and_interval() {
        let sampler = FrameSampler::new(10.0, 2.0);
        assert_eq!(sampler.stride(), 20);
        assert!(sampler.should_process(0));
        assert!(!sampler.should_process(10));
        assert!(sampler.should_process(20));
    }

    #[test]
    fn test_synthetic_clip_yields_two_samples() {
        // 10 fps, 30 frames, one sample per 2 simulated seconds:
        // frames 0 and 20 are processed.
        let sampler = FrameSampler::new(10.0, 2.0);
        let processed = (0..30).filter(|i| sampler.should_process(*i)).count();
        assert_eq!(processed, 2);
    }

    #[test]
    fn test_zero_fps_falls_back() {
        let sampler = FrameSampler::new(0.0, 2.0);
        assert_eq!(sampler.fps(), FALLBACK_FPS);
        assert_eq!(sampler.stride(), 30);
    }

    #[test]
    fn test_effective_dt_floor() {
        // 1 frame stride at 60fps would be ~0.017s without the floor
        let sampler = FrameSampler::new(60.0, 0.01);
        assert_eq!(sampler.effective_dt(), 0.5);

        let sampler = FrameSampler::new(10.0, 2.0);
        assert!((sampler.effective_dt() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stride_never_zero() {
        let sampler = FrameSampler::new(0.1, 0.1);
        assert_eq!(sampler.stride(), 1);
    }
}
