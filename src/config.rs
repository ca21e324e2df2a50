//! Scan configuration.
//!
//! [`ScanOptions`] is a builder that carries the capture knobs together with
//! the progress sink, cancellation token, and deadline, so the scanner and
//! coordinator signatures stay short.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use slidegrab::{CancellationToken, ScanOptions};
//!
//! let token = CancellationToken::new();
//! let options = ScanOptions::new()
//!     .with_min_interval(30)
//!     .with_max_interval(300)
//!     .with_stride(10)
//!     .with_workers(4)
//!     .with_cancellation(token.clone())
//!     .with_deadline(Duration::from_secs(3600));
//! assert!(options.validate().is_ok());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::format::Pixel;

use crate::decider::{
    CapturePolicy, DEFAULT_MAX_INTERVAL, DEFAULT_MIN_INTERVAL, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::error::SlidegrabError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressSink};

/// Default number of frames between two evaluated frames.
pub const DEFAULT_STRIDE: u64 = 5;

/// Pixel format of decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bpp). This is the default.
    #[default]
    Rgb8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    /// Map to the corresponding FFmpeg pixel format constant.
    #[cfg(feature = "ffmpeg")]
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Settings for a keyframe scan.
///
/// A default-constructed value uses the stock spacing (15 / 150 frames),
/// a stride of 5, a similarity threshold of 0.25, one worker per available
/// CPU, no progress sink, no cancellation, and no deadline.
#[derive(Clone)]
pub struct ScanOptions {
    pub(crate) policy: CapturePolicy,
    pub(crate) stride: u64,
    pub(crate) workers: usize,
    pub(crate) progress: Arc<dyn ProgressSink>,
    pub(crate) cancellation: Option<CancellationToken>,
    /// Progress cadence in frames read.
    pub(crate) batch_size: u64,
    pub(crate) deadline: Option<Duration>,
}

impl Debug for ScanOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ScanOptions")
            .field("policy", &self.policy)
            .field("stride", &self.stride)
            .field("workers", &self.workers)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            policy: CapturePolicy {
                min_interval: DEFAULT_MIN_INTERVAL,
                max_interval: DEFAULT_MAX_INTERVAL,
                similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            },
            stride: DEFAULT_STRIDE,
            workers: default_workers(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
            deadline: None,
        }
    }

    /// Minimum number of frames between two captures.
    #[must_use]
    pub fn with_min_interval(mut self, frames: u64) -> Self {
        self.policy.min_interval = frames;
        self
    }

    /// Number of frames after which unchanged content is captured again.
    #[must_use]
    pub fn with_max_interval(mut self, frames: u64) -> Self {
        self.policy.max_interval = frames;
        self
    }

    /// Evaluate every `frames`-th frame of each segment. `1` evaluates all.
    #[must_use]
    pub fn with_stride(mut self, frames: u64) -> Self {
        self.stride = frames;
        self
    }

    /// Number of segments, and of worker threads scanning them.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Similarity strictly below which text counts as new content.
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.policy.similarity_threshold = threshold;
        self
    }

    /// Replace the whole capture policy.
    #[must_use]
    pub fn with_policy(mut self, policy: CapturePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled every segment stops iterating and
    /// returns its partial report.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often progress fires, in frames read. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Stop every segment once `budget` has elapsed since the run started.
    #[must_use]
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(budget);
        self
    }

    /// The capture policy in effect.
    pub fn policy(&self) -> &CapturePolicy {
        &self.policy
    }

    /// Stride in frames.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Check the knobs for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidInput`] for a zero stride, zero
    /// workers, `min_interval > max_interval`, or a threshold outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<(), SlidegrabError> {
        if self.stride == 0 {
            return Err(SlidegrabError::InvalidInput(
                "stride must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(SlidegrabError::InvalidInput(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.policy.min_interval > self.policy.max_interval {
            return Err(SlidegrabError::InvalidInput(format!(
                "min interval ({}) exceeds max interval ({})",
                self.policy.min_interval, self.policy.max_interval
            )));
        }
        if !(0.0..=1.0).contains(&self.policy.similarity_threshold) {
            return Err(SlidegrabError::InvalidInput(format!(
                "similarity threshold {} is outside [0, 1]",
                self.policy.similarity_threshold
            )));
        }
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Absolute deadline for a run that started at `started`.
    pub(crate) fn deadline_from(&self, started: Instant) -> Option<Instant> {
        self.deadline.map(|budget| started + budget)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ScanOptions::new();
        assert_eq!(options.policy().min_interval, 15);
        assert_eq!(options.policy().max_interval, 150);
        assert_eq!(options.policy().similarity_threshold, 0.25);
        assert_eq!(options.stride(), 5);
        assert!(options.workers() >= 1);
        assert!(options.validate().is_ok());

        let debug = format!("{options:?}");
        assert!(debug.contains("ScanOptions"));
        assert!(debug.contains("has_cancellation: false"));
        assert!(debug.contains("batch_size: 1"));
    }

    #[test]
    fn batch_size_clamps_zero() {
        let options = ScanOptions::new().with_batch_size(0);
        assert!(format!("{options:?}").contains("batch_size: 1"));
    }

    #[test]
    fn zero_stride_rejected() {
        let result = ScanOptions::new().with_stride(0).validate();
        assert!(matches!(result, Err(SlidegrabError::InvalidInput(_))));
    }

    #[test]
    fn zero_workers_rejected() {
        let result = ScanOptions::new().with_workers(0).validate();
        assert!(matches!(result, Err(SlidegrabError::InvalidInput(_))));
    }

    #[test]
    fn inverted_intervals_rejected() {
        let result = ScanOptions::new()
            .with_min_interval(200)
            .with_max_interval(100)
            .validate();
        assert!(matches!(result, Err(SlidegrabError::InvalidInput(_))));
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        for threshold in [-0.1, 1.5, f64::NAN] {
            let result = ScanOptions::new()
                .with_similarity_threshold(threshold)
                .validate();
            assert!(matches!(result, Err(SlidegrabError::InvalidInput(_))));
        }
    }

    #[test]
    fn cancellation_is_observed() {
        let token = CancellationToken::new();
        let options = ScanOptions::new().with_cancellation(token.clone());
        assert!(!options.is_cancelled());
        token.cancel();
        assert!(options.is_cancelled());
    }
}
