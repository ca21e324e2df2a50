//! Progress reporting and cancellation support.
//!
//! Each segment scanner reports to an injected [`ProgressSink`]. The sink is
//! shared by all workers, so implementations do their own thread-safe
//! aggregation (one bar per segment, atomic counters, ...). Progress is
//! advisory: nothing a sink does can influence capture decisions.
//!
//! [`CancellationToken`] lets another thread ask every in-flight scan to stop
//! after the frame it is currently working on.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use slidegrab::{CancellationToken, ProgressInfo, ProgressSink, ScanOptions};
//!
//! struct PrintProgress;
//!
//! impl ProgressSink for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("segment {}: {pct:.1}%", info.segment_id);
//!         }
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ScanOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::partition::Segment;
use crate::scanner::{CaptureEvent, ScanReport};

/// A snapshot of one segment's progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Segment the snapshot belongs to.
    pub segment_id: usize,
    /// Frames read from the source so far in this segment.
    pub current: u64,
    /// Frames in the segment.
    pub total: u64,
    /// Completion percentage (0.0 – 100.0); `None` for empty segments.
    pub percentage: Option<f32>,
    /// Wall-clock time since the segment started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Frame index most recently read.
    pub current_frame: Option<u64>,
}

/// Receiver of progress notifications from segment scanners.
///
/// Implementations must be [`Send`] and [`Sync`]: every worker thread calls
/// into the same sink.
pub trait ProgressSink: Send + Sync {
    /// Called every `batch_size` frames and once when a segment ends.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when a worker starts scanning a segment.
    fn on_segment_started(&self, _segment: &Segment) {}

    /// Called after a frame has been persisted.
    fn on_capture(&self, _event: &CaptureEvent) {}

    /// Called once per segment with its final report.
    fn on_segment_finished(&self, _report: &ScanReport) {}
}

/// A sink that discards all notifications. The default.
pub(crate) struct NoOpProgress;

impl ProgressSink for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state; call [`cancel`](CancellationToken::cancel) from any
/// thread and every scan holding a clone stops before its next frame.
///
/// ```
/// use slidegrab::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks one segment's progress and emits batched snapshots.
pub(crate) struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    segment_id: usize,
    total: u64,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(sink: Arc<dyn ProgressSink>, segment: &Segment, batch_size: u64) -> Self {
        Self {
            sink,
            segment_id: segment.id,
            total: segment.len(),
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one frame read and fire the sink if the batch is full.
    pub(crate) fn advance(&mut self, frame_number: u64) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(Some(frame_number));
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final snapshot.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, frame_number: Option<u64>) {
        let elapsed = self.start_time.elapsed();

        let percentage =
            (self.total > 0).then(|| (self.current as f32 / self.total as f32) * 100.0);

        let estimated_remaining = (self.current > 0).then(|| {
            let remaining = self.total.saturating_sub(self.current);
            elapsed.mul_f64(remaining as f64 / self.current as f64)
        });

        let info = ProgressInfo {
            segment_id: self.segment_id,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame_number,
        };

        self.sink.on_progress(&info);
    }
}
