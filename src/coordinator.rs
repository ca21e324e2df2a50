//! Parallel scanning of a whole video.
//!
//! [`ParallelScanCoordinator::run`] partitions the video once, then runs one
//! [`SegmentScanner`] per segment on a dedicated [`rayon`] pool of `workers`
//! threads. Each worker opens its own cursor on the shared source, so there
//! is no shared mutable state between segments. Outcomes travel back over a
//! channel and are kept in the order segments finished.
//!
//! A segment that cannot open or seek its cursor, or whose worker panics, is
//! recorded as [`SegmentOutcome::Failed`]; the remaining segments still run
//! to completion. Unreadable frames inside a segment only show up as
//! [`ScanReport::read_failures`].
//!
//! # Example
//!
//! ```no_run
//! use slidegrab::{
//!     FfmpegSource, ImageDirectoryPersister, ParallelScanCoordinator, ScanOptions,
//!     TesseractExtractor,
//! };
//!
//! let source = FfmpegSource::open("lecture.mp4")?;
//! let extractor = TesseractExtractor::new();
//! let persister = ImageDirectoryPersister::new("shots");
//!
//! let coordinator = ParallelScanCoordinator::new(ScanOptions::new().with_workers(8));
//! let summary = coordinator.run(&source, &extractor, &persister)?;
//! println!("{summary}");
//! # Ok::<(), slidegrab::SlidegrabError>(())
//! ```

use std::any::Any;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::{Duration, Instant};

#[cfg(feature = "ffmpeg")]
use std::path::Path;

use rayon::ThreadPoolBuilder;

use crate::config::ScanOptions;
use crate::error::SlidegrabError;
use crate::partition::{Segment, partition};
use crate::persist::FramePersister;
use crate::scanner::{CaptureEvent, ScanReport, SegmentScanner, StopReason};
use crate::source::VideoSource;
use crate::text::TextExtractor;

#[cfg(feature = "ffmpeg")]
use crate::{ffmpeg_source::FfmpegSource, persist::ImageDirectoryPersister};

/// How one segment ended.
#[derive(Debug)]
pub enum SegmentOutcome {
    /// The scan ran; possibly cut short by cancellation, deadline, or end of
    /// stream.
    Completed(ScanReport),
    /// The scan could not run.
    Failed {
        /// The segment that failed.
        segment: Segment,
        /// Why it failed.
        error: SlidegrabError,
    },
}

impl SegmentOutcome {
    /// The segment this outcome belongs to.
    pub fn segment(&self) -> &Segment {
        match self {
            SegmentOutcome::Completed(report) => &report.segment,
            SegmentOutcome::Failed { segment, .. } => segment,
        }
    }

    /// The report, for completed segments.
    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            SegmentOutcome::Completed(report) => Some(report),
            SegmentOutcome::Failed { .. } => None,
        }
    }
}

/// Aggregate result of a parallel scan.
#[derive(Debug)]
pub struct RunSummary {
    /// Frame count reported by the source.
    pub total_frames: u64,
    /// Frame rate reported by the source.
    pub frame_rate: f64,
    /// One outcome per segment, in completion order.
    pub outcomes: Vec<SegmentOutcome>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Reports of segments that ran.
    pub fn reports(&self) -> impl Iterator<Item = &ScanReport> {
        self.outcomes.iter().filter_map(SegmentOutcome::report)
    }

    /// Segments that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Segment, &SlidegrabError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SegmentOutcome::Failed { segment, error } => Some((segment, error)),
            SegmentOutcome::Completed(_) => None,
        })
    }

    /// Every capture of the run, ordered by frame index.
    pub fn captures(&self) -> Vec<&CaptureEvent> {
        let mut captures: Vec<&CaptureEvent> = self
            .reports()
            .flat_map(|report| report.captures.iter())
            .collect();
        captures.sort_by_key(|event| event.frame_number);
        captures
    }

    /// Total number of captures.
    pub fn capture_count(&self) -> usize {
        self.reports().map(|report| report.captures.len()).sum()
    }

    /// `true` if any segment stopped because of cancellation or deadline.
    pub fn was_interrupted(&self) -> bool {
        self.reports()
            .any(|report| report.stop_reason.is_interrupted())
    }

    /// `true` if any segment stopped because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.reports()
            .any(|report| report.stop_reason == StopReason::Cancelled)
    }

    /// Total frames the cursors could not read.
    pub fn read_failures(&self) -> u64 {
        self.reports().map(|report| report.read_failures).sum()
    }

    /// `true` if no segment failed, none was interrupted, and none gave up
    /// on its cursor.
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
            && !self.was_interrupted()
            && self
                .reports()
                .all(|report| report.stop_reason != StopReason::SourceFailed)
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut ordered: Vec<&SegmentOutcome> = self.outcomes.iter().collect();
        ordered.sort_by_key(|outcome| outcome.segment().id);

        for outcome in ordered {
            let segment = outcome.segment();
            match outcome {
                SegmentOutcome::Completed(report) => writeln!(
                    f,
                    "{segment}: {:?}, {} frames read, {} captured",
                    report.stop_reason,
                    report.frames_read,
                    report.captures.len()
                )?,
                SegmentOutcome::Failed { error, .. } => {
                    writeln!(f, "{segment}: FAILED: {error}")?
                }
            }
        }

        let failed: Vec<String> = self
            .failures()
            .map(|(segment, _)| segment.id.to_string())
            .collect();
        write!(
            f,
            "{} captures from {} frames in {:.1?}",
            self.capture_count(),
            self.total_frames,
            self.elapsed
        )?;
        if !failed.is_empty() {
            write!(f, "; failed segments: {}", failed.join(", "))?;
        }
        Ok(())
    }
}

/// Runs one [`SegmentScanner`] per segment, concurrently.
#[derive(Debug, Clone, Default)]
pub struct ParallelScanCoordinator {
    options: ScanOptions,
}

impl ParallelScanCoordinator {
    /// Create a coordinator with the given options.
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// The options in effect.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan every segment of `source` and collect the outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidInput`] for invalid options or a
    /// source with no frames, [`SlidegrabError::Cancelled`] if cancellation
    /// was requested before any segment started, and
    /// [`SlidegrabError::WorkerPool`] if threads cannot be spawned.
    /// Per-segment failures are reported inside the [`RunSummary`].
    pub fn run<S: VideoSource>(
        &self,
        source: &S,
        extractor: &dyn TextExtractor,
        persister: &dyn FramePersister,
    ) -> Result<RunSummary, SlidegrabError> {
        self.options.validate()?;

        let total_frames = source.frame_count();
        let segments = partition(total_frames, self.options.workers)?;

        if self.options.is_cancelled() {
            return Err(SlidegrabError::Cancelled);
        }

        log::info!(
            "Scanning {total_frames} frames @ {:.2} fps across {} segments",
            source.frame_rate(),
            segments.len()
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .thread_name(|index| format!("slidegrab-worker-{index}"))
            .build()
            .map_err(|error| SlidegrabError::WorkerPool(error.to_string()))?;

        let started = Instant::now();
        let scanner = SegmentScanner::new(extractor, persister, &self.options)
            .with_deadline(self.options.deadline_from(started));

        let (sender, receiver) = mpsc::channel();
        pool.scope(|scope| {
            for &segment in &segments {
                let sender = sender.clone();
                let scanner = &scanner;
                scope.spawn(move |_| {
                    let outcome = scan_one(source, scanner, segment);
                    // The receiver outlives the scope.
                    let _ = sender.send(outcome);
                });
            }
        });
        drop(sender);

        let outcomes: Vec<SegmentOutcome> = receiver.into_iter().collect();
        let summary = RunSummary {
            total_frames,
            frame_rate: source.frame_rate(),
            outcomes,
            elapsed: started.elapsed(),
        };

        for (segment, error) in summary.failures() {
            log::warn!("Segment {} failed: {error}", segment.id);
        }
        log::info!(
            "Scan finished: {} captures, {} failed segments",
            summary.capture_count(),
            summary.failures().count()
        );

        Ok(summary)
    }
}

fn scan_one<S: VideoSource>(
    source: &S,
    scanner: &SegmentScanner<'_>,
    segment: Segment,
) -> SegmentOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut cursor = source.cursor()?;
        scanner.scan(&mut cursor, segment)
    }));

    match result {
        Ok(Ok(report)) => SegmentOutcome::Completed(report),
        Ok(Err(error)) => SegmentOutcome::Failed { segment, error },
        Err(payload) => SegmentOutcome::Failed {
            segment,
            error: SlidegrabError::SegmentPanicked {
                segment_id: segment.id,
                message: panic_message(payload.as_ref()),
            },
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Open `video_path` with FFmpeg and write captures into `output_directory`.
///
/// # Errors
///
/// Returns [`SlidegrabError::SourceUnavailable`] if the video cannot be
/// opened, plus anything [`ParallelScanCoordinator::run`] returns.
#[cfg(feature = "ffmpeg")]
pub fn scan_video<P: AsRef<Path>, Q: AsRef<Path>>(
    video_path: P,
    output_directory: Q,
    extractor: &dyn TextExtractor,
    options: &ScanOptions,
) -> Result<RunSummary, SlidegrabError> {
    let source = FfmpegSource::open(video_path)?;
    let persister = ImageDirectoryPersister::new(output_directory);
    ParallelScanCoordinator::new(options.clone()).run(&source, extractor, &persister)
}
