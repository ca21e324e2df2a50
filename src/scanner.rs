//! Scanning one segment.
//!
//! [`SegmentScanner::scan`] walks a segment frame by frame on its own
//! [`FrameCursor`]. Every `stride`-th frame (counted from the segment start)
//! goes through text extraction and the [`CaptureDecider`]; the rest are
//! skipped at the cursor without pixel conversion. Captures are persisted
//! inline, since file names are derived from the globally unique frame index.
//!
//! Per-frame failures (unreadable frames, text extraction, persistence) are
//! logged, counted in the [`ScanReport`], and never abort the segment. Only a
//! cursor that keeps failing for [`MAX_CONSECUTIVE_READ_FAILURES`] frames in a
//! row ends the scan early, and even then the partial report is kept.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;

use crate::config::ScanOptions;
use crate::decider::{CaptureDecider, CaptureReason, Decision};
use crate::error::SlidegrabError;
use crate::partition::Segment;
use crate::persist::FramePersister;
use crate::progress::{ProgressSink, ProgressTracker};
use crate::source::FrameCursor;
use crate::text::TextExtractor;

/// Consecutive unreadable frames after which a segment stops with
/// [`StopReason::SourceFailed`].
pub const MAX_CONSECUTIVE_READ_FAILURES: u64 = 64;

/// A frame that was captured and written.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    /// Segment that produced the capture.
    pub segment_id: usize,
    /// Frame index within the whole video.
    pub frame_number: u64,
    /// Where the frame was written.
    pub path: PathBuf,
    /// Text extracted from the frame.
    pub text: String,
    /// Which rule fired.
    pub reason: CaptureReason,
}

/// Why a segment scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every frame up to `end_frame` was read.
    Completed,
    /// The source ran out of frames before `end_frame`.
    EndOfStream,
    /// The segment covers no frames.
    EmptySegment,
    /// A [`CancellationToken`](crate::CancellationToken) was raised.
    Cancelled,
    /// The run deadline passed.
    DeadlineExceeded,
    /// The cursor failed on too many consecutive frames.
    SourceFailed,
}

impl StopReason {
    /// `true` for stops that cut the segment short on request.
    pub fn is_interrupted(self) -> bool {
        matches!(self, StopReason::Cancelled | StopReason::DeadlineExceeded)
    }
}

/// Result of scanning one segment.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// The scanned segment.
    pub segment: Segment,
    /// Captures in frame order.
    pub captures: Vec<CaptureEvent>,
    /// Frames read from the cursor.
    pub frames_read: u64,
    /// Frames that passed the stride gate.
    pub frames_sampled: u64,
    /// Frames handed to the text extractor.
    pub frames_extracted: u64,
    /// Frames the cursor failed to read or skip.
    pub read_failures: u64,
    /// Frames whose text extraction failed.
    pub extraction_failures: u64,
    /// Captures that could not be written.
    pub persistence_failures: u64,
    /// Last frame read, if any.
    pub last_frame: Option<u64>,
    /// Why the scan ended.
    pub stop_reason: StopReason,
    /// Wall-clock duration of the scan.
    pub elapsed: Duration,
}

impl ScanReport {
    fn new(segment: Segment) -> Self {
        Self {
            segment,
            captures: Vec::new(),
            frames_read: 0,
            frames_sampled: 0,
            frames_extracted: 0,
            read_failures: 0,
            extraction_failures: 0,
            persistence_failures: 0,
            last_frame: None,
            stop_reason: StopReason::Completed,
            elapsed: Duration::ZERO,
        }
    }

    /// Frame indices captured in this segment.
    pub fn capture_frames(&self) -> Vec<u64> {
        self.captures.iter().map(|event| event.frame_number).collect()
    }
}

/// Drives the capture pipeline over segments.
pub struct SegmentScanner<'a> {
    extractor: &'a dyn TextExtractor,
    persister: &'a dyn FramePersister,
    options: &'a ScanOptions,
    deadline: Option<Instant>,
}

impl<'a> SegmentScanner<'a> {
    /// Create a scanner. The deadline of `options`, if any, starts now.
    pub fn new(
        extractor: &'a dyn TextExtractor,
        persister: &'a dyn FramePersister,
        options: &'a ScanOptions,
    ) -> Self {
        Self {
            extractor,
            persister,
            options,
            deadline: options.deadline_from(Instant::now()),
        }
    }

    /// Use an absolute deadline shared with other scanners of the same run.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Scan `segment` on `cursor` until `end_frame`, end of stream,
    /// cancellation, or deadline.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidInput`] for a zero stride and the
    /// cursor's error if seeking to `start_frame` fails. Read, extraction,
    /// and persistence failures are absorbed into the report.
    pub fn scan<C: FrameCursor + ?Sized>(
        &self,
        cursor: &mut C,
        segment: Segment,
    ) -> Result<ScanReport, SlidegrabError> {
        let stride = self.options.stride;
        if stride == 0 {
            return Err(SlidegrabError::InvalidInput(
                "stride must be at least 1".to_string(),
            ));
        }

        let started = Instant::now();
        let sink: &Arc<dyn ProgressSink> = &self.options.progress;
        let mut tracker = ProgressTracker::new(sink.clone(), &segment, self.options.batch_size);
        let mut report = ScanReport::new(segment);

        sink.on_segment_started(&segment);

        if segment.is_empty() {
            log::debug!("Segment {} is empty, nothing to scan", segment.id);
            report.stop_reason = StopReason::EmptySegment;
            return Ok(self.finish(report, &mut tracker, started));
        }

        log::debug!(
            "Segment {}: scanning frames {}..={}",
            segment.id,
            segment.start_frame,
            segment.end_frame
        );
        cursor.seek(segment.start_frame)?;

        let mut decider = CaptureDecider::new(self.options.policy, segment.start_frame);
        let mut frame_number = segment.start_frame;
        let mut consecutive_failures = 0;

        while frame_number <= segment.end_frame {
            if self.options.is_cancelled() {
                report.stop_reason = StopReason::Cancelled;
                break;
            }
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                report.stop_reason = StopReason::DeadlineExceeded;
                break;
            }

            // Outer `None` is end of stream; inner `None` a skipped frame.
            let sampled = (frame_number - segment.start_frame) % stride == 0;
            let read = if sampled {
                cursor.read_next().map(|image| image.map(Some))
            } else {
                cursor.skip_next().map(|more| more.then_some(None))
            };

            match read {
                Ok(None) => {
                    report.stop_reason = StopReason::EndOfStream;
                    break;
                }
                Ok(Some(image)) => {
                    consecutive_failures = 0;
                    self.record_read(&mut report, &mut tracker, frame_number);
                    if let Some(image) = image {
                        self.evaluate(&mut decider, &mut report, &image, frame_number);
                    }
                }
                Err(error) => {
                    consecutive_failures += 1;
                    report.read_failures += 1;
                    tracker.advance(frame_number);
                    log::warn!(
                        "Segment {}: frame {frame_number} unreadable, skipping: {error}",
                        segment.id
                    );
                    if consecutive_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        log::warn!(
                            "Segment {}: giving up after {consecutive_failures} unreadable frames",
                            segment.id
                        );
                        report.stop_reason = StopReason::SourceFailed;
                        break;
                    }
                }
            }

            frame_number += 1;
        }

        if report.stop_reason == StopReason::EndOfStream {
            log::debug!(
                "Segment {}: stream ended at frame {frame_number}, before {}",
                segment.id,
                segment.end_frame
            );
        }

        Ok(self.finish(report, &mut tracker, started))
    }

    fn record_read(&self, report: &mut ScanReport, tracker: &mut ProgressTracker, frame: u64) {
        report.frames_read += 1;
        report.last_frame = Some(frame);
        tracker.advance(frame);
    }

    fn evaluate(
        &self,
        decider: &mut CaptureDecider,
        report: &mut ScanReport,
        image: &DynamicImage,
        frame_number: u64,
    ) {
        report.frames_sampled += 1;

        // The spacing floor rejects any text, so skip the OCR call entirely.
        if decider.too_soon(frame_number) {
            return;
        }

        let text = match self.extractor.extract(image, frame_number) {
            Ok(text) => text,
            Err(error) => {
                log::warn!(
                    "Segment {}: {error}; treating frame as empty",
                    report.segment.id
                );
                report.extraction_failures += 1;
                return;
            }
        };
        report.frames_extracted += 1;

        let reason = match decider.evaluate(frame_number, &text) {
            Decision::Capture(reason) => reason,
            Decision::Skip(reason) => {
                log::trace!("Segment {}: frame {frame_number} skipped ({reason:?})", report.segment.id);
                return;
            }
        };

        match self.persister.persist(image, frame_number) {
            Ok(path) => {
                log::info!(
                    "Segment {}: captured frame {frame_number} ({reason:?}) -> {}",
                    report.segment.id,
                    path.display()
                );
                let event = CaptureEvent {
                    segment_id: report.segment.id,
                    frame_number,
                    path,
                    text,
                    reason,
                };
                self.options.progress.on_capture(&event);
                report.captures.push(event);
            }
            Err(error) => {
                log::warn!("Segment {}: {error}", report.segment.id);
                report.persistence_failures += 1;
            }
        }
    }

    fn finish(
        &self,
        mut report: ScanReport,
        tracker: &mut ProgressTracker,
        started: Instant,
    ) -> ScanReport {
        report.elapsed = started.elapsed();
        tracker.finish();
        self.options.progress.on_segment_finished(&report);

        log::info!(
            "{} finished ({:?}): {} read, {} unreadable, {} captured",
            report.segment,
            report.stop_reason,
            report.frames_read,
            report.read_failures,
            report.captures.len()
        );
        report
    }
}
