//! Splitting a video's frame range across workers.
//!
//! [`partition`] cuts `[0, total_frames - 1]` into exactly `worker_count`
//! contiguous, non-overlapping [`Segment`]s. The last segment absorbs the
//! remainder of the integer division, so the union is always exact.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::SlidegrabError;

/// A contiguous, inclusive range of frame indices owned by one worker.
///
/// A segment with `start_frame > end_frame` is empty. When the video has
/// fewer frames than there are workers, the leading segments come out empty
/// and are placed just past the last frame, so their bounds never overlap a
/// non-empty segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Position of this segment in the partition, starting at 0.
    pub id: usize,
    /// First frame of the range (inclusive).
    pub start_frame: u64,
    /// Last frame of the range (inclusive).
    pub end_frame: u64,
}

impl Segment {
    /// Create a segment covering `start_frame..=end_frame`.
    pub fn new(id: usize, start_frame: u64, end_frame: u64) -> Self {
        Self {
            id,
            start_frame,
            end_frame,
        }
    }

    /// Create an empty segment placed right after `last_frame`.
    pub(crate) fn empty_after(id: usize, last_frame: u64) -> Self {
        Self::new(id, last_frame + 1, last_frame)
    }

    /// `true` if the segment covers no frames.
    pub fn is_empty(&self) -> bool {
        self.start_frame > self.end_frame
    }

    /// Number of frames covered.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end_frame - self.start_frame + 1
        }
    }

    /// `(start_frame, end_frame)`, or `None` for an empty segment.
    pub fn bounds(&self) -> Option<(u64, u64)> {
        (!self.is_empty()).then_some((self.start_frame, self.end_frame))
    }

    /// `true` if `frame_number` falls inside the segment.
    pub fn contains(&self, frame_number: u64) -> bool {
        (self.start_frame..=self.end_frame).contains(&frame_number)
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.bounds() {
            Some((start, end)) => write!(f, "segment {} [{start}-{end}]", self.id),
            None => write!(f, "segment {} [empty]", self.id),
        }
    }
}

/// Split `total_frames` frames into `worker_count` contiguous segments.
///
/// Segment `i < worker_count - 1` covers `[i * base, (i + 1) * base - 1]`
/// with `base = total_frames / worker_count`; the last segment runs to
/// `total_frames - 1`. When `base` is zero every segment but the last is
/// empty.
///
/// # Errors
///
/// Returns [`SlidegrabError::InvalidInput`] if either argument is zero.
///
/// # Example
///
/// ```
/// let segments = slidegrab::partition(10, 3)?;
/// let ranges: Vec<_> = segments.iter().map(|s| (s.start_frame, s.end_frame)).collect();
/// assert_eq!(ranges, vec![(0, 2), (3, 5), (6, 9)]);
/// # Ok::<(), slidegrab::SlidegrabError>(())
/// ```
pub fn partition(total_frames: u64, worker_count: usize) -> Result<Vec<Segment>, SlidegrabError> {
    if worker_count == 0 {
        return Err(SlidegrabError::InvalidInput(
            "worker count must be at least 1".to_string(),
        ));
    }
    if total_frames == 0 {
        return Err(SlidegrabError::InvalidInput(
            "total frame count must be at least 1".to_string(),
        ));
    }

    let workers = worker_count as u64;
    let base = total_frames / workers;

    let segments = (0..worker_count)
        .map(|id| {
            let index = id as u64;
            let start = index * base;
            if index == workers - 1 {
                Segment::new(id, start, total_frames - 1)
            } else if base == 0 {
                // `(i + 1) * base - 1` would underflow.
                Segment::empty_after(id, total_frames - 1)
            } else {
                Segment::new(id, start, (index + 1) * base - 1)
            }
        })
        .collect();

    Ok(segments)
}
