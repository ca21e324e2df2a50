//! Video source abstraction.
//!
//! A [`VideoSource`] describes one video resource. Every worker calls
//! [`VideoSource::cursor`] to get its own [`FrameCursor`], so seeking in one
//! segment never disturbs another. Dropping a cursor closes it.
//!
//! The FFmpeg-backed implementation lives in
//! [`ffmpeg_source`](crate::ffmpeg_source); tests use in-memory sources.

use image::DynamicImage;

use crate::error::SlidegrabError;

/// A read-only video resource that can hand out independent cursors.
pub trait VideoSource: Send + Sync {
    /// The per-worker read cursor.
    type Cursor: FrameCursor;

    /// Total number of frames in the video.
    fn frame_count(&self) -> u64;

    /// Frames per second.
    fn frame_rate(&self) -> f64;

    /// Open a new cursor positioned at frame 0.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::SourceUnavailable`] if the resource cannot
    /// be opened.
    fn cursor(&self) -> Result<Self::Cursor, SlidegrabError>;
}

/// A sequential reader over one video resource.
pub trait FrameCursor {
    /// Position the cursor so the next [`read_next`](FrameCursor::read_next)
    /// returns frame `frame_number`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::SourceUnavailable`] if the position cannot
    /// be reached.
    fn seek(&mut self, frame_number: u64) -> Result<(), SlidegrabError>;

    /// Read the next frame, or `Ok(None)` once the stream is exhausted.
    fn read_next(&mut self) -> Result<Option<DynamicImage>, SlidegrabError>;

    /// Advance past the next frame without materialising it.
    ///
    /// Returns `false` once the stream is exhausted. Implementations that can
    /// avoid pixel conversion for skipped frames should override this.
    fn skip_next(&mut self) -> Result<bool, SlidegrabError> {
        Ok(self.read_next()?.is_some())
    }
}

impl<C: FrameCursor + ?Sized> FrameCursor for Box<C> {
    fn seek(&mut self, frame_number: u64) -> Result<(), SlidegrabError> {
        (**self).seek(frame_number)
    }

    fn read_next(&mut self) -> Result<Option<DynamicImage>, SlidegrabError> {
        (**self).read_next()
    }

    fn skip_next(&mut self) -> Result<bool, SlidegrabError> {
        (**self).skip_next()
    }
}
