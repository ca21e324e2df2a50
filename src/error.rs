//! Error types for the `slidegrab` crate.
//!
//! [`SlidegrabError`] is the single error type returned by every fallible
//! operation. Only [`InvalidInput`](SlidegrabError::InvalidInput) and
//! [`SourceUnavailable`](SlidegrabError::SourceUnavailable) ever reach the
//! caller of a whole scan; per-frame variants are logged and absorbed by the
//! segment scanner.

use std::{io::Error as IoError, path::PathBuf};

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `slidegrab` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SlidegrabError {
    /// Partition parameters or scan options are malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The video resource could not be opened or positioned.
    #[error("Video source unavailable at {path}: {reason}")]
    SourceUnavailable {
        /// Path of the video resource.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The text extractor failed on a specific frame.
    #[error("Text extraction failed at frame {frame_number}: {reason}")]
    ExtractionFailure {
        /// Frame the extractor was invoked on.
        frame_number: u64,
        /// Underlying reason.
        reason: String,
    },

    /// A capture fired but the frame could not be written.
    #[error("Failed to persist frame {frame_number} to {path}: {reason}")]
    PersistenceFailure {
        /// Frame that was being persisted.
        frame_number: u64,
        /// Target path of the write.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A segment worker panicked.
    #[error("Segment {segment_id} worker panicked: {message}")]
    SegmentPanicked {
        /// Id of the segment whose worker panicked.
        segment_id: usize,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The worker thread pool could not be started.
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),

    /// The run was cancelled before any work started.
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion or encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl SlidegrabError {
    /// Whether this error fails a whole segment rather than one frame.
    ///
    /// A source error raised by a single frame read is still absorbed by the
    /// scanner, up to its consecutive-failure limit.
    pub fn is_segment_fatal(&self) -> bool {
        !matches!(
            self,
            SlidegrabError::ExtractionFailure { .. } | SlidegrabError::PersistenceFailure { .. }
        )
    }
}

#[cfg(feature = "ffmpeg")]
impl From<FfmpegError> for SlidegrabError {
    fn from(error: FfmpegError) -> Self {
        SlidegrabError::FfmpegError(error.to_string())
    }
}
