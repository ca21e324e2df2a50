//! # slidegrab
//!
//! Extract one still per distinct on-screen text state from lecture
//! recordings, slide decks, and scrolling documents.
//!
//! `slidegrab` splits a video into contiguous segments, scans them in
//! parallel, runs OCR on every `stride`-th frame, and saves a frame whenever
//! its text diverges from the last saved frame of the same segment. Spacing
//! is bounded on both sides: no two captures closer than `min_interval`
//! frames, and a forced capture after `max_interval` frames of unchanged
//! content.
//!
//! ## Quick Start
//!
//! ```no_run
//! use slidegrab::{ScanOptions, TesseractExtractor};
//!
//! let options = ScanOptions::new()
//!     .with_min_interval(15)
//!     .with_max_interval(150)
//!     .with_stride(5)
//!     .with_workers(12);
//!
//! let summary = slidegrab::scan_video(
//!     "lecture.mp4",
//!     "shots/lecture",
//!     &TesseractExtractor::new(),
//!     &options,
//! )?;
//!
//! for capture in summary.captures() {
//!     println!("frame {} -> {}", capture.frame_number, capture.path.display());
//! }
//! # Ok::<(), slidegrab::SlidegrabError>(())
//! ```
//!
//! ## Building blocks
//!
//! - [`partition()`]: split `[0, total_frames)` into per-worker [`Segment`]s
//! - [`similarity_ratio`]: matching-block text similarity in `[0, 1]`
//! - [`CapturePolicy`] / [`CaptureDecider`]: the capture rule and its
//!   per-segment state
//! - [`SegmentScanner`]: drives one segment over a [`FrameCursor`]
//! - [`ParallelScanCoordinator`]: runs all segments and aggregates a
//!   [`RunSummary`]
//!
//! Video decoding, OCR, and persistence sit behind the [`VideoSource`],
//! [`TextExtractor`], and [`FramePersister`] traits. The crate ships
//! FFmpeg, tesseract, and image-directory implementations.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` (default) | [`FfmpegSource`], FFmpeg log-level control, [`scan_video`], and the CLI |

pub mod config;
#[cfg(feature = "ffmpeg")]
mod conversion;
pub mod coordinator;
pub mod decider;
pub mod discovery;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_source;
pub mod partition;
pub mod persist;
pub mod progress;
pub mod scanner;
pub mod similarity;
pub mod source;
pub mod text;

pub use config::{DEFAULT_STRIDE, PixelFormat, ScanOptions};
#[cfg(feature = "ffmpeg")]
pub use coordinator::scan_video;
pub use coordinator::{ParallelScanCoordinator, RunSummary, SegmentOutcome};
pub use decider::{
    CaptureDecider, CapturePolicy, CaptureReason, CaptureState, DEFAULT_MAX_INTERVAL,
    DEFAULT_MIN_INTERVAL, DEFAULT_SIMILARITY_THRESHOLD, Decision, SkipReason,
};
pub use discovery::find_videos;
pub use error::SlidegrabError;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg_source::{FfmpegCursor, FfmpegSource};
pub use partition::{Segment, partition};
pub use persist::{FramePersister, ImageDirectoryPersister};
pub use progress::{CancellationToken, ProgressInfo, ProgressSink};
pub use scanner::{CaptureEvent, ScanReport, SegmentScanner, StopReason};
pub use similarity::{MatchingBlock, matching_blocks, similarity_ratio};
pub use source::{FrameCursor, VideoSource};
pub use text::{TesseractExtractor, TextExtractor};
