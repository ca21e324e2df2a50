//! FFmpeg-backed video source.
//!
//! [`FfmpegSource::open`] probes a file once for its frame count, frame rate
//! and dimensions. Each [`FfmpegCursor`] handed out by
//! [`VideoSource::cursor`] owns a separate demuxer and decoder, so workers
//! can seek independently.
//!
//! # Example
//!
//! ```no_run
//! use slidegrab::{FfmpegSource, FrameCursor, VideoSource};
//!
//! let source = FfmpegSource::open("lecture.mp4")?;
//! println!("{} frames @ {:.2} fps", source.frame_count(), source.frame_rate());
//!
//! let mut cursor = source.cursor()?;
//! cursor.seek(300)?;
//! if let Some(image) = cursor.read_next()? {
//!     image.save("frame_300.png")?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::config::PixelFormat;
use crate::conversion;
use crate::error::SlidegrabError;
use crate::source::{FrameCursor, VideoSource};

/// Consecutive demuxer errors tolerated before a cursor gives up.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 64;

/// A video file opened through FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
    frame_count: u64,
    frame_rate: f64,
    width: u32,
    height: u32,
    codec: String,
    pixel_format: PixelFormat,
}

impl FfmpegSource {
    /// Open and probe a video file.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::SourceUnavailable`] if the file is missing,
    /// unreadable, or has no decodable video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SlidegrabError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening video source: {}", path.display());

        let input = open_input(&path)?;
        let unavailable = |reason: String| SlidegrabError::SourceUnavailable {
            path: path.clone(),
            reason,
        };

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unavailable("no video stream".to_string()))?;

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unavailable(format!("cannot create video decoder: {error}")))?;

        let mut frame_rate = conversion::rational_to_fps(stream.avg_frame_rate());
        if frame_rate <= 0.0 {
            frame_rate = conversion::rational_to_fps(stream.rate());
        }

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            let duration = stream_duration(&input, stream.duration(), stream.time_base());
            (duration.as_secs_f64() * frame_rate) as u64
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        log::debug!(
            "{}: {}x{} {codec}, {frame_count} frames @ {frame_rate:.3} fps",
            path.display(),
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            width: decoder.width(),
            height: decoder.height(),
            frame_count,
            frame_rate,
            codec,
            pixel_format: PixelFormat::default(),
            path,
        })
    }

    /// Decode frames to `format` instead of RGB8.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Path of the video file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Codec name (e.g. `"h264"`).
    pub fn codec(&self) -> &str {
        &self.codec
    }
}

impl VideoSource for FfmpegSource {
    type Cursor = FfmpegCursor;

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn cursor(&self) -> Result<FfmpegCursor, SlidegrabError> {
        FfmpegCursor::open(&self.path, self.frame_rate, self.pixel_format)
    }
}

/// An independent demuxer + decoder over one video file.
pub struct FfmpegCursor {
    path: PathBuf,
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    frames_per_second: f64,
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    /// `decoded_frame` holds a frame that has not been handed out yet.
    pending: bool,
    /// No seek has happened and nothing has been read.
    at_origin: bool,
    eof_sent: bool,
}

impl Debug for FfmpegCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegCursor")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("frames_per_second", &self.frames_per_second)
            .field("pixel_format", &self.pixel_format)
            .field("eof_sent", &self.eof_sent)
            .finish_non_exhaustive()
    }
}

impl FfmpegCursor {
    fn open(
        path: &Path,
        frames_per_second: f64,
        pixel_format: PixelFormat,
    ) -> Result<Self, SlidegrabError> {
        let input = open_input(path)?;
        let unavailable = |reason: String| SlidegrabError::SourceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unavailable("no video stream".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unavailable(format!("cannot create video decoder: {error}")))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            pixel_format.to_ffmpeg_pixel(),
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| unavailable(format!("cannot create scaler: {error}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            frames_per_second,
            pixel_format,
            width,
            height,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            pending: false,
            at_origin: true,
            eof_sent: false,
        })
    }

    /// Decode the next frame into `decoded_frame`. `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool, SlidegrabError> {
        self.at_origin = false;
        if self.pending {
            self.pending = false;
            return Ok(true);
        }

        let mut consecutive_errors = 0;
        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return Ok(true);
            }
            if self.eof_sent {
                return Ok(false);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    consecutive_errors = 0;
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            log::warn!(
                                "{}: dropping undecodable packet: {error}",
                                self.path.display()
                            );
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        return Err(SlidegrabError::VideoDecodeError(format!(
                            "{}: giving up after {consecutive_errors} read errors: {error}",
                            self.path.display()
                        )));
                    }
                }
            }
        }
    }

    fn current_frame_number(&self) -> u64 {
        let pts = self
            .decoded_frame
            .timestamp()
            .or_else(|| self.decoded_frame.pts())
            .unwrap_or(0);
        conversion::pts_to_frame_number(pts, self.time_base, self.frames_per_second)
    }

    /// Rebuild the scaler if the stream changed resolution or pixel format
    /// mid-way. Output keeps the dimensions probed at open.
    fn refresh_scaler(&mut self) -> Result<(), SlidegrabError> {
        let input = self.scaler.input();
        let frame = &self.decoded_frame;
        if input.width == frame.width()
            && input.height == frame.height()
            && input.format == frame.format()
        {
            return Ok(());
        }

        log::debug!(
            "{}: frame geometry changed to {}x{} {:?}, rebuilding scaler",
            self.path.display(),
            frame.width(),
            frame.height(),
            frame.format()
        );
        self.scaler = ScalingContext::get(
            frame.format(),
            frame.width(),
            frame.height(),
            self.pixel_format.to_ffmpeg_pixel(),
            self.width,
            self.height,
            ScalingFlags::BILINEAR,
        )?;
        Ok(())
    }

    /// Scale and convert `decoded_frame` to a [`DynamicImage`].
    fn convert_current_frame(&mut self) -> Result<DynamicImage, SlidegrabError> {
        self.refresh_scaler()?;
        self.scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;

        let buffer = conversion::frame_to_buffer(
            &self.scaled_frame,
            self.width,
            self.height,
            self.pixel_format.bytes_per_pixel(),
        );

        let image = match self.pixel_format {
            PixelFormat::Rgb8 => {
                RgbImage::from_raw(self.width, self.height, buffer).map(DynamicImage::ImageRgb8)
            }
            PixelFormat::Gray8 => {
                GrayImage::from_raw(self.width, self.height, buffer).map(DynamicImage::ImageLuma8)
            }
        };

        image.ok_or_else(|| {
            SlidegrabError::VideoDecodeError(
                "Failed to construct image from decoded frame data".to_string(),
            )
        })
    }
}

impl FrameCursor for FfmpegCursor {
    fn seek(&mut self, frame_number: u64) -> Result<(), SlidegrabError> {
        if frame_number == 0 && self.at_origin {
            return Ok(());
        }

        let timestamp =
            conversion::frame_number_to_seek_timestamp(frame_number, self.frames_per_second);
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|error| SlidegrabError::SourceUnavailable {
                path: self.path.clone(),
                reason: format!("seek to frame {frame_number} failed: {error}"),
            })?;
        self.decoder.flush();
        self.pending = false;
        self.eof_sent = false;

        // The demuxer lands on a keyframe at or before the target; decode
        // forward and drop everything earlier.
        while self.decode_next()? {
            if self.current_frame_number() >= frame_number {
                self.pending = true;
                break;
            }
        }

        log::trace!("{}: positioned at frame {frame_number}", self.path.display());
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<DynamicImage>, SlidegrabError> {
        if !self.decode_next()? {
            return Ok(None);
        }
        self.convert_current_frame().map(Some)
    }

    fn skip_next(&mut self) -> Result<bool, SlidegrabError> {
        self.decode_next()
    }
}

fn open_input(path: &Path) -> Result<Input, SlidegrabError> {
    // Safe to call repeatedly.
    ffmpeg_next::init().map_err(|error| SlidegrabError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    ffmpeg_next::format::input(&path).map_err(|error| SlidegrabError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

/// Stream duration, falling back to the container duration.
fn stream_duration(input: &Input, stream_duration: i64, time_base: Rational) -> Duration {
    if stream_duration > 0 {
        let seconds = conversion::pts_to_seconds(stream_duration, time_base);
        return Duration::from_secs_f64(seconds.max(0.0));
    }
    let container = input.duration();
    if container > 0 {
        Duration::from_micros(container as u64)
    } else {
        Duration::ZERO
    }
}
