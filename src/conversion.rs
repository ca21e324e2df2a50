//! Internal FFmpeg conversion helpers.
//!
//! Pixel-data copying and frame/timestamp arithmetic shared by the FFmpeg
//! cursor.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from a scaled FFmpeg frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is 3 for RGB24 and 1 for GRAY8.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value to a frame index. Negative timestamps clamp to 0.
pub(crate) fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts_to_seconds(pts, time_base).max(0.0);
    (seconds * frames_per_second).round() as u64
}

/// Convert a frame index to a container seek timestamp in AV_TIME_BASE
/// (microseconds).
///
/// `Input::seek` with no stream selected expects AV_TIME_BASE units, not the
/// stream time base.
pub(crate) fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

/// Convert a rational frame rate to frames per second; `0.0` when undefined.
pub(crate) fn rational_to_fps(rate: Rational) -> f64 {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_rescales_to_frames() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(pts_to_frame_number(0, time_base, 30.0), 0);
        assert_eq!(pts_to_frame_number(3_000, time_base, 30.0), 1);
        assert_eq!(pts_to_frame_number(90_000, time_base, 30.0), 30);
        assert_eq!(pts_to_frame_number(-3_000, time_base, 30.0), 0);
    }

    #[test]
    fn pts_rounding_absorbs_jitter() {
        // 29.97 fps in a 1/30000 time base: frame 100 sits at pts 100_100.
        let time_base = Rational::new(1, 30_000);
        assert_eq!(pts_to_frame_number(100_100, time_base, 30_000.0 / 1_001.0), 100);
    }

    #[test]
    fn seek_timestamp_in_microseconds() {
        assert_eq!(frame_number_to_seek_timestamp(0, 25.0), 0);
        assert_eq!(frame_number_to_seek_timestamp(50, 25.0), 2_000_000);
        assert_eq!(frame_number_to_seek_timestamp(10, 0.0), 0);
    }

    #[test]
    fn frame_rate_from_rational() {
        assert_eq!(rational_to_fps(Rational::new(30, 1)), 30.0);
        assert_eq!(rational_to_fps(Rational::new(0, 1)), 0.0);
        assert_eq!(rational_to_fps(Rational::new(25, 0)), 0.0);
    }
}
