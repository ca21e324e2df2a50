//! FFmpeg source integration tests.
//!
//! Tests that decode real video require `tests/fixtures/sample_video.mp4`,
//! produced by `tests/fixtures/generate_fixtures.sh`, and return early when
//! it is missing.

#![cfg(feature = "ffmpeg")]

use std::path::Path;

use image::DynamicImage;
use slidegrab::{
    FfmpegSource, FrameCursor, PixelFormat, ScanOptions, SlidegrabError, StopReason, VideoSource,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn open_fixture() -> Option<FfmpegSource> {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return None;
    }
    Some(FfmpegSource::open(path).expect("Failed to open fixture"))
}

// ── Opening ────────────────────────────────────────────────────────

#[test]
fn open_nonexistent_file() {
    let result = FfmpegSource::open("this_file_does_not_exist.mp4");
    match result {
        Err(SlidegrabError::SourceUnavailable { path, .. }) => {
            assert_eq!(path, Path::new("this_file_does_not_exist.mp4"));
        }
        other => panic!("Expected SourceUnavailable, got: {other:?}"),
    }
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegSource::open(&invalid_file_path);
    assert!(
        matches!(result, Err(SlidegrabError::SourceUnavailable { .. })),
        "Expected SourceUnavailable for invalid media file"
    );
}

#[test]
fn scan_video_reports_missing_source() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let extractor = |_: &DynamicImage, _: u64| Ok::<_, SlidegrabError>(String::new());

    let result = slidegrab::scan_video(
        "this_file_does_not_exist.mp4",
        temporary_directory.path(),
        &extractor,
        &ScanOptions::new(),
    );
    assert!(matches!(
        result,
        Err(SlidegrabError::SourceUnavailable { .. })
    ));
}

// ── Probing ────────────────────────────────────────────────────────

#[test]
fn probe_reports_stream_properties() {
    let Some(source) = open_fixture() else {
        return;
    };

    assert!(source.frame_count() > 0);
    assert!(source.frame_rate() > 0.0);
    assert!(source.width() > 0);
    assert!(source.height() > 0);
    assert!(!source.codec().is_empty());
    assert_eq!(source.path(), Path::new(sample_video_path()));
}

// ── Cursors ────────────────────────────────────────────────────────

#[test]
fn cursor_reads_frames_at_stream_dimensions() {
    let Some(source) = open_fixture() else {
        return;
    };

    let mut cursor = source.cursor().expect("Failed to open cursor");
    cursor.seek(0).expect("Failed to seek");
    let image = cursor
        .read_next()
        .expect("Failed to read")
        .expect("Fixture has no frames");

    assert_eq!(image.width(), source.width());
    assert_eq!(image.height(), source.height());
    assert!(matches!(image, DynamicImage::ImageRgb8(_)));
}

#[test]
fn gray_cursor_produces_luma_images() {
    let Some(source) = open_fixture() else {
        return;
    };
    let source = source.with_pixel_format(PixelFormat::Gray8);

    let mut cursor = source.cursor().expect("Failed to open cursor");
    let image = cursor
        .read_next()
        .expect("Failed to read")
        .expect("Fixture has no frames");
    assert!(matches!(image, DynamicImage::ImageLuma8(_)));
}

#[test]
fn cursor_reads_to_end_of_stream() {
    let Some(source) = open_fixture() else {
        return;
    };

    let mut cursor = source.cursor().expect("Failed to open cursor");
    let mut frames = 0u64;
    while cursor.skip_next().expect("Failed to decode") {
        frames += 1;
    }

    assert!(frames > 0);
    assert!(cursor.read_next().expect("Failed to read").is_none());
}

#[test]
fn independent_cursors_seek_separately() {
    let Some(source) = open_fixture() else {
        return;
    };
    let middle = source.frame_count() / 2;

    let mut first = source.cursor().expect("Failed to open cursor");
    let mut second = source.cursor().expect("Failed to open cursor");

    second.seek(middle).expect("Failed to seek");
    let mut remaining = 0u64;
    while second.skip_next().expect("Failed to decode") {
        remaining += 1;
    }

    let mut total = 0u64;
    while first.skip_next().expect("Failed to decode") {
        total += 1;
    }

    assert!(remaining > 0);
    assert!(remaining < total);
}

// ── Whole-file scan ────────────────────────────────────────────────

#[test]
fn scan_video_writes_captures_to_disk() {
    if !Path::new(sample_video_path()).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temporary_directory.path().join("sample_video");
    let extractor = |_: &DynamicImage, _: u64| Ok::<_, SlidegrabError>("slide".to_string());

    let options = ScanOptions::new()
        .with_min_interval(15)
        .with_max_interval(1_000_000)
        .with_stride(5)
        .with_workers(2);
    let summary = slidegrab::scan_video(sample_video_path(), &output, &extractor, &options)
        .expect("Failed to scan fixture");

    assert!(summary.failures().next().is_none());
    for report in summary.reports() {
        assert!(matches!(
            report.stop_reason,
            StopReason::Completed | StopReason::EndOfStream
        ));
    }

    // Constant text: one capture per segment, 15 frames in.
    let captures = summary.captures();
    assert_eq!(captures.len(), 2);
    for event in captures {
        assert!(event.path.exists(), "missing {}", event.path.display());
        assert!(event.path.starts_with(&output));
    }
}
