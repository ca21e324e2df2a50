//! Benchmarks for text similarity and segment scanning.
//!
//! Run with: cargo bench
//!
//! The FFmpeg benchmarks require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::hint::black_box;
use std::path::PathBuf;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use image::{DynamicImage, GrayImage, Luma};
use slidegrab::{
    FrameCursor, FramePersister, ParallelScanCoordinator, ScanOptions, SlidegrabError,
    VideoSource, similarity_ratio,
};

const SLIDE_TEXT: &str = "Lecture 4: Virtual Memory\n\
    - Page tables map virtual pages to physical frames\n\
    - TLB caches recent translations\n\
    - 页表项包含有效位、脏位和访问位";

const SCROLLED_TEXT: &str = "- TLB caches recent translations\n\
    - 页表项包含有效位、脏位和访问位\n\
    - Multi-level page tables save memory for sparse address spaces";

// ── In-memory video ────────────────────────────────────────────────

/// One luma byte per frame; the byte is the frame's text.
struct LumaVideo(Arc<Vec<u8>>);

struct LumaCursor {
    frames: Arc<Vec<u8>>,
    position: usize,
}

impl VideoSource for LumaVideo {
    type Cursor = LumaCursor;

    fn frame_count(&self) -> u64 {
        self.0.len() as u64
    }

    fn frame_rate(&self) -> f64 {
        30.0
    }

    fn cursor(&self) -> Result<Self::Cursor, SlidegrabError> {
        Ok(LumaCursor {
            frames: Arc::clone(&self.0),
            position: 0,
        })
    }
}

impl FrameCursor for LumaCursor {
    fn seek(&mut self, frame_number: u64) -> Result<(), SlidegrabError> {
        self.position = frame_number as usize;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<DynamicImage>, SlidegrabError> {
        let Some(&luma) = self.frames.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            1,
            1,
            Luma([luma]),
        ))))
    }

    fn skip_next(&mut self) -> Result<bool, SlidegrabError> {
        if self.position < self.frames.len() {
            self.position += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

struct DiscardPersister;

impl FramePersister for DiscardPersister {
    fn persist(&self, _image: &DynamicImage, frame_number: u64) -> Result<PathBuf, SlidegrabError> {
        Ok(PathBuf::from(format!("frame_{frame_number:06}.png")))
    }
}

fn luma_text(image: &DynamicImage, _frame_number: u64) -> Result<String, SlidegrabError> {
    let luma = image.to_luma8().get_pixel(0, 0).0[0];
    Ok(match luma {
        0 => String::new(),
        luma => SLIDE_TEXT.repeat(usize::from(luma % 4) + 1),
    })
}

// ── Benchmarks ─────────────────────────────────────────────────────

fn benchmark_similarity(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("similarity_ratio");

    group.bench_function("identical slide", |bencher| {
        bencher.iter(|| similarity_ratio(black_box(SLIDE_TEXT), black_box(SLIDE_TEXT)));
    });

    group.bench_function("scrolled slide", |bencher| {
        bencher.iter(|| similarity_ratio(black_box(SLIDE_TEXT), black_box(SCROLLED_TEXT)));
    });

    for repeat in [1usize, 4, 16] {
        let long = SLIDE_TEXT.repeat(repeat);
        let shifted = SCROLLED_TEXT.repeat(repeat);
        group.bench_with_input(
            BenchmarkId::new("long page", long.chars().count()),
            &(long, shifted),
            |bencher, (long, shifted)| {
                bencher.iter(|| similarity_ratio(black_box(long), black_box(shifted)));
            },
        );
    }

    group.finish();
}

fn benchmark_synthetic_scan(criterion: &mut Criterion) {
    // Twenty slides of 150 frames each.
    let frames: Vec<u8> = (0..3000u32).map(|index| (index / 150 + 1) as u8).collect();
    let video = LumaVideo(Arc::new(frames));

    let mut group = criterion.benchmark_group("synthetic scan");
    for workers in [1usize, 2, 4, 8] {
        let coordinator = ParallelScanCoordinator::new(ScanOptions::new().with_workers(workers));
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &coordinator,
            |bencher, coordinator| {
                bencher.iter(|| {
                    coordinator
                        .run(&video, &luma_text, &DiscardPersister)
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

#[cfg(feature = "ffmpeg")]
fn benchmark_ffmpeg_scan(criterion: &mut Criterion) {
    use std::path::Path;

    use slidegrab::{FfmpegLogLevel, FfmpegSource, PixelFormat};

    const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

    slidegrab::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let source = FfmpegSource::open(SAMPLE_VIDEO)
        .unwrap()
        .with_pixel_format(PixelFormat::Gray8);
    let blank = |_: &DynamicImage, _: u64| Ok::<_, SlidegrabError>(String::new());

    let mut group = criterion.benchmark_group("ffmpeg scan");
    group.sample_size(10);
    for workers in [1usize, 4] {
        let coordinator = ParallelScanCoordinator::new(ScanOptions::new().with_workers(workers));
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &coordinator,
            |bencher, coordinator| {
                bencher.iter(|| coordinator.run(&source, &blank, &DiscardPersister).unwrap());
            },
        );
    }
    group.finish();
}

#[cfg(not(feature = "ffmpeg"))]
fn benchmark_ffmpeg_scan(_criterion: &mut Criterion) {}

criterion::criterion_group!(
    benches,
    benchmark_similarity,
    benchmark_synthetic_scan,
    benchmark_ffmpeg_scan,
);
criterion::criterion_main!(benches);
