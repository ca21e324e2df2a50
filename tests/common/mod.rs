//! Shared in-memory collaborators for integration tests.
//!
//! Frames are 1×1 grayscale images whose luma value encodes the on-screen
//! text: `0` is a blank frame, [`FAILING_LUMA`] makes extraction fail, and
//! any other value is read back as the single ASCII character it encodes.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, GrayImage, Luma};
use slidegrab::{FrameCursor, FramePersister, SlidegrabError, VideoSource};

pub const BLANK_LUMA: u8 = 0;
pub const FAILING_LUMA: u8 = 255;

/// A video held in memory as one luma byte per frame.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    frames: Arc<Vec<u8>>,
    claimed_frames: u64,
    failing_seeks: HashSet<u64>,
    failing_reads: HashSet<u64>,
}

impl SyntheticSource {
    pub fn new(frames: Vec<u8>) -> Self {
        let claimed_frames = frames.len() as u64;
        Self {
            frames: Arc::new(frames),
            claimed_frames,
            failing_seeks: HashSet::new(),
            failing_reads: HashSet::new(),
        }
    }

    /// `runs` of `(text, length)`, where text is one ASCII character or
    /// `None` for blank frames.
    pub fn from_runs(runs: &[(Option<char>, usize)]) -> Self {
        let mut frames = Vec::new();
        for &(text, length) in runs {
            let luma = text.map(|ch| ch as u8).unwrap_or(BLANK_LUMA);
            frames.extend(std::iter::repeat_n(luma, length));
        }
        Self::new(frames)
    }

    /// Report more frames than the stream actually holds.
    pub fn claiming(mut self, frame_count: u64) -> Self {
        self.claimed_frames = frame_count;
        self
    }

    /// Make seeking to `frame_number` fail.
    pub fn failing_seek_to(mut self, frame_number: u64) -> Self {
        self.failing_seeks.insert(frame_number);
        self
    }

    /// Make reading `frame_number` fail. The frame is still consumed.
    pub fn failing_read_at(mut self, frame_number: u64) -> Self {
        self.failing_reads.insert(frame_number);
        self
    }

    /// Make every frame from `frame_number` on unreadable.
    pub fn failing_reads_from(mut self, frame_number: u64) -> Self {
        self.failing_reads
            .extend(frame_number..self.frames.len() as u64);
        self
    }
}

impl VideoSource for SyntheticSource {
    type Cursor = SyntheticCursor;

    fn frame_count(&self) -> u64 {
        self.claimed_frames
    }

    fn frame_rate(&self) -> f64 {
        30.0
    }

    fn cursor(&self) -> Result<SyntheticCursor, SlidegrabError> {
        Ok(SyntheticCursor {
            frames: Arc::clone(&self.frames),
            failing_seeks: self.failing_seeks.clone(),
            failing_reads: self.failing_reads.clone(),
            position: 0,
        })
    }
}

pub struct SyntheticCursor {
    frames: Arc<Vec<u8>>,
    failing_seeks: HashSet<u64>,
    failing_reads: HashSet<u64>,
    position: usize,
}

impl FrameCursor for SyntheticCursor {
    fn seek(&mut self, frame_number: u64) -> Result<(), SlidegrabError> {
        if self.failing_seeks.contains(&frame_number) {
            return Err(SlidegrabError::SourceUnavailable {
                path: PathBuf::from("synthetic"),
                reason: format!("seek to {frame_number} refused"),
            });
        }
        self.position = frame_number as usize;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<DynamicImage>, SlidegrabError> {
        let Some(&luma) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let frame_number = self.position as u64;
        self.position += 1;
        if self.failing_reads.contains(&frame_number) {
            return Err(SlidegrabError::VideoDecodeError(format!(
                "corrupt frame {frame_number}"
            )));
        }
        Ok(Some(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            1,
            1,
            Luma([luma]),
        ))))
    }
}

/// Decode the text a synthetic frame carries.
pub fn luma_text(image: &DynamicImage, frame_number: u64) -> Result<String, SlidegrabError> {
    match image.to_luma8().get_pixel(0, 0).0[0] {
        BLANK_LUMA => Ok(String::new()),
        FAILING_LUMA => Err(SlidegrabError::ExtractionFailure {
            frame_number,
            reason: "unreadable".to_string(),
        }),
        luma => Ok((luma as char).to_string()),
    }
}

/// Persister that records frame numbers instead of writing files.
#[derive(Debug, Default)]
pub struct RecordingPersister {
    pub persisted: Mutex<Vec<u64>>,
    failing_frames: HashSet<u64>,
}

impl RecordingPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(frames: &[u64]) -> Self {
        Self {
            persisted: Mutex::new(Vec::new()),
            failing_frames: frames.iter().copied().collect(),
        }
    }

    pub fn frames(&self) -> Vec<u64> {
        let mut frames = self.persisted.lock().unwrap().clone();
        frames.sort_unstable();
        frames
    }
}

impl FramePersister for RecordingPersister {
    fn persist(&self, _image: &DynamicImage, frame_number: u64) -> Result<PathBuf, SlidegrabError> {
        let path = PathBuf::from(format!("memory/frame_{frame_number:06}.png"));
        if self.failing_frames.contains(&frame_number) {
            return Err(SlidegrabError::PersistenceFailure {
                frame_number,
                path,
                reason: "disk full".to_string(),
            });
        }
        self.persisted.lock().unwrap().push(frame_number);
        Ok(path)
    }
}

/// The lecture from the end-to-end scenario: "A" for frames 0–99, "B" for
/// frames 100–299.
pub fn two_slide_lecture() -> SyntheticSource {
    SyntheticSource::from_runs(&[(Some('A'), 100), (Some('B'), 200)])
}
