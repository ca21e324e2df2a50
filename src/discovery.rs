//! Finding video files in an input directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SlidegrabError;

/// File extensions treated as video, compared case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// List the video files directly inside `directory`, sorted by path.
///
/// Subdirectories are not descended into.
///
/// # Errors
///
/// Returns [`SlidegrabError::InvalidInput`] if `directory` does not exist or
/// is not a directory, and [`SlidegrabError::IoError`] if it cannot be read.
pub fn find_videos<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>, SlidegrabError> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
        return Err(SlidegrabError::InvalidInput(format!(
            "input directory not found: {}",
            directory.display()
        )));
    }

    let mut videos = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && is_video(&path) {
            videos.push(path);
        }
    }
    videos.sort();

    log::debug!("Found {} video(s) in {}", videos.len(), directory.display());
    Ok(videos)
}

/// `true` if `path` has one of [`VIDEO_EXTENSIONS`].
pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}

/// Per-video output directory: `<output_root>/<file stem>`.
pub fn output_directory_for(output_root: &Path, video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    output_root.join(stem)
}
