//! Writing captured frames.
//!
//! [`ImageDirectoryPersister`] names every file after the frame index
//! (`frame_000123.png`), so workers scanning disjoint segments can write into
//! the same directory without coordination.

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::SlidegrabError;

/// Persists a captured frame and returns where it went.
pub trait FramePersister: Send + Sync {
    /// Write `image`, captured at `frame_number`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::PersistenceFailure`] if the write fails.
    fn persist(&self, image: &DynamicImage, frame_number: u64) -> Result<PathBuf, SlidegrabError>;
}

/// Saves frames as image files in one directory.
#[derive(Debug, Clone)]
pub struct ImageDirectoryPersister {
    directory: PathBuf,
    extension: String,
}

impl ImageDirectoryPersister {
    /// Persist PNG files into `directory`, creating it on first write.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            extension: "png".to_string(),
        }
    }

    /// Use a different image extension (`jpg`, `bmp`, `tiff`, ...).
    ///
    /// The encoder is chosen from the extension by the `image` crate.
    #[must_use]
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self
    }

    /// Target directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path a capture at `frame_number` is written to.
    pub fn path_for(&self, frame_number: u64) -> PathBuf {
        self.directory
            .join(format!("frame_{frame_number:06}.{}", self.extension))
    }
}

impl FramePersister for ImageDirectoryPersister {
    fn persist(&self, image: &DynamicImage, frame_number: u64) -> Result<PathBuf, SlidegrabError> {
        let path = self.path_for(frame_number);
        let failure = |reason: String| SlidegrabError::PersistenceFailure {
            frame_number,
            path: path.clone(),
            reason,
        };

        fs::create_dir_all(&self.directory).map_err(|error| failure(error.to_string()))?;
        image.save(&path).map_err(|error| failure(error.to_string()))?;

        log::debug!("Saved frame {frame_number} -> {}", path.display());
        Ok(path)
    }
}
