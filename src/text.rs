//! Text extraction from frames.
//!
//! [`TextExtractor`] is the OCR seam of the scanner. [`TesseractExtractor`]
//! drives the `tesseract` command-line tool: the frame is converted to
//! grayscale, encoded as PNG in memory, and piped through
//! `tesseract stdin stdout`. Closures with the right signature implement the
//! trait too, which is handy for tests and custom engines.
//!
//! # Example
//!
//! ```no_run
//! use slidegrab::{TesseractExtractor, TextExtractor};
//!
//! let extractor = TesseractExtractor::new().with_languages("eng");
//! let image = image::open("slide.png")?;
//! let text = extractor.extract(&image, 0)?;
//! println!("{text}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::{DynamicImage, ImageFormat};

use crate::error::SlidegrabError;

/// Extracts text from a decoded frame.
pub trait TextExtractor: Send + Sync {
    /// Return the text in `image`, trimmed, or `""` if none was recognised.
    ///
    /// `frame_number` is context for diagnostics only.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::ExtractionFailure`] if the engine fails.
    fn extract(&self, image: &DynamicImage, frame_number: u64) -> Result<String, SlidegrabError>;
}

impl<F> TextExtractor for F
where
    F: Fn(&DynamicImage, u64) -> Result<String, SlidegrabError> + Send + Sync,
{
    fn extract(&self, image: &DynamicImage, frame_number: u64) -> Result<String, SlidegrabError> {
        self(image, frame_number)
    }
}

/// Default `-l` argument: simplified Chinese plus English.
pub const DEFAULT_LANGUAGES: &str = "chi_sim+eng";

/// OCR through the `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    program: PathBuf,
    languages: String,
    page_segmentation_mode: Option<u8>,
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractExtractor {
    /// Use `tesseract` from `PATH` with [`DEFAULT_LANGUAGES`].
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            languages: DEFAULT_LANGUAGES.to_string(),
            page_segmentation_mode: None,
        }
    }

    /// Use a specific tesseract binary.
    #[must_use]
    pub fn with_program<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    /// Set the `-l` language list, e.g. `"eng"` or `"chi_sim+eng"`.
    #[must_use]
    pub fn with_languages(mut self, languages: &str) -> Self {
        self.languages = languages.to_string();
        self
    }

    /// Set tesseract's `--psm` page segmentation mode.
    #[must_use]
    pub fn with_page_segmentation_mode(mut self, mode: u8) -> Self {
        self.page_segmentation_mode = Some(mode);
        self
    }

    /// Arguments passed to the tesseract process.
    pub(crate) fn arguments(&self) -> Vec<String> {
        let mut arguments = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.languages.clone(),
        ];
        if let Some(mode) = self.page_segmentation_mode {
            arguments.push("--psm".to_string());
            arguments.push(mode.to_string());
        }
        arguments
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(&self, image: &DynamicImage, frame_number: u64) -> Result<String, SlidegrabError> {
        let failure = |reason: String| SlidegrabError::ExtractionFailure {
            frame_number,
            reason,
        };

        let grayscale = DynamicImage::ImageLuma8(image.to_luma8());
        let mut encoded = Vec::new();
        grayscale
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|error| failure(format!("PNG encoding failed: {error}")))?;

        let mut child = Command::new(&self.program)
            .args(self.arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                failure(format!("could not start {}: {error}", self.program.display()))
            })?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| failure("tesseract stdin unavailable".to_string()))?;
            stdin
                .write_all(&encoded)
                .map_err(|error| failure(format!("writing to tesseract failed: {error}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|error| failure(format!("waiting for tesseract failed: {error}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        log::trace!("Frame {frame_number}: extracted {} chars", text.chars().count());
        Ok(text)
    }
}
