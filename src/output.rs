//! Result types produced by a chapter run.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One page image paired with its recognised text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPair {
    /// Path of the page image inside the chapter directory.
    pub image: PathBuf,
    /// Trimmed OCR output; never empty.
    pub text: String,
}

impl ExtractedPair {
    /// Base file name of the image, e.g. `page_001.webp`.
    pub fn image_name(&self) -> String {
        file_name(&self.image)
    }
}

/// Where the chapter's images came from in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcquisitionSource {
    /// Nothing acquired yet.
    #[default]
    None,
    /// Reused from an existing chapter directory; no network access.
    Cache,
    /// Freshly downloaded from the listing page.
    Download,
}

/// What happened to the exchange document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// Document written (complete rewrite).
    Written { path: PathBuf, units: usize },
    /// The file existed and the operator declined to overwrite it.
    Declined { path: PathBuf },
}

/// Summary of a full [`crate::Session::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub chapter_id: String,
    pub language: String,
    pub image_dir: PathBuf,
    pub source: AcquisitionSource,
    /// Image elements found on the listing page (0 when the cache was reused).
    pub discovered: usize,
    /// Page images available for extraction.
    pub images: usize,
    /// Pages that yielded non-empty text.
    pub extracted: usize,
    /// Pages whose OCR output was blank.
    pub empty_pages: usize,
    /// Per-item failures from both stages, in the order they occurred.
    pub failures: Vec<PageError>,
    /// Set when acquisition failed as a whole (listing page unreachable,
    /// chapter directory unusable). Later stages then ran on no images.
    pub acquisition_error: Option<String>,
    pub document: WriteOutcome,
    pub total_duration_ms: u64,
}

impl RunReport {
    /// True when the run ended without a stage-fatal error.
    pub fn is_success(&self) -> bool {
        self.acquisition_error.is_none()
    }
}

/// Result of OCR-ing one image outside a chapter run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub file: PathBuf,
    /// Detected container format, e.g. `WebP`.
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Pixel layout, e.g. `Rgb8`.
    pub color: String,
    /// Raw (untrimmed) OCR output.
    pub text: String,
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
