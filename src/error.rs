//! Error types for the manga-tmx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MangaTmxError`] — **Fatal**: the run (or a whole stage) cannot
//!   proceed (bad chapter URL, language pack missing, listing page
//!   unreachable). Returned as `Err(MangaTmxError)`.
//!
//! * [`PageError`] — **Non-fatal**: a single page image failed to download,
//!   decode or OCR, but its siblings are fine. Collected into
//!   [`crate::output::RunReport`] so callers can inspect partial success
//!   instead of losing the whole chapter to one bad page.
//!
//! [`FetchError`] and [`OcrError`] are what the pluggable collaborators
//! ([`crate::pipeline::fetch::HttpFetcher`], [`crate::pipeline::ocr::OcrEngine`])
//! return; the stages map them into one of the two enums above.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the manga-tmx library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::RunReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum MangaTmxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The chapter identifier could not be derived from the URL.
    #[error("Cannot derive a chapter id from '{url}'\nExpected a URL like https://host/manga-x/chapter-445/")]
    InvalidChapterUrl { url: String },

    // ── OCR engine errors ─────────────────────────────────────────────────
    /// The requested language pack is not installed in the OCR engine.
    #[error("Language '{language}' is not available in Tesseract.\nInstalled languages: {}", .available.join(", "))]
    LanguageUnavailable {
        language: String,
        available: Vec<String>,
    },

    /// The OCR engine could not be queried at all.
    #[error("Tesseract is not usable: {reason}\nCheck --tesseract-cmd and --tessdata-prefix.")]
    OcrUnavailable { reason: String },

    // ── Network errors ────────────────────────────────────────────────────
    /// The chapter listing page could not be fetched.
    #[error("Failed to access '{url}': {reason}\nCheck your internet connection and the chapter URL.")]
    ListingFetchFailed { url: String, reason: String },

    /// The chapter listing request exceeded the configured timeout.
    #[error("Listing request timed out after {secs}s for '{url}'\nIncrease --timeout.")]
    ListingTimeout { url: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the chapter image directory.
    #[error("Failed to create chapter directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not list an existing chapter directory.
    #[error("Failed to read cached images from '{path}': {source}")]
    CacheReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the exchange document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The XML writer rejected the document.
    #[error("Failed to serialise exchange document: {0}")]
    Serialization(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page image.
///
/// `position` is the 1-based position of the image element in the listing
/// page, which is what an operator sees when comparing with the browser.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The image element carried neither a lazy-load nor a standard source.
    #[error("Image element {position}: no data-src or src attribute")]
    MissingSource { position: usize },

    /// The page image request failed or returned a non-2xx status.
    #[error("Image element {position}: failed to download {url}: {detail}")]
    DownloadFailed {
        position: usize,
        url: String,
        detail: String,
    },

    /// The page image request timed out.
    #[error("Image element {position}: download of {url} timed out after {secs}s")]
    DownloadTimeout {
        position: usize,
        url: String,
        secs: u64,
    },

    /// The downloaded bytes could not be written to the chapter directory.
    #[error("Failed to save {path:?}: {detail}")]
    SaveFailed { path: PathBuf, detail: String },

    /// The image file could not be opened or decoded.
    #[error("Failed to decode {path:?}: {detail}")]
    DecodeFailed { path: PathBuf, detail: String },

    /// The OCR engine failed on this image.
    #[error("OCR failed for {path:?}: {detail}")]
    OcrFailed { path: PathBuf, detail: String },
}

/// Failure reported by an [`crate::pipeline::fetch::HttpFetcher`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection, TLS or body-read failure.
    #[error("{0}")]
    Network(String),
}

/// Failure reported by an [`crate::pipeline::ocr::OcrEngine`].
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The engine binary could not be started.
    #[error("cannot run '{cmd}': {detail}")]
    Spawn { cmd: String, detail: String },

    /// The engine ran but reported failure.
    #[error("{0}")]
    Failed(String),

    /// The engine did not answer within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The image could not be handed to the engine.
    #[error("image encoding failed: {0}")]
    Encode(String),
}
