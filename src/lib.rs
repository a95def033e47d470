//! # manga-tmx
//!
//! Download a manga chapter's page images, OCR them with Tesseract and save
//! the recognised text as a TMX 1.4 translation-memory document.
//!
//! ## Why this crate?
//!
//! Translators working on scanlations want the source text of every page in
//! a format their CAT tools already understand. This crate turns a chapter
//! listing URL into `chapter_<id>.tmx`, one translation unit per page, with
//! the page image named in a note so every segment can be traced back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! listing URL
//!  │
//!  ├─ 0. Session   derive chapter id, check the OCR language pack
//!  ├─ 1. Acquire   reuse chapter_<id>/ or download page_NNN.webp (concurrent, ordered)
//!  ├─ 2. Extract   decode + tesseract per page (blank pages dropped)
//!  └─ 3. Write     chapter_<id>.tmx (asks before overwriting)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manga_tmx::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::builder().output_root("out").build()?;
//!     let session = Session::new(
//!         "https://example.com/manga-x/chapter-445/",
//!         "eng",
//!         config,
//!     )
//!     .await?;
//!     let report = session.run().await?;
//!     eprintln!("{} pages with text out of {}", report.extracted, report.images);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `manga2tmx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! manga-tmx = { version = "0.1", default-features = false }
//! ```
//!
//! ## External requirements
//!
//! The default OCR engine shells out to the `tesseract` binary. Install it
//! together with the language packs you need (`tesseract --list-langs`).
//! Point [`SessionConfig::tesseract_cmd`] or `TESSDATA_PREFIX` elsewhere
//! for non-standard installs, or inject your own [`OcrEngine`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chapter;
pub mod config;
pub mod confirm;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chapter::{chapter_id, Chapter};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use confirm::{Confirm, ConfirmHandle, FixedAnswer, TerminalConfirm};
pub use error::{FetchError, MangaTmxError, OcrError, PageError};
pub use output::{AcquisitionSource, ExtractedPair, ProbeReport, RunReport, WriteOutcome};
pub use pipeline::fetch::{FetchResponse, HttpFetcher, ReqwestFetcher};
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::tmx::render_exchange_document;
pub use progress::{NoopProgressCallback, ProgressCallback, SessionProgressCallback, Stage};
pub use session::{list_languages, probe_image, Session};
