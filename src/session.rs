//! The chapter session: one listing URL, one language, three stages.
//!
//! A [`Session`] is constructed once per chapter. Construction derives the
//! chapter id and checks the OCR language before any network or filesystem
//! work. The stages then run strictly forward:
//!
//! ```text
//! Session::new ──▶ acquire ──▶ extract ──▶ write_exchange_document
//! (id, language)   (images)    (pairs)     (chapter_<id>.tmx)
//! ```
//!
//! [`Session::run`] drives all three and returns a [`RunReport`]. Use the
//! individual stage methods when you need to inspect intermediate state.

use crate::chapter::Chapter;
use crate::config::SessionConfig;
use crate::confirm::{ConfirmHandle, TerminalConfirm};
use crate::error::MangaTmxError;
use crate::output::{ExtractedPair, ProbeReport, RunReport, WriteOutcome};
use crate::pipeline::acquisition::{self, AcquireParams, Acquired};
use crate::pipeline::decode::decode_file;
use crate::pipeline::extraction::{self, ExtractParams, Extracted};
use crate::pipeline::fetch::{HttpFetcher, ReqwestFetcher};
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::tmx;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Orchestrates one chapter run.
pub struct Session {
    source_url: String,
    language: String,
    chapter: Chapter,
    config: SessionConfig,
    fetcher: Arc<dyn HttpFetcher>,
    engine: Arc<dyn OcrEngine>,
    confirm: ConfirmHandle,
    acquired: Acquired,
    extracted: Extracted,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("source_url", &self.source_url)
            .field("language", &self.language)
            .field("chapter", &self.chapter)
            .field("images", &self.acquired.images.len())
            .field("pairs", &self.extracted.pairs.len())
            .finish()
    }
}

impl Session {
    /// Create a session for `source_url`, OCR-ing in `language`.
    ///
    /// # Errors
    /// - [`MangaTmxError::InvalidChapterUrl`] if no chapter id can be derived
    /// - [`MangaTmxError::OcrUnavailable`] if the engine cannot be queried
    /// - [`MangaTmxError::LanguageUnavailable`] if a requested language pack is
    ///   not installed
    pub async fn new(
        source_url: impl Into<String>,
        language: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, MangaTmxError> {
        let source_url = source_url.into().trim().to_string();
        let language = language.into().trim().to_string();

        let chapter = Chapter::from_url(&source_url, &config.output_root)?;
        let engine = resolve_engine(&config);
        verify_language(engine.as_ref(), &language).await?;
        let fetcher = resolve_fetcher(&config)?;
        let confirm = config
            .confirm
            .clone()
            .unwrap_or_else(|| Arc::new(TerminalConfirm));

        info!(
            "Session for chapter {} ({}), language {}",
            chapter.id(),
            source_url,
            language
        );

        Ok(Self {
            source_url,
            language,
            chapter,
            config,
            fetcher,
            engine,
            confirm,
            acquired: Acquired::default(),
            extracted: Extracted::default(),
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub fn chapter_id(&self) -> &str {
        self.chapter.id()
    }

    /// `chapter_<id>/` under the configured output root.
    pub fn output_directory(&self) -> &Path {
        self.chapter.image_dir()
    }

    /// Page images in page order, as of the last [`Session::acquire`].
    pub fn images(&self) -> &[PathBuf] {
        &self.acquired.images
    }

    /// Pairs with text, as of the last [`Session::extract`].
    pub fn extracted_pairs(&self) -> &[ExtractedPair] {
        &self.extracted.pairs
    }

    /// Stage 1: reuse the cached chapter directory or download the pages.
    ///
    /// On error the image set is left empty.
    pub async fn acquire(&mut self) -> Result<&[PathBuf], MangaTmxError> {
        self.acquired = Acquired::default();
        self.extracted = Extracted::default();

        let acquired = acquisition::acquire(AcquireParams {
            chapter: &self.chapter,
            source_url: &self.source_url,
            id_prefix: &self.config.image_id_prefix,
            concurrency: self.config.concurrency,
            fetcher: self.fetcher.as_ref(),
            confirm: &self.confirm,
            progress: self.config.progress_callback.as_ref(),
        })
        .await?;

        info!(
            "Acquired {} images ({:?}, {} failed)",
            acquired.images.len(),
            acquired.source,
            acquired.failures.len()
        );
        self.acquired = acquired;
        Ok(&self.acquired.images)
    }

    /// Stage 2: OCR the acquired images. Rebuilds the pair list from scratch.
    pub async fn extract(&mut self) -> &[ExtractedPair] {
        self.extracted = extraction::extract_text_from_images(ExtractParams {
            images: &self.acquired.images,
            language: &self.language,
            concurrency: self.config.concurrency,
            engine: self.engine.as_ref(),
            progress: self.config.progress_callback.as_ref(),
        })
        .await;

        info!(
            "Extracted text from {}/{} images",
            self.extracted.pairs.len(),
            self.acquired.images.len()
        );
        &self.extracted.pairs
    }

    /// Stage 3: write `chapter_<id>.tmx`, asking before overwriting.
    pub async fn write_exchange_document(&self) -> Result<WriteOutcome, MangaTmxError> {
        tmx::write_exchange_document(
            self.chapter.id(),
            &self.language,
            &self.extracted.pairs,
            self.chapter.document_path(),
            &self.confirm,
        )
        .await
    }

    /// Run all three stages.
    ///
    /// A failed acquisition is recorded in the report and the later stages
    /// run on an empty image set; only a failed document write is returned
    /// as `Err`.
    pub async fn run(mut self) -> Result<RunReport, MangaTmxError> {
        let start = Instant::now();

        let acquisition_error = match self.acquire().await {
            Ok(_) => None,
            Err(e) => {
                error!("{}", e);
                Some(e.to_string())
            }
        };

        self.extract().await;
        let document = self.write_exchange_document().await?;

        let mut failures = std::mem::take(&mut self.acquired.failures);
        failures.extend(std::mem::take(&mut self.extracted.failures));

        Ok(RunReport {
            chapter_id: self.chapter.id().to_string(),
            language: self.language,
            image_dir: self.chapter.image_dir().to_path_buf(),
            source: self.acquired.source,
            discovered: self.acquired.discovered,
            images: self.acquired.images.len(),
            extracted: self.extracted.pairs.len(),
            empty_pages: self.extracted.empty_pages,
            failures,
            acquisition_error,
            document,
            total_duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Language packs installed in the configured OCR engine.
pub async fn list_languages(config: &SessionConfig) -> Result<Vec<String>, MangaTmxError> {
    let engine = resolve_engine(config);
    engine
        .supported_languages()
        .await
        .map_err(|e| MangaTmxError::OcrUnavailable {
            reason: e.to_string(),
        })
}

/// OCR a single image and report what the engine saw.
///
/// Useful to check an installation before running a whole chapter.
pub async fn probe_image(
    path: impl AsRef<Path>,
    language: &str,
    config: &SessionConfig,
) -> Result<ProbeReport, MangaTmxError> {
    let path = path.as_ref().to_path_buf();
    let engine = resolve_engine(config);
    verify_language(engine.as_ref(), language).await?;

    let owned = path.clone();
    let decoded = tokio::task::spawn_blocking(move || decode_file(&owned))
        .await
        .map_err(|e| MangaTmxError::Internal(format!("Decode task panicked: {e}")))?
        .map_err(|e| MangaTmxError::Internal(format!("Cannot decode {}: {e}", path.display())))?;

    let text = engine
        .recognize(&decoded.image, language)
        .await
        .map_err(|e| MangaTmxError::OcrUnavailable {
            reason: e.to_string(),
        })?;
    if text.trim().is_empty() {
        warn!("No text detected in {}", path.display());
    }

    Ok(ProbeReport {
        file: path,
        format: decoded.format.map(|f| format!("{f:?}")),
        width: decoded.image.width(),
        height: decoded.image.height(),
        color: format!("{:?}", decoded.image.color()),
        text,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn resolve_engine(config: &SessionConfig) -> Arc<dyn OcrEngine> {
    match config.ocr_engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(TesseractEngine::new(config)),
    }
}

fn resolve_fetcher(config: &SessionConfig) -> Result<Arc<dyn HttpFetcher>, MangaTmxError> {
    match config.fetcher {
        Some(ref fetcher) => Ok(Arc::clone(fetcher)),
        None => Ok(Arc::new(ReqwestFetcher::new(config)?)),
    }
}

/// Check every `+`-joined component of `language` against the engine.
async fn verify_language(engine: &dyn OcrEngine, language: &str) -> Result<(), MangaTmxError> {
    let available = engine
        .supported_languages()
        .await
        .map_err(|e| MangaTmxError::OcrUnavailable {
            reason: e.to_string(),
        })?;
    debug!("Available languages: {:?}", available);

    let missing = language
        .split('+')
        .find(|code| code.is_empty() || !available.iter().any(|a| a == code));

    match missing {
        None => Ok(()),
        Some(code) => Err(MangaTmxError::LanguageUnavailable {
            language: if code.is_empty() {
                language.to_string()
            } else {
                code.to_string()
            },
            available,
        }),
    }
}
