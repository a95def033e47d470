//! Extraction: OCR every page image, keep the ones that say something.
//!
//! Each image is decoded (content-sniffed, on the blocking pool), handed to
//! the [`OcrEngine`] and its output trimmed. Blank output is logged and
//! contributes nothing; any error for one image is logged with its path and
//! that image is skipped. The result is always a fresh list in the same order
//! as the input, restricted to pages with text.

use crate::error::PageError;
use crate::output::{file_name, ExtractedPair};
use crate::pipeline::decode::decode_file;
use crate::pipeline::ocr::OcrEngine;
use crate::progress::{ProgressCallback, Stage};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Inputs of the extraction stage.
pub struct ExtractParams<'a> {
    pub images: &'a [PathBuf],
    pub language: &'a str,
    pub concurrency: usize,
    pub engine: &'a dyn OcrEngine,
    pub progress: Option<&'a ProgressCallback>,
}

/// Output of the extraction stage.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// `(image, text)` pairs in image order.
    pub pairs: Vec<ExtractedPair>,
    /// Images whose OCR output was blank.
    pub empty_pages: usize,
    /// Images that failed to decode or OCR.
    pub failures: Vec<PageError>,
}

enum PageOutcome {
    Text(String),
    Blank,
    Failed(PageError),
}

/// Run OCR over `images` in order. Never fails as a whole.
pub async fn extract_text_from_images(params: ExtractParams<'_>) -> Extracted {
    let total = params.images.len();
    if let Some(cb) = params.progress {
        cb.on_stage_start(Stage::Extraction, total);
    }

    let engine = params.engine;
    let language = params.language;
    let mut pages = stream::iter(params.images.iter().map(|path| async move {
        (path, recognize_page(engine, path, language).await)
    }))
    .buffered(params.concurrency.max(1));

    let mut extracted = Extracted::default();
    let mut index = 0;

    while let Some((path, outcome)) = pages.next().await {
        index += 1;
        let name = file_name(path);
        match outcome {
            PageOutcome::Text(text) => {
                info!("Extracted {} chars from {}", text.chars().count(), name);
                debug!("{}:\n{}", name, text);
                if let Some(cb) = params.progress {
                    cb.on_item_complete(
                        Stage::Extraction,
                        index,
                        total,
                        format!("{name} ({} chars)", text.chars().count()),
                    );
                }
                extracted.pairs.push(ExtractedPair {
                    image: path.clone(),
                    text,
                });
            }
            PageOutcome::Blank => {
                warn!("No text detected in {}", name);
                extracted.empty_pages += 1;
                if let Some(cb) = params.progress {
                    cb.on_item_complete(Stage::Extraction, index, total, format!("{name} (no text)"));
                }
            }
            PageOutcome::Failed(e) => {
                warn!("{}", e);
                if let Some(cb) = params.progress {
                    cb.on_item_error(Stage::Extraction, index, total, e.to_string());
                }
                extracted.failures.push(e);
            }
        }
    }

    if let Some(cb) = params.progress {
        cb.on_stage_complete(Stage::Extraction, total, extracted.pairs.len());
    }
    extracted
}

async fn recognize_page(engine: &dyn OcrEngine, path: &Path, language: &str) -> PageOutcome {
    let owned = path.to_path_buf();
    let decoded = match tokio::task::spawn_blocking(move || decode_file(&owned)).await {
        Ok(Ok(d)) => d,
        Ok(Err(e)) => {
            return PageOutcome::Failed(PageError::DecodeFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
        }
        Err(e) => {
            return PageOutcome::Failed(PageError::DecodeFailed {
                path: path.to_path_buf(),
                detail: format!("decode task panicked: {e}"),
            })
        }
    };

    match engine.recognize(&decoded.image, language).await {
        Ok(raw) => {
            let text = raw.trim();
            if text.is_empty() {
                PageOutcome::Blank
            } else {
                PageOutcome::Text(text.to_string())
            }
        }
        Err(e) => PageOutcome::Failed(PageError::OcrFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }),
    }
}
