//! Acquisition: produce the chapter's ordered page-image set.
//!
//! ## Cache first
//!
//! If `chapter_<id>/` already exists and is non-empty the operator is asked
//! whether to download again. On refusal the image set is rebuilt from the
//! directory alone (image extensions only, lexicographic order) and the
//! network is never touched. The zero-padded `page_NNN` names are what make
//! that sort equal to the original download order.
//!
//! ## Download
//!
//! The listing page is fetched once; failing that is stage-fatal and leaves
//! any existing images in place. Once the listing is in hand, images from an
//! earlier download are removed so the directory only ever holds the pages
//! of a single listing fetch. Every page image is then fetched individually
//! and a failure there only skips that image. Pages are written through a
//! `.part` file and renamed, so a failed write leaves nothing behind. Saved
//! files are numbered by successful download (1st, 2nd, 3rd success), not by
//! element position, so the set has no gaps.
//!
//! Downloads run `concurrency` at a time through an ordered buffer: files are
//! written and numbered in discovery order regardless of completion order.

use crate::chapter::{is_image_file, Chapter};
use crate::confirm::{self, ConfirmHandle};
use crate::error::{FetchError, MangaTmxError, PageError};
use crate::output::{file_name, AcquisitionSource};
use crate::pipeline::fetch::{FetchResponse, HttpFetcher};
use crate::pipeline::listing::{extract_image_sources, ImageSource};
use crate::progress::{ProgressCallback, Stage};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Inputs of the acquisition stage.
pub struct AcquireParams<'a> {
    pub chapter: &'a Chapter,
    pub source_url: &'a str,
    pub id_prefix: &'a str,
    pub concurrency: usize,
    pub fetcher: &'a dyn HttpFetcher,
    pub confirm: &'a ConfirmHandle,
    pub progress: Option<&'a ProgressCallback>,
}

/// Output of the acquisition stage.
#[derive(Debug, Clone, Default)]
pub struct Acquired {
    pub source: AcquisitionSource,
    /// Page images in page order.
    pub images: Vec<PathBuf>,
    /// Matching image elements on the listing page (0 for a cache hit).
    pub discovered: usize,
    /// Per-image failures, in element order.
    pub failures: Vec<PageError>,
}

/// Run the acquisition stage.
///
/// # Errors
/// Only stage-fatal conditions: the chapter directory cannot be read or
/// created, or the listing page cannot be fetched.
pub async fn acquire(params: AcquireParams<'_>) -> Result<Acquired, MangaTmxError> {
    let dir = params.chapter.image_dir();

    if dir_has_entries(dir).await? {
        let prompt = format!(
            "The folder '{}' already exists and contains images. Download them again?",
            dir.display()
        );
        if !confirm::ask(params.confirm, prompt).await {
            info!("Using existing images in {}", dir.display());
            let images = list_cached_images(dir).await?;
            return Ok(Acquired {
                source: AcquisitionSource::Cache,
                images,
                discovered: 0,
                failures: Vec::new(),
            });
        }
    }

    download(params).await
}

/// Rebuild the image set from an existing chapter directory.
///
/// Keeps files with a recognised image extension, sorted by file name.
pub async fn list_cached_images(dir: &Path) -> Result<Vec<PathBuf>, MangaTmxError> {
    let read_err = |source| MangaTmxError::CacheReadFailed {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut images = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Delete every image file in `dir`, returning how many were removed.
///
/// Other files (and half-written `.part` files) are left alone.
pub async fn clear_cached_images(dir: &Path) -> Result<usize, MangaTmxError> {
    let images = list_cached_images(dir).await?;
    for path in &images {
        tokio::fs::remove_file(path)
            .await
            .map_err(|source| MangaTmxError::OutputDirFailed {
                path: path.clone(),
                source,
            })?;
    }
    Ok(images.len())
}

/// True if `dir` exists and holds at least one entry.
async fn dir_has_entries(dir: &Path) -> Result<bool, MangaTmxError> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => Ok(entries
            .next_entry()
            .await
            .map_err(|source| MangaTmxError::CacheReadFailed {
                path: dir.to_path_buf(),
                source,
            })?
            .is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => Ok(false),
        Err(source) => Err(MangaTmxError::CacheReadFailed {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

async fn download(params: AcquireParams<'_>) -> Result<Acquired, MangaTmxError> {
    let dir = params.chapter.image_dir();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| MangaTmxError::OutputDirFailed {
            path: dir.to_path_buf(),
            source,
        })?;

    // ── Listing page (stage-fatal) ───────────────────────────────────────
    info!("Fetching chapter listing: {}", params.source_url);
    let listing = match params.fetcher.get(params.source_url).await {
        Ok(r) if r.is_success() => r,
        Ok(r) => {
            return Err(MangaTmxError::ListingFetchFailed {
                url: params.source_url.to_string(),
                reason: format!("HTTP {}", r.status),
            })
        }
        Err(FetchError::Timeout { secs }) => {
            return Err(MangaTmxError::ListingTimeout {
                url: params.source_url.to_string(),
                secs,
            })
        }
        Err(FetchError::Network(reason)) => {
            return Err(MangaTmxError::ListingFetchFailed {
                url: params.source_url.to_string(),
                reason,
            })
        }
    };

    let html = String::from_utf8_lossy(&listing.body);
    let sources = extract_image_sources(&html, params.id_prefix, params.source_url);
    let total = sources.len();
    info!("Listing has {} page images", total);

    // The directory must hold exactly this fetch's pages, never leftovers
    // from an earlier, longer download.
    let stale = clear_cached_images(dir).await?;
    if stale > 0 {
        info!("Removed {} previously downloaded images", stale);
    }

    if let Some(cb) = params.progress {
        cb.on_stage_start(Stage::Acquisition, total);
    }

    // ── Page images (per-item recoverable) ───────────────────────────────
    let fetcher = params.fetcher;
    let mut downloads = stream::iter(sources.into_iter().map(|source| async move {
        let result = match source.url.as_deref() {
            Some(url) => Some(fetcher.get(url).await),
            None => None,
        };
        (source, result)
    }))
    .buffered(params.concurrency.max(1));

    let mut images = Vec::with_capacity(total);
    let mut failures = Vec::new();

    while let Some((source, result)) = downloads.next().await {
        let position = source.position;
        let outcome = match result {
            None => Err(PageError::MissingSource { position }),
            Some(result) => save_page(params.chapter, &source, result, images.len() + 1).await,
        };

        match outcome {
            Ok(path) => {
                info!("Downloaded: {}", file_name(&path));
                if let Some(cb) = params.progress {
                    cb.on_item_complete(Stage::Acquisition, position, total, file_name(&path));
                }
                images.push(path);
            }
            Err(e) => {
                warn!("{}", e);
                if let Some(cb) = params.progress {
                    cb.on_item_error(Stage::Acquisition, position, total, e.to_string());
                }
                failures.push(e);
            }
        }
    }

    if let Some(cb) = params.progress {
        cb.on_stage_complete(Stage::Acquisition, total, images.len());
    }

    Ok(Acquired {
        source: AcquisitionSource::Download,
        images,
        discovered: total,
        failures,
    })
}

/// Persist one downloaded page as `page_<index:03>.webp`.
async fn save_page(
    chapter: &Chapter,
    source: &ImageSource,
    result: Result<FetchResponse, FetchError>,
    index: usize,
) -> Result<PathBuf, PageError> {
    let url = source.url.clone().unwrap_or_default();
    let response = match result {
        Ok(r) if r.is_success() => r,
        Ok(r) => {
            return Err(PageError::DownloadFailed {
                position: source.position,
                url,
                detail: format!("HTTP {}", r.status),
            })
        }
        Err(FetchError::Timeout { secs }) => {
            return Err(PageError::DownloadTimeout {
                position: source.position,
                url,
                secs,
            })
        }
        Err(FetchError::Network(detail)) => {
            return Err(PageError::DownloadFailed {
                position: source.position,
                url,
                detail,
            })
        }
    };

    let path = chapter.page_path(index);
    write_page(&path, &response.body)
        .await
        .map_err(|e| PageError::SaveFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
    Ok(path)
}

/// Write through `<page>.part` and rename, so a failed write never leaves a
/// truncated image where a cache reload would pick it up.
async fn write_page(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("webp.part");
    let result = match tokio::fs::write(&tmp_path, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}
