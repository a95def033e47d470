//! Progress-callback trait for per-stage, per-page events.
//!
//! Inject an [`Arc<dyn SessionProgressCallback>`] via
//! [`crate::config::SessionConfigBuilder::progress_callback`] to receive
//! events as the acquisition and extraction stages work through a chapter.
//!
//! Callers can forward events to a terminal progress bar, a log, or a channel
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because pages may be processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use manga_tmx::{SessionConfig, SessionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl SessionProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, stage: Stage, index: usize, total: usize, detail: String) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage}: {index}/{total} {detail}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = SessionConfig::builder()
//!     .progress_callback(counter as Arc<dyn SessionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The two item-by-item stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Downloading page images.
    Acquisition,
    /// Running OCR over page images.
    Extraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Acquisition => f.write_str("Downloading"),
            Stage::Extraction => f.write_str("Recognising"),
        }
    }
}

/// Called by the session as it works through each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
///
/// # Thread safety
///
/// With `concurrency > 1` the per-item methods may be called from different
/// tasks at once; protect shared state accordingly.
pub trait SessionProgressCallback: Send + Sync {
    /// Called once before the first item of a stage.
    fn on_stage_start(&self, stage: Stage, total_items: usize) {
        let _ = (stage, total_items);
    }

    /// Called when one item finished successfully.
    ///
    /// `detail` is a short human-readable note (file name, text length).
    fn on_item_complete(&self, stage: Stage, index: usize, total: usize, detail: String) {
        let _ = (stage, index, total, detail);
    }

    /// Called when one item failed and was skipped.
    fn on_item_error(&self, stage: Stage, index: usize, total: usize, error: String) {
        let _ = (stage, index, total, error);
    }

    /// Called once after every item of the stage was attempted.
    fn on_stage_complete(&self, stage: Stage, total_items: usize, success_count: usize) {
        let _ = (stage, total_items, success_count);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl SessionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SessionConfig`].
pub type ProgressCallback = Arc<dyn SessionProgressCallback>;
