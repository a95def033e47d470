//! Configuration for a chapter run.
//!
//! All behaviour is controlled through [`SessionConfig`], built via its
//! [`SessionConfigBuilder`]. The collaborators the pipeline talks to (HTTP,
//! OCR engine, operator prompt, progress sink) live here too, as optional
//! `Arc<dyn …>` handles: when unset, the session builds the real ones from the
//! plain fields (`tesseract_cmd`, `user_agent`, timeouts).

use crate::confirm::ConfirmHandle;
use crate::error::MangaTmxError;
use crate::pipeline::fetch::HttpFetcher;
use crate::pipeline::ocr::OcrEngine;
use crate::progress::{ProgressCallback, SessionProgressCallback};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Browser-like user agent; the chapter hosts reject non-browser clients.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// `id` prefix of the `<img>` elements that hold chapter pages.
pub const DEFAULT_IMAGE_ID_PREFIX: &str = "image-";

/// Configuration for one chapter run.
///
/// Built via [`SessionConfig::builder()`] or [`SessionConfig::default()`].
///
/// # Example
/// ```rust
/// use manga_tmx::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .output_root("/tmp/manga")
///     .tesseract_cmd("/usr/local/bin/tesseract")
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// Directory holding `chapter_<id>/` and `chapter_<id>.tmx`. Default: `.`.
    pub output_root: PathBuf,

    /// Tesseract binary. Default: `tesseract` (resolved through `PATH`).
    pub tesseract_cmd: PathBuf,

    /// Value for `TESSDATA_PREFIX`, set on the child process only.
    pub tessdata_prefix: Option<PathBuf>,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Per-request timeout in seconds. Default: 60.
    ///
    /// A timeout on the listing page is stage-fatal; on a page image it only
    /// skips that image.
    pub request_timeout_secs: u64,

    /// Per-image OCR timeout in seconds. Default: 120.
    pub ocr_timeout_secs: u64,

    /// Number of page downloads / OCR calls in flight. Default: 4.
    ///
    /// Results are always gathered in discovery order, whatever the
    /// completion order.
    pub concurrency: usize,

    /// `id` prefix identifying page images on the listing page. Default: `image-`.
    pub image_id_prefix: String,

    /// Pre-constructed HTTP client. Takes precedence over `user_agent` and
    /// `request_timeout_secs`.
    pub fetcher: Option<Arc<dyn HttpFetcher>>,

    /// Pre-constructed OCR engine. Takes precedence over `tesseract_cmd`.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Answers the redownload / overwrite questions. Default: terminal prompt.
    pub confirm: Option<ConfirmHandle>,

    /// Optional progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            tesseract_cmd: PathBuf::from("tesseract"),
            tessdata_prefix: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 60,
            ocr_timeout_secs: 120,
            concurrency: 4,
            image_id_prefix: DEFAULT_IMAGE_ID_PREFIX.to_string(),
            fetcher: None,
            ocr_engine: None,
            confirm: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("output_root", &self.output_root)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("tessdata_prefix", &self.tessdata_prefix)
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("image_id_prefix", &self.image_id_prefix)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn HttpFetcher>"))
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("confirm", &self.confirm.as_ref().map(|_| "<dyn Confirm>"))
            .finish()
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_root = dir.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn tessdata_prefix(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tessdata_prefix = Some(dir.into());
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn image_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.image_id_prefix = prefix.into();
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn confirm(mut self, confirm: ConfirmHandle) -> Self {
        self.config.confirm = Some(confirm);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn SessionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, MangaTmxError> {
        let c = &self.config;
        if c.request_timeout_secs == 0 {
            return Err(MangaTmxError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(MangaTmxError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        if c.image_id_prefix.is_empty() {
            return Err(MangaTmxError::InvalidConfig(
                "Image id prefix must not be empty".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(MangaTmxError::InvalidConfig(
                "User agent must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
