//! Chapter identity: everything derived from the listing URL.
//!
//! The chapter id is taken from the second-to-last `/`-separated segment of
//! the URL with the literal `chapter-` token removed, so
//! `https://host/manga-x/chapter-445/` yields `445`. Every path the tool
//! touches (`chapter_445/`, `chapter_445/page_001.webp`, `chapter_445.tmx`)
//! is a pure function of that id and the configured output root.
//!
//! Page files carry a 3-digit zero-padded index so that a lexicographic sort
//! of a cached directory reproduces the download order.

use crate::error::MangaTmxError;
use std::path::{Path, PathBuf};

/// Token stripped from the URL segment to obtain the chapter id.
pub const CHAPTER_TOKEN: &str = "chapter-";

/// Extensions accepted when reloading a cached chapter directory.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Identity of one chapter run and the paths derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    id: String,
    image_dir: PathBuf,
    document_path: PathBuf,
}

impl Chapter {
    /// Derive the chapter from its listing URL, rooting all paths at `output_root`.
    pub fn from_url(url: &str, output_root: &Path) -> Result<Self, MangaTmxError> {
        let id = chapter_id(url)?;
        Ok(Self {
            image_dir: output_root.join(format!("chapter_{id}")),
            document_path: output_root.join(format!("chapter_{id}.tmx")),
            id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `chapter_<id>/` — exclusive storage root for this chapter's images.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// `chapter_<id>.tmx` — the exchange document.
    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Path of the `index`-th (1-based) downloaded page.
    pub fn page_path(&self, index: usize) -> PathBuf {
        self.image_dir.join(page_file_name(index))
    }
}

/// Derive the chapter id from a listing URL.
///
/// Pure string manipulation: no URL parsing, no I/O.
pub fn chapter_id(url: &str) -> Result<String, MangaTmxError> {
    let segments: Vec<&str> = url.split('/').collect();
    if segments.len() < 2 {
        return Err(MangaTmxError::InvalidChapterUrl {
            url: url.to_string(),
        });
    }

    let id = segments[segments.len() - 2].replace(CHAPTER_TOKEN, "");
    if id.is_empty() {
        return Err(MangaTmxError::InvalidChapterUrl {
            url: url.to_string(),
        });
    }
    Ok(id)
}

/// `page_<NNN>.webp` for a 1-based index.
pub fn page_file_name(index: usize) -> String {
    format!("page_{index:03}.webp")
}

/// True if the path has one of [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
