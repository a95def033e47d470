//! Pipeline stages and the collaborators they talk to.
//!
//! ## Data Flow
//!
//! ```text
//! listing URL ──▶ acquisition ──▶ extraction ──▶ tmx
//!                 (fetch+listing)  (decode+ocr)   (chapter_<id>.tmx)
//! ```
//!
//! 1. [`acquisition`] — reuse `chapter_<id>/` or download the page images
//!    found by [`listing`] through [`fetch`]
//! 2. [`extraction`]  — decode each page with [`decode`] and OCR it with [`ocr`]
//! 3. [`tmx`]         — serialise the `(image, text)` pairs
//!
//! Control only flows forward; no stage calls back into an earlier one.

pub mod acquisition;
pub mod decode;
pub mod extraction;
pub mod fetch;
pub mod listing;
pub mod ocr;
pub mod tmx;
