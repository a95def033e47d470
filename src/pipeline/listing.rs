//! Listing-page parsing: HTML → ordered page-image sources.
//!
//! A page image is an `<img>` whose `id` starts with the configured prefix
//! (`image-` by default). Document order is page order. Sites lazy-load their
//! pages, so `data-src` is preferred over `src`; an element with neither is
//! reported as missing rather than silently dropped.

use reqwest::Url;
use scraper::{Html, Selector};
use tracing::debug;

/// One page-image element found on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// 1-based position among matching elements, in document order.
    pub position: usize,
    /// Resolved absolute URL, or `None` if the element had no usable source.
    pub url: Option<String>,
}

/// Find every page-image element and resolve its source URL.
///
/// Relative sources are resolved against `base_url`; if that fails the raw
/// attribute value is kept.
pub fn extract_image_sources(html: &str, id_prefix: &str, base_url: &str) -> Vec<ImageSource> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("img[id]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let base = Url::parse(base_url).ok();

    let sources: Vec<ImageSource> = document
        .select(&selector)
        .filter(|el| {
            el.value()
                .attr("id")
                .is_some_and(|id| id.starts_with(id_prefix))
        })
        .enumerate()
        .map(|(i, el)| {
            let raw = non_empty(el.value().attr("data-src"))
                .or_else(|| non_empty(el.value().attr("src")));
            ImageSource {
                position: i + 1,
                url: raw.map(|r| resolve(base.as_ref(), r)),
            }
        })
        .collect();

    debug!(
        "Found {} image elements with id prefix '{}'",
        sources.len(),
        id_prefix
    );
    sources
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn resolve(base: Option<&Url>, raw: &str) -> String {
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    base.and_then(|b| b.join(raw).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| raw.to_string())
}
