//! Offline integration tests for a full chapter session.
//!
//! HTTP and OCR are replaced by in-memory fakes so these run anywhere,
//! without network access or a Tesseract install. Page images are tiny PNGs
//! whose width tells the fake OCR engine what text to "recognise".

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use manga_tmx::{
    AcquisitionSource, FetchError, FetchResponse, FixedAnswer, HttpFetcher, MangaTmxError,
    OcrEngine, OcrError, PageError, Session, SessionConfig, SessionProgressCallback, Stage,
    WriteOutcome,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const CHAPTER_URL: &str = "https://example.com/manga-x/chapter-445/";

// ── Test helpers ─────────────────────────────────────────────────────────────

enum Reply {
    Ok(Vec<u8>),
    Status(u16),
    Timeout,
    Delayed(u64, Vec<u8>),
}

/// Serves canned replies by URL and counts every request.
struct FakeFetcher {
    replies: HashMap<String, Reply>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn new() -> Self {
        Self {
            replies: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn with(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(url) {
            Some(Reply::Ok(body)) => Ok(FetchResponse {
                status: 200,
                body: body.clone(),
            }),
            Some(Reply::Status(status)) => Ok(FetchResponse {
                status: *status,
                body: Vec::new(),
            }),
            Some(Reply::Timeout) => Err(FetchError::Timeout { secs: 60 }),
            Some(Reply::Delayed(ms, body)) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(FetchResponse {
                    status: 200,
                    body: body.clone(),
                })
            }
            None => Ok(FetchResponse {
                status: 404,
                body: Vec::new(),
            }),
        }
    }
}

/// Recognises `"text of page <width>"`, except width 99 which reads blank.
struct WidthOcr {
    languages: Vec<&'static str>,
}

impl WidthOcr {
    fn english() -> Self {
        Self {
            languages: vec!["eng", "osd"],
        }
    }
}

#[async_trait]
impl OcrEngine for WidthOcr {
    async fn supported_languages(&self) -> Result<Vec<String>, OcrError> {
        Ok(self.languages.iter().map(|s| s.to_string()).collect())
    }

    async fn recognize(&self, image: &DynamicImage, _language: &str) -> Result<String, OcrError> {
        match image.width() {
            99 => Ok("  \n\t ".into()),
            w => Ok(format!("text of page {w}\n")),
        }
    }
}

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl SessionProgressCallback for RecordingCallback {
    fn on_stage_start(&self, stage: Stage, total_items: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {stage:?} {total_items}"));
    }

    fn on_item_error(&self, stage: Stage, index: usize, _total: usize, _error: String) {
        self.events
            .lock()
            .unwrap()
            .push(format!("error {stage:?} {index}"));
    }

    fn on_stage_complete(&self, stage: Stage, total_items: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {stage:?} {success_count}/{total_items}"));
    }
}

fn png(width: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, 2, Rgba([0, 0, 0, 255])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn listing(count: usize) -> String {
    let imgs: String = (1..=count)
        .map(|i| format!(r#"<img id="image-{i}" src="https://cdn.example.com/445/{i}.webp">"#))
        .collect();
    format!(r#"<html><body><img id="logo" src="/logo.png">{imgs}</body></html>"#)
}

fn image_url(i: usize) -> String {
    format!("https://cdn.example.com/445/{i}.webp")
}

fn config(root: &Path, fetcher: Arc<FakeFetcher>, answer: bool) -> SessionConfig {
    SessionConfig::builder()
        .output_root(root)
        .fetcher(fetcher)
        .ocr_engine(Arc::new(WidthOcr::english()))
        .confirm(Arc::new(FixedAnswer(answer)))
        .concurrency(3)
        .build()
        .unwrap()
}

fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_chapter_downloads_ocrs_and_writes_tmx() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(3).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(11)))
            .with(&image_url(2), Reply::Ok(png(12)))
            .with(&image_url(3), Reply::Ok(png(13))),
    );

    let session = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher.clone(), true))
        .await
        .unwrap();
    assert_eq!(session.chapter_id(), "445");
    assert_eq!(session.output_directory(), tmp.path().join("chapter_445"));

    let report = session.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.source, AcquisitionSource::Download);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.images, 3);
    assert_eq!(report.extracted, 3);
    assert!(report.failures.is_empty());
    assert_eq!(fetcher.calls(), 4);
    assert_eq!(
        names(&tmp.path().join("chapter_445")),
        vec!["page_001.webp", "page_002.webp", "page_003.webp"]
    );

    let tmx_path = tmp.path().join("chapter_445.tmx");
    assert_eq!(
        report.document,
        WriteOutcome::Written {
            path: tmx_path.clone(),
            units: 3
        }
    );
    let xml = std::fs::read_to_string(&tmx_path).unwrap();
    assert!(xml.contains(r#"<tmx version="1.4">"#));
    assert!(xml.contains("srclang=\"eng\""));
    assert!(xml.contains("<note>Manga Chapter: 445</note>"));
    assert_eq!(xml.matches("<tu>").count(), 3);
    assert!(xml.contains("<seg>text of page 11</seg>"));
    let p1 = xml.find("Imagen fuente: page_001.webp").unwrap();
    let p3 = xml.find("Imagen fuente: page_003.webp").unwrap();
    assert!(p1 < p3);
}

#[tokio::test]
async fn failed_elements_leave_no_gaps_in_page_numbers() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(5).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(21)))
            .with(&image_url(2), Reply::Status(500))
            .with(&image_url(3), Reply::Ok(png(23)))
            .with(&image_url(4), Reply::Timeout)
            .with(&image_url(5), Reply::Ok(png(25))),
    );

    let mut session = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher, true))
        .await
        .unwrap();
    let images = session.acquire().await.unwrap().to_vec();

    assert_eq!(
        names(&tmp.path().join("chapter_445")),
        vec!["page_001.webp", "page_002.webp", "page_003.webp"]
    );
    assert_eq!(images.len(), 3);

    // page_002 holds element 3, page_003 holds element 5.
    let pairs = session.extract().await.to_vec();
    let texts: Vec<&str> = pairs.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["text of page 21", "text of page 23", "text of page 25"]);
}

#[tokio::test]
async fn failures_are_reported_per_element() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(5).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(21)))
            .with(&image_url(2), Reply::Status(500))
            .with(&image_url(3), Reply::Ok(png(23)))
            .with(&image_url(4), Reply::Timeout)
            .with(&image_url(5), Reply::Ok(png(25))),
    );
    let cb = Arc::new(RecordingCallback::default());
    let mut cfg = config(tmp.path(), fetcher, true);
    cfg.progress_callback = Some(cb.clone() as Arc<dyn SessionProgressCallback>);

    let report = Session::new(CHAPTER_URL, "eng", cfg)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.discovered, 5);
    assert_eq!(report.images, 3);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(
        report.failures[0],
        PageError::DownloadFailed { position: 2, .. }
    ));
    assert!(matches!(
        report.failures[1],
        PageError::DownloadTimeout { position: 4, .. }
    ));

    let events = cb.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start Acquisition 5",
            "error Acquisition 2",
            "error Acquisition 4",
            "done Acquisition 3/5",
            "start Extraction 3",
            "done Extraction 3/3",
        ]
    );
}

#[tokio::test]
async fn out_of_order_completion_keeps_discovery_order() {
    let tmp = TempDir::new().unwrap();
    // The first image is the slowest to arrive.
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(3).into_bytes()))
            .with(&image_url(1), Reply::Delayed(80, png(31)))
            .with(&image_url(2), Reply::Delayed(40, png(32)))
            .with(&image_url(3), Reply::Delayed(0, png(33))),
    );

    let mut session = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher, true))
        .await
        .unwrap();
    session.acquire().await.unwrap();
    let texts: Vec<String> = session
        .extract()
        .await
        .iter()
        .map(|p| p.text.clone())
        .collect();

    assert_eq!(texts, vec!["text of page 31", "text of page 32", "text of page 33"]);
}

#[tokio::test]
async fn cached_chapter_is_reused_without_network() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("chapter_445");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("page_002.webp"), png(42)).unwrap();
    std::fs::write(dir.join("page_001.webp"), png(41)).unwrap();
    std::fs::write(dir.join("notes.txt"), b"not a page").unwrap();

    let fetcher = Arc::new(FakeFetcher::new());
    let report = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher.clone(), false))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(report.source, AcquisitionSource::Cache);
    assert_eq!(report.images, 2);
    assert_eq!(report.extracted, 2);

    let xml = std::fs::read_to_string(tmp.path().join("chapter_445.tmx")).unwrap();
    let p1 = xml.find("text of page 41").unwrap();
    let p2 = xml.find("text of page 42").unwrap();
    assert!(p1 < p2);
    assert!(!xml.contains("notes.txt"));
}

#[tokio::test]
async fn confirmed_redownload_replaces_cached_pages() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("chapter_445");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("page_001.webp"), png(51)).unwrap();

    let fetcher = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(1).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(61))),
    );
    let report = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher.clone(), true))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(report.source, AcquisitionSource::Download);
    let xml = std::fs::read_to_string(tmp.path().join("chapter_445.tmx")).unwrap();
    assert!(xml.contains("text of page 61"));
    assert!(!xml.contains("text of page 51"));
}

#[tokio::test]
async fn blank_pages_produce_no_units() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(3).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(71)))
            .with(&image_url(2), Reply::Ok(png(99)))
            .with(&image_url(3), Reply::Ok(png(73))),
    );

    let report = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher, true))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.images, 3);
    assert_eq!(report.extracted, 2);
    assert_eq!(report.empty_pages, 1);
    let xml = std::fs::read_to_string(tmp.path().join("chapter_445.tmx")).unwrap();
    assert_eq!(xml.matches("<tu>").count(), 2);
    assert!(!xml.contains("page_002.webp"));
}

#[tokio::test]
async fn declined_overwrite_keeps_existing_document() {
    let tmp = TempDir::new().unwrap();
    let tmx_path = tmp.path().join("chapter_445.tmx");
    std::fs::write(&tmx_path, b"previous translation memory").unwrap();

    let fetcher = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(1).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(81))),
    );
    let report = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher, false))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.document, WriteOutcome::Declined { path: tmx_path.clone() });
    assert_eq!(std::fs::read(&tmx_path).unwrap(), b"previous translation memory");
    // Images were still downloaded; only the document was kept.
    assert_eq!(report.images, 1);
}

#[tokio::test]
async fn unavailable_language_fails_before_any_work() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(FakeFetcher::new().with(CHAPTER_URL, Reply::Ok(listing(1).into_bytes())));

    let err = Session::new(CHAPTER_URL, "jpn", config(tmp.path(), fetcher.clone(), true))
        .await
        .unwrap_err();

    match err {
        MangaTmxError::LanguageUnavailable { language, available } => {
            assert_eq!(language, "jpn");
            assert!(available.contains(&"eng".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fetcher.calls(), 0);
    assert!(!tmp.path().join("chapter_445").exists());
}

#[tokio::test]
async fn url_without_chapter_segment_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(FakeFetcher::new());

    let err = Session::new("chapter-1", "eng", config(tmp.path(), fetcher.clone(), true))
        .await
        .unwrap_err();

    assert!(matches!(err, MangaTmxError::InvalidChapterUrl { .. }));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn unreachable_listing_still_writes_an_empty_document() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(FakeFetcher::new().with(CHAPTER_URL, Reply::Status(404)));

    let report = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher.clone(), true))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(report.acquisition_error.as_deref().unwrap().contains("404"));
    assert_eq!(report.images, 0);
    assert_eq!(fetcher.calls(), 1);

    let xml = std::fs::read_to_string(tmp.path().join("chapter_445.tmx")).unwrap();
    assert!(xml.contains("<note>Manga Chapter: 445</note>"));
    assert_eq!(xml.matches("<tu>").count(), 0);
}

#[tokio::test]
async fn listing_timeout_is_reported_as_acquisition_error() {
    let tmp = TempDir::new().unwrap();
    let fetcher = Arc::new(FakeFetcher::new().with(CHAPTER_URL, Reply::Timeout));

    let mut session = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher, true))
        .await
        .unwrap();
    let err = session.acquire().await.unwrap_err();

    assert!(matches!(err, MangaTmxError::ListingTimeout { secs: 60, .. }));
    assert!(session.images().is_empty());
}

#[tokio::test]
async fn shorter_redownload_replaces_the_whole_cache() {
    let tmp = TempDir::new().unwrap();
    let full = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(5).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(21)))
            .with(&image_url(2), Reply::Ok(png(22)))
            .with(&image_url(3), Reply::Ok(png(23)))
            .with(&image_url(4), Reply::Ok(png(24)))
            .with(&image_url(5), Reply::Ok(png(25))),
    );
    let first = Session::new(CHAPTER_URL, "eng", config(tmp.path(), full, true))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.images, 5);

    // Redownload with element 2 failing: four pages this time.
    let partial = Arc::new(
        FakeFetcher::new()
            .with(CHAPTER_URL, Reply::Ok(listing(5).into_bytes()))
            .with(&image_url(1), Reply::Ok(png(21)))
            .with(&image_url(2), Reply::Status(500))
            .with(&image_url(3), Reply::Ok(png(23)))
            .with(&image_url(4), Reply::Ok(png(24)))
            .with(&image_url(5), Reply::Ok(png(25))),
    );
    let second = Session::new(CHAPTER_URL, "eng", config(tmp.path(), partial, true))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.source, AcquisitionSource::Download);
    assert_eq!(second.images, 4);
    assert_eq!(
        names(&tmp.path().join("chapter_445")),
        vec!["page_001.webp", "page_002.webp", "page_003.webp", "page_004.webp"]
    );

    // Declining now must reproduce exactly the second download.
    let offline = Arc::new(FakeFetcher::new());
    let mut session = Session::new(CHAPTER_URL, "eng", config(tmp.path(), offline.clone(), false))
        .await
        .unwrap();
    session.acquire().await.unwrap();
    let texts: Vec<String> = session
        .extract()
        .await
        .iter()
        .map(|p| p.text.clone())
        .collect();

    assert_eq!(offline.calls(), 0);
    assert_eq!(
        texts,
        vec!["text of page 21", "text of page 23", "text of page 24", "text of page 25"]
    );
}

#[tokio::test]
async fn failed_listing_keeps_cached_pages() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("chapter_445");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("page_001.webp"), png(41)).unwrap();

    let fetcher = Arc::new(FakeFetcher::new().with(CHAPTER_URL, Reply::Status(503)));
    let mut session = Session::new(CHAPTER_URL, "eng", config(tmp.path(), fetcher, true))
        .await
        .unwrap();
    assert!(session.acquire().await.is_err());

    assert_eq!(names(&dir), vec!["page_001.webp"]);
}
