//! OCR capability and its Tesseract implementation.
//!
//! The engine is driven as a child process (`tesseract stdin stdout -l <lang>`)
//! so no native library has to be linked. The binary location and the
//! `TESSDATA_PREFIX` come from [`crate::config::SessionConfig`] and are set on
//! each child only; the parent environment is never modified.

use crate::config::SessionConfig;
use crate::error::OcrError;
use crate::pipeline::decode::encode_png;
use async_trait::async_trait;
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Text recognition over a decoded image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Language packs the engine can use, e.g. `["eng", "jpn", "osd"]`.
    async fn supported_languages(&self) -> Result<Vec<String>, OcrError>;

    /// Raw recognised text. Callers trim.
    async fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, OcrError>;
}

/// [`OcrEngine`] that shells out to the `tesseract` CLI.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    cmd: PathBuf,
    tessdata_prefix: Option<PathBuf>,
    timeout_secs: u64,
}

impl TesseractEngine {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cmd: config.tesseract_cmd.clone(),
            tessdata_prefix: config.tessdata_prefix.clone(),
            timeout_secs: config.ocr_timeout_secs,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cmd);
        if let Some(ref prefix) = self.tessdata_prefix {
            cmd.env("TESSDATA_PREFIX", prefix);
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> OcrError {
        OcrError::Spawn {
            cmd: self.cmd.display().to_string(),
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn supported_languages(&self) -> Result<Vec<String>, OcrError> {
        let mut cmd = self.command();
        cmd.arg("--list-langs").stdin(Stdio::null());

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| OcrError::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(OcrError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        // Tesseract 3.x prints the list on stderr.
        let mut langs = parse_language_list(&String::from_utf8_lossy(&output.stdout));
        if langs.is_empty() {
            langs = parse_language_list(&String::from_utf8_lossy(&output.stderr));
        }
        debug!("Tesseract languages: {:?}", langs);
        Ok(langs)
    }

    async fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, OcrError> {
        let png = encode_png(image).map_err(|e| OcrError::Encode(e.to_string()))?;

        let mut cmd = self.command();
        cmd.args(["stdin", "stdout", "-l", language])
            .stdin(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Failed("child stdin unavailable".into()))?;
        let feed = async move {
            let result = stdin.write_all(&png).await;
            drop(stdin);
            result
        };

        let run = async { tokio::join!(feed, child.wait_with_output()) };
        let (fed, output) = tokio::time::timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| OcrError::Timeout {
                secs: self.timeout_secs,
            })?;

        let output = output.map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(OcrError::Failed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        fed.map_err(|e| OcrError::Failed(format!("writing image to tesseract: {e}")))?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse `tesseract --list-langs` output.
pub fn parse_language_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}
