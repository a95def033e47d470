//! CLI binary for manga-tmx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `SessionConfig`, asks for whatever is missing and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use manga_tmx::{
    list_languages, probe_image, AcquisitionSource, Confirm, ConfirmHandle, FixedAnswer,
    ProgressCallback, RunReport, Session, SessionConfig, SessionProgressCallback, Stage,
    TerminalConfirm, WriteOutcome,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar reused for both stages, plus a log
/// line per page printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until the first stage reports its item count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking chapter…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, stage: Stage, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(stage.to_string());
        self.bar.reset_eta();
        self.bar.reset_elapsed();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SessionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total_items: usize) {
        self.activate_bar(stage, total_items);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{stage} {total_items} pages…"))
        ));
    }

    fn on_item_complete(&self, _stage: Stage, index: usize, total: usize, detail: String) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            dim(&detail),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, _stage: Stage, index: usize, total: usize, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage, total_items: usize, success_count: usize) {
        let failed = total_items.saturating_sub(success_count);
        let line = if failed == 0 {
            format!(
                "{} {stage}: {} pages done",
                green("✔"),
                bold(&success_count.to_string())
            )
        } else {
            format!(
                "{} {stage}: {}/{} pages done  ({} failed)",
                if failed == total_items {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_items,
                red(&failed.to_string()),
            )
        };
        self.bar.println(line);
        self.bar.set_prefix("Working");
    }
}

/// Terminal prompt that hides the progress bar while waiting for an answer.
struct BarAwareConfirm {
    bar: Option<ProgressBar>,
}

impl Confirm for BarAwareConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        match self.bar {
            Some(ref bar) => bar.suspend(|| TerminalConfirm.confirm(prompt)),
            None => TerminalConfirm.confirm(prompt),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive: asks for the URL and the language
  manga2tmx

  # Fully specified
  manga2tmx https://example.com/manga-x/chapter-445/ --lang eng

  # Write under another directory, never redownload or overwrite
  manga2tmx https://example.com/manga-x/chapter-445/ -l jpn -o ~/manga --no

  # Several language packs at once
  manga2tmx https://example.com/manga-x/chapter-12/ -l jpn+eng --yes

  # Check the Tesseract install
  manga2tmx --list-langs
  manga2tmx --probe page_001.webp -l eng

  # Machine-readable run summary
  manga2tmx https://example.com/manga-x/chapter-445/ -l eng --yes --json

OUTPUT:
  chapter_<id>/page_NNN.webp   downloaded page images (reused on later runs)
  chapter_<id>.tmx             TMX 1.4 document, one unit per page with text

ENVIRONMENT VARIABLES:
  TESSERACT_CMD        Path to the tesseract binary
  TESSDATA_PREFIX      Directory holding the *.traineddata language packs
  MANGA2TMX_LANG       Default OCR language
  MANGA2TMX_OUTPUT     Default output directory
"#;

/// Language codes offered when `--lang` is not given.
const LANGUAGE_CHOICES: &[(&str, &str)] = &[
    ("eng", "English"),
    ("jpn", "Japanese"),
    ("chi_sim", "Chinese (simplified)"),
];

/// OCR a manga chapter into a TMX translation memory.
#[derive(Parser, Debug)]
#[command(
    name = "manga2tmx",
    version,
    about = "Download a manga chapter, OCR its pages and save the text as TMX",
    long_about = "Download the page images of a manga chapter (or reuse a previous download), \
run Tesseract OCR over every page and write the recognised text to chapter_<id>.tmx, one \
translation unit per page.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Chapter listing URL, e.g. https://example.com/manga-x/chapter-445/. Asked for if omitted.
    url: Option<String>,

    /// Tesseract language code (eng, jpn, chi_sim, jpn+eng). Asked for if omitted.
    #[arg(short, long, env = "MANGA2TMX_LANG")]
    lang: Option<String>,

    /// Directory for chapter_<id>/ and chapter_<id>.tmx.
    #[arg(short, long, env = "MANGA2TMX_OUTPUT", default_value = ".")]
    output_dir: PathBuf,

    /// Tesseract binary.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// Tesseract language-data directory.
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata_prefix: Option<PathBuf>,

    /// Concurrent downloads / OCR processes.
    #[arg(short, long, env = "MANGA2TMX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "MANGA2TMX_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "MANGA2TMX_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// User-Agent header for all requests.
    #[arg(long, env = "MANGA2TMX_USER_AGENT")]
    user_agent: Option<String>,

    /// Answer "yes" to every question (redownload, overwrite).
    #[arg(short, long, conflicts_with = "no")]
    yes: bool,

    /// Answer "no" to every question (reuse images, keep existing TMX).
    #[arg(long)]
    no: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "MANGA2TMX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MANGA2TMX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MANGA2TMX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MANGA2TMX_QUIET")]
    quiet: bool,

    /// List installed Tesseract languages and exit.
    #[arg(long)]
    list_langs: bool,

    /// OCR a single image file and exit.
    #[arg(long, value_name = "IMAGE")]
    probe: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the user-facing feedback, so INFO logs are
    // muted while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Installation checks ──────────────────────────────────────────────
    if cli.list_langs {
        let config = build_config(&cli, None, None)?;
        let languages = list_languages(&config)
            .await
            .context("Failed to query Tesseract")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&languages)?);
        } else {
            for lang in languages {
                println!("{lang}");
            }
        }
        return Ok(());
    }

    if let Some(ref image) = cli.probe {
        let config = build_config(&cli, None, None)?;
        let language = match cli.lang {
            Some(ref l) => l.clone(),
            None => prompt_language()?,
        };
        let report = probe_image(image, &language, &config)
            .await
            .with_context(|| format!("Failed to probe {}", image.display()))?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("File:    {}", report.file.display());
            println!(
                "Format:  {}",
                report.format.as_deref().unwrap_or("unknown")
            );
            println!("Size:    {}x{}", report.width, report.height);
            println!("Color:   {}", report.color);
            println!("Text:");
            println!("{}", report.text.trim_end());
        }
        return Ok(());
    }

    // ── Inputs ───────────────────────────────────────────────────────────
    let url = match cli.url {
        Some(ref u) => u.clone(),
        None => prompt_line("Chapter URL: ")?,
    };
    let language = match cli.lang {
        Some(ref l) => l.clone(),
        None => prompt_language()?,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new_dynamic())
    } else {
        None
    };
    let confirm: ConfirmHandle = if cli.yes {
        Arc::new(FixedAnswer(true))
    } else if cli.no {
        Arc::new(FixedAnswer(false))
    } else {
        Arc::new(BarAwareConfirm {
            bar: progress.as_ref().map(|p| p.bar.clone()),
        })
    };
    let progress_cb: Option<ProgressCallback> = progress
        .clone()
        .map(|p| p as Arc<dyn SessionProgressCallback>);

    let config = build_config(&cli, progress_cb, Some(confirm))?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = async {
        let session = Session::new(&url, &language, config).await?;
        session.run().await
    }
    .await;

    if let Some(ref p) = progress {
        p.finish();
    }
    let report = result.context("Chapter run failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report);
    }

    if let Some(ref reason) = report.acquisition_error {
        anyhow::bail!("Could not acquire chapter images: {reason}");
    }
    Ok(())
}

/// Map CLI args to `SessionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    confirm: Option<ConfirmHandle>,
) -> Result<SessionConfig> {
    let mut builder = SessionConfig::builder()
        .output_root(&cli.output_dir)
        .tesseract_cmd(&cli.tesseract_cmd)
        .concurrency(cli.concurrency)
        .request_timeout_secs(cli.timeout)
        .ocr_timeout_secs(cli.ocr_timeout);

    if let Some(ref dir) = cli.tessdata_prefix {
        builder = builder.tessdata_prefix(dir);
    }
    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    if let Some(c) = confirm {
        builder = builder.confirm(c);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &RunReport) {
    let source = match report.source {
        AcquisitionSource::Cache => "reused from disk".to_string(),
        AcquisitionSource::Download => format!("{} found on the page", report.discovered),
        AcquisitionSource::None => "none".to_string(),
    };
    eprintln!(
        "{}  chapter {}  {} images ({})  {} with text  {} blank",
        if report.failures.is_empty() && report.is_success() {
            green("✔")
        } else {
            cyan("⚠")
        },
        bold(&report.chapter_id),
        report.images,
        dim(&source),
        report.extracted,
        report.empty_pages,
    );
    for failure in &report.failures {
        eprintln!("   {} {}", red("✗"), failure);
    }
    match report.document {
        WriteOutcome::Written { ref path, units } => eprintln!(
            "   {} units  →  {}  {}",
            units,
            bold(&path.display().to_string()),
            dim(&format!("{}ms", report.total_duration_ms)),
        ),
        WriteOutcome::Declined { ref path } => eprintln!(
            "   {} kept existing {}",
            dim("–"),
            bold(&path.display().to_string()),
        ),
    }
}

// ── Interactive input ────────────────────────────────────────────────────────

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        anyhow::bail!("No input (stdin closed)");
    }
    let value = line.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("Empty answer");
    }
    Ok(value)
}

/// Offer the common languages by number; any other answer is taken as a code.
fn prompt_language() -> Result<String> {
    eprintln!("OCR language:");
    for (i, (code, name)) in LANGUAGE_CHOICES.iter().enumerate() {
        eprintln!("  {}. {name} ({code})", i + 1);
    }
    let answer = prompt_line("Choice or language code: ")?;
    Ok(resolve_language_choice(&answer))
}

fn resolve_language_choice(answer: &str) -> String {
    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| LANGUAGE_CHOICES.get(i))
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| answer.to_string())
}
