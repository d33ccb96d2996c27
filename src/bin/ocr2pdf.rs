//! CLI binary for ocr2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr2pdf::pipeline::ocr::default_command;
use ocr2pdf::{
    convert, inspect, list_languages, ConversionConfig, ConversionProgressCallback,
    ConversionReport, ImageEncoding, OcrPdfError, PageFailure, ProgressCallback, TesseractEngine,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Exit status when every page made it into the PDF.
const EXIT_COMPLETE: u8 = 0;
/// Exit status when the PDF was written but some pages failed.
const EXIT_PARTIAL: u8 = 2;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Works when pages complete out of order (`--concurrency > 1`).
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times, keyed by sequence number.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose bar length is set by `on_conversion_start`,
    /// once every input has been opened and its pages counted.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Counting pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, seq: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&seq))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting OCR of {total_pages} pages…"))
        ));
    }

    fn on_item_error(&self, item: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            item.display(),
            red(&truncate(error, 80))
        ));
    }

    fn on_page_start(&self, seq: usize, _total: usize, label: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(seq, Instant::now());
        }
        self.bar.set_message(label.to_string());
    }

    fn on_page_complete(&self, seq: usize, total: usize, label: &str, word_count: usize) {
        let elapsed = self.elapsed_secs(seq);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<24}  {}  {}",
            green("✓"),
            seq,
            total,
            label,
            dim(&format!("{word_count:>5} words")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, seq: usize, total: usize, label: &str, error: &str) {
        let elapsed = self.elapsed_secs(seq);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<24}  {}  {}",
            red("✗"),
            seq,
            total,
            label,
            red(&truncate(error, 80)),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 && self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {} pages recognised",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages recognised  ({} failed)",
                if success_count == 0 {
                    red("✘")
                } else {
                    yellow("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One scan to a searchable PDF
  ocr2pdf scan.png scan.pdf

  # A folder of scans and PDFs into one document (".pdf" is appended)
  ocr2pdf ./scans ./archive/scans

  # German text, higher resolution, skip shaky words
  ocr2pdf --lang deu --dpi 400 --min-confidence 40 brief.pdf brief-ocr.pdf

  # Several pages at once, retry flaky OCR runs
  ocr2pdf --concurrency 4 --max-retries 2 ./inbox out.pdf

  # Show what would be converted
  ocr2pdf --inspect-only ./scans

  # Installed OCR languages
  ocr2pdf --list-langs

EXIT STATUS:
  0  every page converted
  2  output written, some pages or files failed (listed on stderr)
  1  nothing written (bad input/output path, every page failed, ...)

ENVIRONMENT VARIABLES:
  TESSERACT_CMD     Path to the tesseract executable
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory); needed for PDF inputs
  RUST_LOG          Override log filter (e.g. ocr2pdf=debug)
  OCR2PDF_*         Every flag, e.g. OCR2PDF_DPI=400 OCR2PDF_LANG=eng+deu
"#;

/// Convert images and scanned PDFs into searchable PDFs with Tesseract OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2pdf",
    version,
    about = "Convert images and scanned PDFs into searchable PDFs",
    long_about = "Convert images (PNG, JPEG, TIFF) and scanned PDFs into a single searchable PDF. \
Each page keeps its original look and gains an invisible text layer recognised by Tesseract OCR.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file or directory.
    #[arg(required_unless_present = "list_langs")]
    input: Option<PathBuf>,

    /// Output PDF file.
    #[arg(required_unless_present_any = ["list_langs", "inspect_only"])]
    output: Option<PathBuf>,

    /// Rendering DPI for PDF pages and assumed scan resolution of images (72–600).
    #[arg(long, env = "OCR2PDF_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(short, long, env = "OCR2PDF_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "OCR2PDF_PSM", default_value_t = 6,
          value_parser = clap::value_parser!(u32).range(0..=13))]
    psm: u32,

    /// Tesseract OCR engine mode (0–3).
    #[arg(long, env = "OCR2PDF_OEM", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(0..=3))]
    oem: u32,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_CMD")]
    tesseract: Option<PathBuf>,

    /// Feed colour pages to OCR as-is instead of converting to grayscale.
    #[arg(long, env = "OCR2PDF_NO_GRAYSCALE")]
    no_grayscale: bool,

    /// Leave words below this confidence (0–100) out of the text layer.
    #[arg(long, env = "OCR2PDF_MIN_CONFIDENCE", default_value_t = 0.0,
          value_parser = parse_confidence)]
    min_confidence: f32,

    /// JPEG quality of embedded page images (1–100).
    #[arg(long, env = "OCR2PDF_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100),
          conflicts_with = "lossless")]
    jpeg_quality: u8,

    /// Embed page images losslessly instead of as JPEG.
    #[arg(long, env = "OCR2PDF_LOSSLESS")]
    lossless: bool,

    /// Do not Flate-compress PDF streams.
    #[arg(long, env = "OCR2PDF_NO_COMPRESS")]
    no_compress: bool,

    /// Password for encrypted PDF inputs.
    #[arg(long, env = "OCR2PDF_PASSWORD")]
    password: Option<String>,

    /// Walk subdirectories of an input directory.
    #[arg(short, long, env = "OCR2PDF_RECURSIVE")]
    recursive: bool,

    /// Pages processed at the same time.
    #[arg(short, long, env = "OCR2PDF_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// OCR retries per page.
    #[arg(long, env = "OCR2PDF_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Print the conversion report (or inspect result) as JSON on stdout.
    #[arg(long, env = "OCR2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// List inputs and page counts only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// List installed Tesseract languages and exit.
    #[arg(long)]
    list_langs: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only && !cli.list_langs;
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

    // ── List-languages mode ──────────────────────────────────────────────
    if cli.list_langs {
        let command = cli.tesseract.clone().unwrap_or_else(default_command);
        let engine = TesseractEngine::new(command, cli.psm, cli.oem, !cli.no_grayscale);
        let version = engine.version().context("Failed to query the OCR engine")?;
        if !cli.quiet {
            eprintln!("{}", dim(&format!("{version} ({})", engine.command().display())));
        }
        let langs = list_languages(engine.command()).context("Failed to list OCR languages")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&langs).context("Failed to serialize languages")?
            );
        } else {
            for lang in langs {
                println!("{lang}");
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let input = cli
        .input
        .clone()
        .context("An input file or directory is required")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None)?;
        let summaries = inspect(&input, &config)
            .await
            .context("Failed to inspect input")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summaries).context("Failed to serialize summary")?
            );
        } else {
            let mut total = 0usize;
            for s in &summaries {
                match s.page_count {
                    Some(n) => {
                        total += n;
                        println!("{:>5}  {:<6} {}", n, format!("{:?}", s.kind), s.path.display());
                    }
                    None => println!(
                        "{:>5}  {:<6} {}  {}",
                        "?",
                        format!("{:?}", s.kind),
                        s.path.display(),
                        red(s.error.as_deref().unwrap_or("unreadable"))
                    ),
                }
            }
            println!("{} file(s), {} page(s)", summaries.len(), total);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let output = cli
        .output
        .clone()
        .context("An output PDF path is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let report = match convert(&input, &output, &config).await {
        Ok(report) => report,
        Err(e) => {
            if let OcrPdfError::NoPagesProcessed { ref failures } = e {
                print_failures(failures);
            }
            return Err(e).context("Conversion failed");
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    }

    print_failures(&report.failures);
    if !cli.quiet {
        print_summary(&report);
    }

    Ok(ExitCode::from(exit_status(&report)))
}

/// `0` when every page made it into the output, `2` for a partial result.
/// Fatal errors never get here: `main` returns `Err` and the process exits 1.
fn exit_status(report: &ConversionReport) -> u8 {
    if report.is_complete() {
        EXIT_COMPLETE
    } else {
        EXIT_PARTIAL
    }
}

/// Parse `--min-confidence`, rejecting NaN, infinities and values outside 0–100.
fn parse_confidence(s: &str) -> std::result::Result<f32, String> {
    let v: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if !v.is_finite() || !(0.0..=100.0).contains(&v) {
        return Err(format!("must be a number from 0 to 100, got {s}"));
    }
    Ok(v)
}

fn print_summary(report: &ConversionReport) {
    let stats = &report.stats;
    eprintln!(
        "{}  {}/{} pages  {} words  {}ms  →  {}",
        if report.is_complete() {
            green("✔")
        } else {
            yellow("⚠")
        },
        stats.processed_pages,
        stats.total_pages,
        stats.total_words,
        stats.total_duration_ms,
        bold(&report.output_path.display().to_string()),
    );
}

/// Every failed (item, page), one per line, on stderr.
fn print_failures(failures: &[PageFailure]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("{}", red(&format!("{} failure(s):", failures.len())));
    for f in failures {
        let page = f
            .page
            .map(|p| format!("page {p}"))
            .unwrap_or_else(|| "file".to_string());
        eprintln!("  {} {} ({}): {}", red("✗"), f.item.display(), page, f.error);
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let image_encoding = if cli.lossless {
        ImageEncoding::Lossless
    } else {
        ImageEncoding::Jpeg {
            quality: cli.jpeg_quality,
        }
    };

    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .language(cli.lang.clone())
        .psm(cli.psm)
        .oem(cli.oem)
        .grayscale(!cli.no_grayscale)
        .min_confidence(cli.min_confidence)
        .image_encoding(image_encoding)
        .compress(!cli.no_compress)
        .recursive(cli.recursive)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries);

    if let Some(ref cmd) = cli.tesseract {
        builder = builder.tesseract_cmd(cmd.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr2pdf::report::ConversionStats;
    use ocr2pdf::PageError;

    fn report(failures: Vec<PageFailure>) -> ConversionReport {
        ConversionReport {
            output_path: PathBuf::from("out.pdf"),
            items: vec![],
            failures,
            stats: ConversionStats::default(),
        }
    }

    #[test]
    fn complete_run_exits_zero() {
        assert_eq!(exit_status(&report(vec![])), 0);
    }

    #[test]
    fn partial_run_exits_two() {
        let failure = PageFailure {
            item: PathBuf::from("scan.pdf"),
            page: Some(2),
            error: PageError::OcrFailed {
                page: 2,
                attempts: 1,
                detail: "tesseract exited with status 1".into(),
            },
        };
        assert_eq!(exit_status(&report(vec![failure])), 2);
    }

    #[test]
    fn confidence_flag_is_bounded() {
        assert_eq!(parse_confidence("40").unwrap(), 40.0);
        assert_eq!(parse_confidence("0").unwrap(), 0.0);
        for bad in ["NaN", "inf", "-1", "100.5", "high"] {
            assert!(parse_confidence(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn cli_rejects_nan_confidence() {
        let res = Cli::try_parse_from(["ocr2pdf", "--min-confidence", "NaN", "in.png", "out.pdf"]);
        assert!(res.is_err());
    }
}
