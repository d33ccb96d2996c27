//! OCR: recognise the words on a page raster.
//!
//! The native engine shells out to the `tesseract` executable and asks for
//! TSV output, which carries one row per word with its pixel bounding box
//! and confidence. Positions are what the compositor needs to lay the
//! invisible text over the right spot of the image, so plain-text output is
//! not enough.
//!
//! ## TSV layout
//!
//! ```text
//! level page_num block_num par_num line_num word_num left top width height conf text
//! ```
//!
//! Only level-5 rows are words. Rows with `conf = -1` are structural
//! (page/block/line) and carry no text.

use crate::config::ConversionConfig;
use crate::error::{OcrPdfError, PageError};
use crate::pipeline::encode::encode_png;
use crate::pipeline::render::PageRaster;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Standard install location of the Windows Tesseract installer.
const WINDOWS_TESSERACT: &str = r"C:\Program Files\Tesseract-OCR\tesseract.exe";

/// TSV level of a single word.
const WORD_LEVEL: u32 = 5;

/// Pixel rectangle in raster coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One recognised word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BBox,
    /// 0–100.
    pub confidence: f32,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
}

/// Everything the engine found on one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Reading-order text, one line per OCR line, blank line between blocks.
    pub text: String,
    pub words: Vec<OcrWord>,
}

impl OcrResult {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Recognises text on a page raster.
///
/// Implementations are blocking; the pipeline calls them from
/// `spawn_blocking`. A page without any text is a success with an empty
/// result, not an error.
pub trait OcrEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run OCR on `raster` using the Tesseract-style `language` code
    /// (`eng`, `eng+deu`, ...).
    fn recognize(&self, raster: &PageRaster, language: &str) -> Result<OcrResult, PageError>;
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// OCR engine backed by the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
    psm: u32,
    oem: u32,
    grayscale: bool,
}

impl TesseractEngine {
    pub fn new(command: impl Into<PathBuf>, psm: u32, oem: u32, grayscale: bool) -> Self {
        Self {
            command: command.into(),
            psm,
            oem,
            grayscale,
        }
    }

    /// Engine configured from the conversion options.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let command = config
            .tesseract_cmd
            .clone()
            .unwrap_or_else(default_command);
        Self::new(command, config.psm, config.oem, config.grayscale)
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// First line of `tesseract --version`, e.g. `tesseract 5.3.4`.
    pub fn version(&self) -> Result<String, OcrPdfError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .map_err(|e| unavailable(&self.command, spawn_detail(&e)))?;
        if !output.status.success() {
            return Err(unavailable(
                &self.command,
                format!("--version exited with {}", output.status),
            ));
        }
        // Older releases print the banner on stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    fn run_tsv(&self, png: &Path, language: &str, dpi: u32) -> Result<String, String> {
        let output = Command::new(&self.command)
            .arg(png)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("--oem")
            .arg(self.oem.to_string())
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("--dpi")
            .arg(dpi.to_string())
            .arg("tsv")
            .output()
            .map_err(|e| spawn_detail(&e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, raster: &PageRaster, language: &str) -> Result<OcrResult, PageError> {
        let page = raster.page_index + 1;
        let fail = |detail: String| PageError::OcrFailed {
            page,
            attempts: 1,
            detail,
        };

        let png = if self.grayscale {
            encode_png(&DynamicImage::ImageLuma8(raster.image.to_luma8()))
        } else {
            encode_png(&raster.image)
        }
        .map_err(|e| fail(format!("cannot encode raster: {e}")))?;

        let scratch = tempfile::tempdir().map_err(|e| fail(format!("temp dir: {e}")))?;
        let png_path = scratch.path().join("page.png");
        std::fs::write(&png_path, &png).map_err(|e| fail(format!("temp file: {e}")))?;

        let dpi = raster.dpi.round().max(1.0) as u32;
        let tsv = self.run_tsv(&png_path, language, dpi).map_err(fail)?;
        let result = parse_tsv(&tsv).map_err(fail)?;

        debug!(
            "Page {}: tesseract found {} words ({} chars)",
            page,
            result.words.len(),
            result.text.len()
        );
        Ok(result)
    }
}

/// The executable used when none is configured.
pub fn default_command() -> PathBuf {
    if cfg!(windows) && Path::new(WINDOWS_TESSERACT).is_file() {
        PathBuf::from(WINDOWS_TESSERACT)
    } else {
        PathBuf::from("tesseract")
    }
}

/// Languages installed for the given `tesseract` executable.
pub fn list_languages(command: &Path) -> Result<Vec<String>, OcrPdfError> {
    let output = Command::new(command)
        .arg("--list-langs")
        .output()
        .map_err(|e| unavailable(command, spawn_detail(&e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(unavailable(
            command,
            format!("--list-langs failed: {}", stderr.trim()),
        ));
    }

    // First line is the "List of available languages ..." banner.
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn unavailable(command: &Path, detail: String) -> OcrPdfError {
    OcrPdfError::EngineUnavailable {
        command: command.display().to_string(),
        detail,
    }
}

fn spawn_detail(e: &std::io::Error) -> String {
    if e.kind() == std::io::ErrorKind::NotFound {
        "executable not found (install tesseract or set TESSERACT_CMD)".to_string()
    } else {
        format!("cannot start process: {e}")
    }
}

// ── TSV parsing ──────────────────────────────────────────────────────────

/// Parse Tesseract TSV output into words and reading-order text.
pub fn parse_tsv(tsv: &str) -> Result<OcrResult, String> {
    let mut lines = tsv.lines();
    match lines.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => return Err(format!("unexpected TSV header: '{}'", other.trim())),
        None => return Err("empty TSV output".to_string()),
    }

    let mut words = Vec::new();
    for (n, row) in lines.enumerate() {
        if row.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 11 {
            return Err(format!("TSV row {} has {} columns", n + 2, cols.len()));
        }
        let num = |i: usize| -> Result<u32, String> {
            cols[i]
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("TSV row {}: bad number '{}'", n + 2, cols[i]))
        };

        if num(0)? != WORD_LEVEL {
            continue;
        }
        let confidence: f32 = cols[10]
            .trim()
            .parse()
            .map_err(|_| format!("TSV row {}: bad confidence '{}'", n + 2, cols[10]))?;
        let text = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if confidence < 0.0 || text.is_empty() {
            continue;
        }

        words.push(OcrWord {
            text: text.to_string(),
            bbox: BBox {
                x: num(6)?,
                y: num(7)?,
                w: num(8)?,
                h: num(9)?,
            },
            confidence,
            block: num(2)?,
            paragraph: num(3)?,
            line: num(4)?,
        });
    }

    let text = words_to_text(&words);
    Ok(OcrResult { text, words })
}

fn words_to_text(words: &[OcrWord]) -> String {
    let mut out = String::new();
    let mut current: Option<(u32, u32, u32)> = None;

    for w in words {
        let key = (w.block, w.paragraph, w.line);
        match current {
            Some(prev) if prev == key => out.push(' '),
            Some((block, _, _)) => {
                out.push('\n');
                if block != w.block {
                    out.push('\n');
                }
            }
            None => {}
        }
        out.push_str(&w.text);
        current = Some(key);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s.push('\n');
        s
    }

    #[test]
    fn parses_words_and_skips_structure_rows() {
        let input = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t2480\t3508\t-1\t",
            "2\t1\t1\t0\t0\t0\t100\t200\t800\t60\t-1\t",
            "4\t1\t1\t1\t1\t0\t100\t200\t800\t60\t-1\t",
            "5\t1\t1\t1\t1\t1\t100\t200\t300\t60\t96.5\tHello",
            "5\t1\t1\t1\t1\t2\t420\t200\t480\t60\t91\tworld",
        ]);
        let r = parse_tsv(&input).unwrap();
        assert_eq!(r.words.len(), 2);
        assert_eq!(r.text, "Hello world");
        assert_eq!(
            r.words[0].bbox,
            BBox {
                x: 100,
                y: 200,
                w: 300,
                h: 60
            }
        );
        assert!((r.words[0].confidence - 96.5).abs() < f32::EPSILON);
    }

    #[test]
    fn lines_and_blocks_are_separated() {
        let input = tsv(&[
            "5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\tfirst",
            "5\t1\t1\t1\t2\t1\t0\t20\t10\t10\t90\tsecond",
            "5\t1\t2\t1\t1\t1\t0\t80\t10\t10\t90\tthird",
        ]);
        let r = parse_tsv(&input).unwrap();
        assert_eq!(r.text, "first\nsecond\n\nthird");
    }

    #[test]
    fn blank_page_is_empty_success() {
        let input = tsv(&["1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t"]);
        let r = parse_tsv(&input).unwrap();
        assert!(r.words.is_empty());
        assert!(r.text.is_empty());
    }

    #[test]
    fn whitespace_only_words_are_dropped() {
        let input = tsv(&["5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t95\t "]);
        assert!(parse_tsv(&input).unwrap().words.is_empty());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_tsv("").is_err());
        assert!(parse_tsv("Error opening data file").is_err());
        assert!(parse_tsv(&tsv(&["5\t1\t1"])).is_err());
        assert!(parse_tsv(&tsv(&["5\t1\t1\t1\t1\t1\tx\t0\t10\t10\t95\tword"])).is_err());
    }

    #[test]
    fn missing_executable_is_engine_unavailable() {
        let err = list_languages(Path::new("/nonexistent/tesseract-binary")).unwrap_err();
        assert!(matches!(err, OcrPdfError::EngineUnavailable { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn missing_executable_has_no_version() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary", 6, 3, true);
        assert_eq!(engine.command(), Path::new("/nonexistent/tesseract-binary"));
        let err = engine.version().unwrap_err();
        assert!(matches!(err, OcrPdfError::EngineUnavailable { .. }));
    }

    #[test]
    fn missing_executable_fails_recognition() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary", 6, 3, true);
        let raster = PageRaster {
            image: DynamicImage::new_luma8(8, 8),
            dpi: 300.0,
            page_index: 2,
        };
        let err = engine.recognize(&raster, "eng").unwrap_err();
        assert_eq!(err.page(), Some(3));
        assert_eq!(err.kind(), "ocr_failed");
    }
}
