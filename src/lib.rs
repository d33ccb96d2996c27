//! # ocr2pdf
//!
//! Turn scanned images and image-only PDFs into searchable PDFs.
//!
//! ## Why this crate?
//!
//! A scan is just pixels: you cannot search it, select text in it, or feed
//! it to an indexer. This crate keeps every page looking exactly like the
//! scan and adds an invisible, correctly positioned text layer produced by
//! Tesseract OCR, so the result behaves like a born-digital PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file or directory
//!  │
//!  ├─ 1. Input     enumerate + classify (.png .jpg .jpeg .tif .tiff .pdf)
//!  ├─ 2. Render    one bitmap per page (image / pdfium, spawn_blocking)
//!  ├─ 3. OCR       tesseract TSV → words with pixel boxes (retry/backoff)
//!  ├─ 4. Compose   page image + invisible Helvetica text layer (Tr 3)
//!  └─ 5. Assemble  every successful page, in order, into one PDF (atomic write)
//! ```
//!
//! A failure on one page is recorded in the [`ConversionReport`] and the
//! batch continues; the run fails as a whole only if nothing could be
//! converted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().dpi(300).language("eng").build()?;
//!     let report = convert("scans/", "scans.pdf", &config).await?;
//!     eprintln!(
//!         "{} pages, {} failures",
//!         report.stats.processed_pages,
//!         report.failures.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Needed for | Lookup |
//! |------|-----------|--------|
//! | `tesseract` | OCR (always) | `tesseract_cmd` / `TESSERACT_CMD`, then `PATH` |
//! | `libpdfium` | PDF inputs only | `PDFIUM_LIB_PATH`, working dir, system library |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! ocr2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ImageEncoding};
pub use convert::{convert, convert_sync, inspect};
pub use error::{OcrPdfError, PageError};
pub use pipeline::compose::{ComposedPage, Compositor, PdfCompositor};
pub use pipeline::input::{InputItem, InputKind};
pub use pipeline::ocr::{list_languages, BBox, OcrEngine, OcrResult, OcrWord, TesseractEngine};
pub use pipeline::render::{NativeRasterizer, PageRaster, Rasterizer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{
    ConversionReport, ConversionStats, InputSummary, ItemReport, Outcome, PageFailure,
};
