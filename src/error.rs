//! Error types for the ocr2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrPdfError`] — **Fatal**: the conversion cannot proceed or produced
//!   nothing (missing input, output path is a directory, every page failed).
//!   Returned as `Err(OcrPdfError)` from the top-level `convert*` functions,
//!   always before the output file is written.
//!
//! * [`PageError`] — **Non-fatal**: a single page (or a whole file whose pages
//!   could not be counted) failed. Stored inside
//!   [`crate::report::PageFailure`] so the batch keeps going and the caller
//!   gets the full list at the end.

use crate::report::PageFailure;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr2pdf library.
///
/// Page-level failures use [`PageError`] and are recorded in the
/// [`crate::report::ConversionReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum OcrPdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the input.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A single input file has an extension we cannot convert.
    #[error(
        "Unsupported input format: '{path}'\n\
Supported extensions: .png, .jpg, .jpeg, .tif, .tiff, .pdf"
    )]
    UnsupportedFormat { path: PathBuf },

    /// The input directory contains no file with a supported extension.
    #[error(
        "No supported files in directory '{path}'\n\
Supported extensions: .png, .jpg, .jpeg, .tif, .tiff, .pdf"
    )]
    NoSupportedFiles { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output path cannot receive a PDF file.
    #[error("Invalid output path '{path}': {reason}")]
    OutputPathInvalid { path: PathBuf, reason: String },

    /// Every attempted page failed; there is nothing to write.
    #[error("No pages were processed ({} failures).\nFirst error: {}", failures.len(), first_failure(failures))]
    NoPagesProcessed { failures: Vec<PageFailure> },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::report::ConversionReport::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    /// Serialising the assembled document failed.
    #[error("Failed to assemble output PDF: {0}")]
    AssemblyFailed(String),

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The OCR engine executable could not be queried.
    #[error(
        "OCR engine '{command}' is not available: {detail}\n\
Install Tesseract (https://tesseract-ocr.github.io/) or point --tesseract at it."
    )]
    EngineUnavailable { command: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn first_failure(failures: &[PageFailure]) -> String {
    failures
        .first()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "no page was attempted".to_string())
}

/// A non-fatal error for a single page.
///
/// `page` is 1-indexed. `None` means the failure happened before any page
/// of the file could be addressed (e.g. the PDF did not open).
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The file or page could not be decoded into a bitmap.
    #[error("{}: rasterization failed: {detail}", page_label(*page))]
    RasterizationFailed { page: Option<usize>, detail: String },

    /// The OCR engine raised an error for this page.
    #[error("{}: OCR failed after {attempts} attempt(s): {detail}", page_label(Some(*page)))]
    OcrFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// The raster and text layer could not be combined into a PDF page.
    #[error("{}: composition failed: {detail}", page_label(Some(*page)))]
    CompositionFailed { page: usize, detail: String },
}

impl PageError {
    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PageError::RasterizationFailed { .. } => "rasterization_failed",
            PageError::OcrFailed { .. } => "ocr_failed",
            PageError::CompositionFailed { .. } => "composition_failed",
        }
    }

    /// 1-indexed page number, if the failure is tied to a page.
    pub fn page(&self) -> Option<usize> {
        match self {
            PageError::RasterizationFailed { page, .. } => *page,
            PageError::OcrFailed { page, .. } | PageError::CompositionFailed { page, .. } => {
                Some(*page)
            }
        }
    }
}

fn page_label(page: Option<usize>) -> String {
    match page {
        Some(p) => format!("Page {p}"),
        None => "File".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = OcrPdfError::PartialFailure {
            success: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn output_path_invalid_display() {
        let e = OcrPdfError::OutputPathInvalid {
            path: PathBuf::from("/tmp/out"),
            reason: "is a directory".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/out"));
        assert!(msg.contains("is a directory"));
    }

    #[test]
    fn no_pages_processed_reports_first_failure() {
        let e = OcrPdfError::NoPagesProcessed {
            failures: vec![PageFailure {
                item: PathBuf::from("scan.png"),
                page: Some(1),
                error: PageError::OcrFailed {
                    page: 1,
                    attempts: 1,
                    detail: "tesseract exited with status 1".into(),
                },
            }],
        };
        let msg = e.to_string();
        assert!(msg.contains("1 failures"), "got: {msg}");
        assert!(msg.contains("scan.png"), "got: {msg}");
        assert!(msg.contains("status 1"), "got: {msg}");
    }

    #[test]
    fn no_pages_processed_without_failures() {
        let e = OcrPdfError::NoPagesProcessed { failures: vec![] };
        assert!(e.to_string().contains("no page was attempted"));
    }

    #[test]
    fn file_level_rasterization_failure_has_no_page() {
        let e = PageError::RasterizationFailed {
            page: None,
            detail: "empty file".into(),
        };
        assert_eq!(e.page(), None);
        assert_eq!(e.kind(), "rasterization_failed");
        assert!(e.to_string().starts_with("File:"));
    }

    #[test]
    fn page_error_kinds() {
        let ocr = PageError::OcrFailed {
            page: 3,
            attempts: 2,
            detail: "boom".into(),
        };
        assert_eq!(ocr.kind(), "ocr_failed");
        assert_eq!(ocr.page(), Some(3));
        assert!(ocr.to_string().contains("2 attempt(s)"));

        let comp = PageError::CompositionFailed {
            page: 4,
            detail: "bad image".into(),
        };
        assert_eq!(comp.kind(), "composition_failed");
        assert!(comp.to_string().contains("Page 4"));
    }
}
