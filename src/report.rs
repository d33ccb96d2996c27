//! Result types returned by a conversion.
//!
//! A run that writes an output file always returns a [`ConversionReport`],
//! even when some pages failed. Per-page failures live in
//! [`ConversionReport::failures`]; the caller decides whether a partial
//! result is acceptable (see [`ConversionReport::into_result`]).
//!
//! Every type here derives `Serialize` so the CLI can print the report as
//! JSON with `--json`.

use crate::error::{OcrPdfError, PageError};
use crate::pipeline::input::InputKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of a whole run that produced an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every page of every item made it into the output.
    Complete,
    /// The output was written but at least one page or item failed.
    Partial,
}

/// Summary of a finished conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    /// The PDF that was written (after `.pdf` normalisation).
    pub output_path: PathBuf,
    /// One entry per enumerated input item, in processing order.
    pub items: Vec<ItemReport>,
    /// Every failed (item, page) pair, in processing order.
    pub failures: Vec<PageFailure>,
    pub stats: ConversionStats,
}

impl ConversionReport {
    pub fn outcome(&self) -> Outcome {
        if self.failures.is_empty() {
            Outcome::Complete
        } else {
            Outcome::Partial
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome() == Outcome::Complete
    }

    /// Treat any failure as an error.
    ///
    /// Returns [`OcrPdfError::PartialFailure`] when at least one page or item
    /// failed, otherwise the report itself.
    pub fn into_result(self) -> Result<Self, OcrPdfError> {
        if self.is_complete() {
            Ok(self)
        } else {
            let failed = self.failures.len();
            Err(OcrPdfError::PartialFailure {
                success: self.stats.processed_pages,
                failed,
                total: self.stats.processed_pages + failed,
            })
        }
    }
}

/// Per-item outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub path: PathBuf,
    pub kind: InputKind,
    /// `None` when the file could not be opened to count its pages.
    pub page_count: Option<usize>,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
}

/// One failed (item, page) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFailure {
    pub item: PathBuf,
    /// 1-indexed page, or `None` for whole-file failures.
    pub page: Option<usize>,
    pub error: PageError,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item.display(), self.error)
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Input items enumerated.
    pub items: usize,
    /// Pages known across all items whose page count could be determined.
    pub total_pages: usize,
    /// Pages written to the output.
    pub processed_pages: usize,
    /// Pages that failed (excludes whole-file failures).
    pub failed_pages: usize,
    /// Words placed in the text layer across all pages.
    pub total_words: usize,
    pub total_duration_ms: u64,
    /// Size of the written file.
    pub output_bytes: u64,
}

/// What [`crate::inspect`] found for one input item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    pub path: PathBuf,
    pub kind: InputKind,
    pub page_count: Option<usize>,
    /// Why the page count is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(failures: Vec<PageFailure>, processed: usize) -> ConversionReport {
        ConversionReport {
            output_path: PathBuf::from("out.pdf"),
            items: vec![],
            failures,
            stats: ConversionStats {
                processed_pages: processed,
                ..Default::default()
            },
        }
    }

    fn ocr_failure(page: usize) -> PageFailure {
        PageFailure {
            item: PathBuf::from("doc.pdf"),
            page: Some(page),
            error: PageError::OcrFailed {
                page,
                attempts: 1,
                detail: "boom".into(),
            },
        }
    }

    #[test]
    fn complete_when_no_failures() {
        let r = report(vec![], 3);
        assert_eq!(r.outcome(), Outcome::Complete);
        assert!(r.into_result().is_ok());
    }

    #[test]
    fn partial_into_result_counts_pages() {
        let r = report(vec![ocr_failure(2)], 4);
        assert_eq!(r.outcome(), Outcome::Partial);
        match r.into_result().unwrap_err() {
            OcrPdfError::PartialFailure {
                success,
                failed,
                total,
            } => {
                assert_eq!((success, failed, total), (4, 1, 5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failure_display_names_item_and_page() {
        let s = ocr_failure(3).to_string();
        assert!(s.starts_with("doc.pdf: Page 3"), "got: {s}");
    }

    #[test]
    fn report_serializes_to_json() {
        let json = serde_json::to_value(report(vec![ocr_failure(1)], 0)).unwrap();
        assert_eq!(json["failures"][0]["page"], 1);
        assert!(json["failures"][0]["error"]["OcrFailed"].is_object());
        assert_eq!(json["stats"]["processed_pages"], 0);
    }

    #[test]
    fn summary_omits_missing_error() {
        let s = InputSummary {
            path: PathBuf::from("a.png"),
            kind: InputKind::Image,
            page_count: Some(1),
            error: None,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"kind\":\"image\""));
    }
}
