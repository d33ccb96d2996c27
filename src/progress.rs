//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each (file, page) pair.
//!
//! # Example
//!
//! ```rust
//! use ocr2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, seq: usize, total: usize, label: &str, word_count: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{seq}/{total}] {label}: {word_count} words");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// Pages are identified by `seq`, their 1-indexed position among all pages
/// of the batch, and a human-readable `label` such as `scan.pdf p3`.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With `concurrency > 1` the page methods may be called concurrently from
/// different tasks and out of order. Implementations must protect shared
/// mutable state with `Mutex`/atomics.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after page counting and before the first page is rendered.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a file could not be opened at all (no page count).
    fn on_item_error(&self, item: &Path, error: &str) {
        let _ = (item, error);
    }

    /// Called just before a page is rasterized.
    fn on_page_start(&self, seq: usize, total_pages: usize, label: &str) {
        let _ = (seq, total_pages, label);
    }

    /// Called when a page has been composited into the output.
    fn on_page_complete(&self, seq: usize, total_pages: usize, label: &str, word_count: usize) {
        let _ = (seq, total_pages, label, word_count);
    }

    /// Called when a page fails at any stage.
    fn on_page_error(&self, seq: usize, total_pages: usize, label: &str, error: &str) {
        let _ = (seq, total_pages, label, error);
    }

    /// Called once after every page has been attempted.
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
