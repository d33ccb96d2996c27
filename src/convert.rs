//! Batch conversion entry points.
//!
//! [`convert`] turns one input (a file or a directory of files) into a single
//! searchable PDF. Every (item, page) pair goes through the same three
//! stages: rasterize, OCR, compose. A failure in any stage is recorded for
//! that pair and the batch moves on; only problems that make the whole run
//! meaningless (missing input, unusable output path, nothing converted) are
//! returned as `Err`.

use crate::config::ConversionConfig;
use crate::error::{OcrPdfError, PageError};
use crate::pipeline::assemble::OutputDocument;
use crate::pipeline::compose::{ComposedPage, Compositor, PdfCompositor};
use crate::pipeline::input::{self, InputItem};
use crate::pipeline::ocr::{OcrEngine, OcrResult, TesseractEngine};
use crate::pipeline::render::{NativeRasterizer, PageRaster, Rasterizer};
use crate::report::{ConversionReport, ConversionStats, InputSummary, ItemReport, PageFailure};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Convert images and PDFs into one searchable PDF.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`  — A supported file, or a directory whose supported files are
///   converted in lexicographic order
/// * `output` — Destination PDF; `.pdf` is appended when missing. Its parent
///   directory must exist.
/// * `config` — Conversion configuration
///
/// # Returns
/// `Ok(ConversionReport)` once the output file is written, even if some
/// pages failed (check [`ConversionReport::failures`]).
///
/// # Errors
/// Returns `Err(OcrPdfError)` only for fatal errors, always before the
/// output file is touched:
/// - Input not found / unreadable / unsupported
/// - Output path is a directory or its parent is missing
/// - Every page failed ([`OcrPdfError::NoPagesProcessed`])
pub async fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, OcrPdfError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    // ── Step 1: Pre-flight ───────────────────────────────────────────────
    if !input.exists() {
        return Err(OcrPdfError::InputNotFound {
            path: input.to_path_buf(),
        });
    }
    let output_path = input::prepare_output_path(output.as_ref())?;
    let items = input::enumerate_inputs(input, config.recursive, Some(&output_path))?;

    // ── Step 2: Resolve backends ─────────────────────────────────────────
    let backends = Backends::resolve(config);
    debug!("Using OCR engine '{}'", backends.ocr.name());

    // ── Step 3: Count pages ──────────────────────────────────────────────
    let mut item_reports = Vec::with_capacity(items.len());
    let mut item_failures: Vec<Option<PageError>> = Vec::with_capacity(items.len());
    let mut units: Vec<(usize, usize)> = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        let page_count = match count_pages(&backends.rasterizer, item).await {
            Ok(pages) => {
                debug!("{}: {} page(s)", item.display_name(), pages);
                units.extend((0..pages).map(|page| (idx, page)));
                item_failures.push(None);
                Some(pages)
            }
            Err(e) => {
                warn!("{}: {}", item.path.display(), e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_item_error(&item.path, &e.to_string());
                }
                item_failures.push(Some(e));
                None
            }
        };
        item_reports.push(ItemReport {
            path: item.path.clone(),
            kind: item.kind,
            page_count,
            pages_succeeded: 0,
            pages_failed: 0,
        });
    }

    let total_pages = units.len();
    info!("{} item(s), {} page(s) to convert", items.len(), total_pages);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 4: Rasterize → OCR → compose, in order ──────────────────────
    let results = process_units(&backends, &items, &units, config).await;

    // ── Step 5: Merge results in enumeration order ───────────────────────
    let mut document = OutputDocument::new();
    let mut page_failures: Vec<(usize, PageFailure)> = Vec::new();
    let mut total_words = 0usize;

    for (&(item_idx, page_index), result) in units.iter().zip(results) {
        let report = &mut item_reports[item_idx];
        match result {
            Ok(page) => {
                total_words += page.word_count;
                report.pages_succeeded += 1;
                document.push(page);
            }
            Err(error) => {
                report.pages_failed += 1;
                page_failures.push((
                    item_idx,
                    PageFailure {
                        item: items[item_idx].path.clone(),
                        page: Some(page_index + 1),
                        error,
                    },
                ));
            }
        }
    }

    let failed_pages = page_failures.len();
    let failures = ordered_failures(&items, item_failures, page_failures);
    let processed = document.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, processed);
    }

    if document.is_empty() {
        return Err(OcrPdfError::NoPagesProcessed { failures });
    }

    // ── Step 6: Write output ─────────────────────────────────────────────
    let output_bytes = document.write_atomic(&output_path, config.compress).await?;

    let stats = ConversionStats {
        items: items.len(),
        total_pages,
        processed_pages: processed,
        failed_pages,
        total_words,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        output_bytes,
    };

    info!(
        "Conversion complete: {}/{} pages, {} failure(s), {}ms total",
        processed,
        total_pages,
        failures.len(),
        stats.total_duration_ms
    );

    Ok(ConversionReport {
        output_path,
        items: item_reports,
        failures,
        stats,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, OcrPdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrPdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, output, config))
}

/// List the inputs a conversion would process, with their page counts.
///
/// Does not run OCR and writes nothing.
pub async fn inspect(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Vec<InputSummary>, OcrPdfError> {
    let items = input::enumerate_inputs(input.as_ref(), config.recursive, None)?;
    let backends = Backends::resolve(config);

    let mut summaries = Vec::with_capacity(items.len());
    for item in &items {
        let (page_count, error) = match count_pages(&backends.rasterizer, item).await {
            Ok(n) => (Some(n), None),
            Err(e) => (None, Some(e.to_string())),
        };
        summaries.push(InputSummary {
            path: item.path.clone(),
            kind: item.kind,
            page_count,
            error,
        });
    }
    Ok(summaries)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The three adapters a run works with.
struct Backends {
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    compositor: Arc<dyn Compositor>,
}

impl Backends {
    /// Use the caller's override for each adapter, else the native one
    /// built from `config`.
    fn resolve(config: &ConversionConfig) -> Self {
        let rasterizer = match config.rasterizer {
            Some(ref r) => Arc::clone(r),
            None => Arc::new(NativeRasterizer::new(
                config.password.clone(),
                config.max_rendered_pixels,
            )) as Arc<dyn Rasterizer>,
        };
        let ocr = match config.ocr_engine {
            Some(ref e) => Arc::clone(e),
            None => Arc::new(TesseractEngine::from_config(config)) as Arc<dyn OcrEngine>,
        };
        let compositor = match config.compositor {
            Some(ref c) => Arc::clone(c),
            None => Arc::new(PdfCompositor::from_config(config)) as Arc<dyn Compositor>,
        };
        Self {
            rasterizer,
            ocr,
            compositor,
        }
    }
}

/// Page count of one item. A document without pages is a failure for that
/// item, so it shows up in the report instead of vanishing.
async fn count_pages(rasterizer: &Arc<dyn Rasterizer>, item: &InputItem) -> Result<usize, PageError> {
    let rasterizer = Arc::clone(rasterizer);
    let owned = item.clone();
    let pages = tokio::task::spawn_blocking(move || rasterizer.page_count(&owned))
        .await
        .map_err(|e| PageError::RasterizationFailed {
            page: None,
            detail: format!("page-count task failed: {e}"),
        })??;
    if pages == 0 {
        return Err(PageError::RasterizationFailed {
            page: None,
            detail: "document has no pages".to_string(),
        });
    }
    Ok(pages)
}

/// Run every unit through the page stages.
///
/// `buffered` keeps at most `concurrency` units in flight and yields results
/// in input order, so the output never depends on completion order.
async fn process_units(
    backends: &Backends,
    items: &[InputItem],
    units: &[(usize, usize)],
    config: &ConversionConfig,
) -> Vec<Result<ComposedPage, PageError>> {
    let total = units.len();
    stream::iter(units.iter().enumerate().map(|(i, &(item_idx, page_index))| {
        let item = &items[item_idx];
        async move {
            let seq = i + 1;
            let label = item.page_label(page_index);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(seq, total, &label);
            }

            let result = process_page(backends, item, page_index, config).await;

            match &result {
                Ok(page) => {
                    debug!("{}: {} words", label, page.word_count);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_complete(seq, total, &label, page.word_count);
                    }
                }
                Err(e) => {
                    warn!("{}: {}", label, e);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_error(seq, total, &label, &e.to_string());
                    }
                }
            }
            result
        }
    }))
    .buffered(config.concurrency.max(1))
    .collect()
    .await
}

async fn process_page(
    backends: &Backends,
    item: &InputItem,
    page_index: usize,
    config: &ConversionConfig,
) -> Result<ComposedPage, PageError> {
    let page_num = page_index + 1;

    let raster = {
        let rasterizer = Arc::clone(&backends.rasterizer);
        let item = item.clone();
        let dpi = config.dpi;
        tokio::task::spawn_blocking(move || rasterizer.rasterize(&item, page_index, dpi))
            .await
            .map_err(|e| PageError::RasterizationFailed {
                page: Some(page_num),
                detail: format!("render task failed: {e}"),
            })??
    };
    let raster = Arc::new(raster);

    let ocr = recognize_with_retry(&backends.ocr, &raster, page_num, config).await?;

    let compositor = Arc::clone(&backends.compositor);
    tokio::task::spawn_blocking(move || compositor.compose(&raster, &ocr))
        .await
        .map_err(|e| PageError::CompositionFailed {
            page: page_num,
            detail: format!("compose task failed: {e}"),
        })?
}

/// OCR one raster, retrying with exponential backoff
/// (`retry_backoff_ms * 2^(attempt-1)`).
async fn recognize_with_retry(
    engine: &Arc<dyn OcrEngine>,
    raster: &Arc<PageRaster>,
    page_num: usize,
    config: &ConversionConfig,
) -> Result<OcrResult, PageError> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Page {}: OCR retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let engine = Arc::clone(engine);
        let raster = Arc::clone(raster);
        let language = config.language.clone();
        match tokio::task::spawn_blocking(move || engine.recognize(&raster, &language)).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) => {
                let detail = match e {
                    PageError::OcrFailed { detail, .. } => detail,
                    other => other.to_string(),
                };
                debug!("Page {}: OCR attempt {} failed: {}", page_num, attempt + 1, detail);
                last_err = Some(detail);
            }
            Err(e) => last_err = Some(format!("OCR task failed: {e}")),
        }
    }

    Err(PageError::OcrFailed {
        page: page_num,
        attempts: config.max_retries + 1,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Whole-file failures first, then that item's page failures, item by item.
fn ordered_failures(
    items: &[InputItem],
    item_failures: Vec<Option<PageError>>,
    page_failures: Vec<(usize, PageFailure)>,
) -> Vec<PageFailure> {
    let mut out = Vec::with_capacity(page_failures.len());
    let mut pages = page_failures.into_iter().peekable();

    for (idx, failure) in item_failures.into_iter().enumerate() {
        if let Some(error) = failure {
            out.push(PageFailure {
                item: items[idx].path.clone(),
                page: None,
                error,
            });
        }
        while let Some((_, f)) = pages.next_if(|(i, _)| *i == idx) {
            out.push(f);
        }
    }
    out
}
