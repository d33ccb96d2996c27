//! Configuration types for image/PDF to searchable-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is also the context object
//! that carries the three adapters (rasterizer, OCR engine, compositor) into
//! the pipeline, so tests can swap any of them for a mock without touching
//! process-wide state.

use crate::error::OcrPdfError;
use crate::pipeline::compose::Compositor;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::Rasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Lowest accepted rasterization DPI.
pub const MIN_DPI: u32 = 72;
/// Highest accepted rasterization DPI.
pub const MAX_DPI: u32 = 600;
/// Highest Tesseract page segmentation mode (`--psm`).
pub const MAX_PSM: u32 = 13;
/// Highest Tesseract engine mode (`--oem`).
pub const MAX_OEM: u32 = 3;

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(300)
///     .language("eng+deu")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rasterization DPI for PDF pages, and the assumed scan resolution of
    /// image inputs. Range: 72–600. Default: 300.
    ///
    /// Tesseract is tuned for text around 300 DPI; lower values lose small
    /// print, higher values mostly cost time and output size.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels for PDF
    /// pages. Default: 7000.
    ///
    /// Caps oversized pages (posters, drawings) independently of DPI. When the
    /// cap kicks in the effective DPI of that page drops accordingly.
    pub max_rendered_pixels: u32,

    /// Tesseract language code(s), `+`-separated. Default: `eng`.
    pub language: String,

    /// Tesseract page segmentation mode (`--psm`). Default: 6.
    pub psm: u32,

    /// Tesseract OCR engine mode (`--oem`). Default: 3.
    pub oem: u32,

    /// Tesseract executable. If None, uses `tesseract` from `PATH`
    /// (or the standard install location on Windows).
    pub tesseract_cmd: Option<PathBuf>,

    /// Convert rasters to grayscale before OCR. Default: true.
    pub grayscale: bool,

    /// Words below this confidence (0–100) are left out of the text layer.
    /// Default: 0.0 (keep every recognised word).
    ///
    /// Low confidence is never a page failure; it only thins the text layer.
    pub min_confidence: f32,

    /// How the page raster is embedded in the output. Default: JPEG q90.
    pub image_encoding: ImageEncoding,

    /// Flate-compress content streams when saving. Default: true.
    pub compress: bool,

    /// User password for encrypted PDF inputs.
    pub password: Option<String>,

    /// Walk sub-directories of a directory input. Default: false.
    pub recursive: bool,

    /// Number of pages processed at once. Default: 1 (sequential).
    ///
    /// Tesseract is already multi-threaded per call, so the sequential default
    /// is usually close to optimal. Results are merged in input order
    /// regardless of this value.
    pub concurrency: usize,

    /// Extra OCR attempts per page after a failure. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Optional progress callback for per-page events.
    pub progress_callback: Option<ProgressCallback>,

    /// Pre-constructed rasterizer. Default: [`crate::pipeline::render::NativeRasterizer`].
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Pre-constructed OCR engine. Default: [`crate::pipeline::ocr::TesseractEngine`].
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed compositor. Default: [`crate::pipeline::compose::PdfCompositor`].
    pub compositor: Option<Arc<dyn Compositor>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 7000,
            language: "eng".to_string(),
            psm: 6,
            oem: 3,
            tesseract_cmd: None,
            grayscale: true,
            min_confidence: 0.0,
            image_encoding: ImageEncoding::default(),
            compress: true,
            password: None,
            recursive: false,
            concurrency: 1,
            max_retries: 0,
            retry_backoff_ms: 500,
            progress_callback: None,
            rasterizer: None,
            ocr_engine: None,
            compositor: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("language", &self.language)
            .field("psm", &self.psm)
            .field("oem", &self.oem)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("grayscale", &self.grayscale)
            .field("min_confidence", &self.min_confidence)
            .field("image_encoding", &self.image_encoding)
            .field("compress", &self.compress)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("recursive", &self.recursive)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("compositor", &self.compositor.as_ref().map(|_| "<dyn Compositor>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into().trim().to_string();
        self
    }

    pub fn psm(mut self, psm: u32) -> Self {
        self.config.psm = psm;
        self
    }

    pub fn oem(mut self, oem: u32) -> Self {
        self.config.oem = oem;
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = Some(cmd.into());
        self
    }

    pub fn grayscale(mut self, v: bool) -> Self {
        self.config.grayscale = v;
        self
    }

    /// Clamped to 0–100. NaN is kept so that `build()` rejects it.
    pub fn min_confidence(mut self, conf: f32) -> Self {
        self.config.min_confidence = if conf.is_nan() {
            conf
        } else {
            conf.clamp(0.0, 100.0)
        };
        self
    }

    pub fn image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.config.image_encoding = encoding;
        self
    }

    pub fn compress(mut self, v: bool) -> Self {
        self.config.compress = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.config.compositor = Some(compositor);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, OcrPdfError> {
        let c = &self.config;
        if c.dpi < MIN_DPI || c.dpi > MAX_DPI {
            return Err(OcrPdfError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(OcrPdfError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        validate_language(&c.language)?;
        if c.psm > MAX_PSM {
            return Err(OcrPdfError::InvalidConfig(format!(
                "Page segmentation mode must be 0–{MAX_PSM}, got {}",
                c.psm
            )));
        }
        if c.oem > MAX_OEM {
            return Err(OcrPdfError::InvalidConfig(format!(
                "OCR engine mode must be 0–{MAX_OEM}, got {}",
                c.oem
            )));
        }
        if !c.min_confidence.is_finite() || !(0.0..=100.0).contains(&c.min_confidence) {
            return Err(OcrPdfError::InvalidConfig(format!(
                "Minimum confidence must be 0–100, got {}",
                c.min_confidence
            )));
        }
        if let ImageEncoding::Jpeg { quality } = c.image_encoding {
            if quality == 0 || quality > 100 {
                return Err(OcrPdfError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {quality}"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Check a Tesseract language code such as `eng` or `eng+chi_sim`.
fn validate_language(lang: &str) -> Result<(), OcrPdfError> {
    if lang.is_empty() {
        return Err(OcrPdfError::InvalidConfig("OCR language is empty".into()));
    }
    let valid = lang.split('+').all(|code| {
        !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    if !valid {
        return Err(OcrPdfError::InvalidConfig(format!(
            "Invalid OCR language '{lang}': expected codes like 'eng' or 'eng+deu'"
        )));
    }
    Ok(())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How each page raster is stored inside the output PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// Baseline JPEG (`/DCTDecode`). Small files; fine for photographed or
    /// scanned paper.
    Jpeg { quality: u8 },
    /// Raw 8-bit samples, Flate-compressed on save when compression is on.
    /// Lossless; large for colour scans.
    Lossless,
}

impl Default for ImageEncoding {
    fn default() -> Self {
        ImageEncoding::Jpeg { quality: 90 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.language, "eng");
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.max_retries, 0);
        assert!(c.grayscale);
        assert_eq!(c.image_encoding, ImageEncoding::Jpeg { quality: 90 });
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = ConversionConfig::builder()
            .dpi(10_000)
            .concurrency(0)
            .min_confidence(250.0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, MAX_DPI);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.min_confidence, 100.0);

        let c = ConversionConfig::builder().dpi(1).build().unwrap();
        assert_eq!(c.dpi, MIN_DPI);
    }

    #[test]
    fn builder_accepts_multi_language() {
        let c = ConversionConfig::builder()
            .language(" eng+chi_sim ")
            .build()
            .unwrap();
        assert_eq!(c.language, "eng+chi_sim");
    }

    #[test]
    fn builder_rejects_bad_language() {
        for bad in ["", "eng+", "en g", "eng;rm -rf"] {
            let err = ConversionConfig::builder().language(bad).build();
            assert!(
                matches!(err, Err(OcrPdfError::InvalidConfig(_))),
                "language {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn builder_rejects_bad_jpeg_quality() {
        let err = ConversionConfig::builder()
            .image_encoding(ImageEncoding::Jpeg { quality: 0 })
            .build();
        assert!(matches!(err, Err(OcrPdfError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_out_of_range_tesseract_modes() {
        let err = ConversionConfig::builder().psm(99).build();
        assert!(matches!(err, Err(OcrPdfError::InvalidConfig(_))));
        let err = ConversionConfig::builder().oem(9).build();
        assert!(matches!(err, Err(OcrPdfError::InvalidConfig(_))));

        let c = ConversionConfig::builder().psm(MAX_PSM).oem(MAX_OEM).build().unwrap();
        assert_eq!((c.psm, c.oem), (13, 3));
    }

    #[test]
    fn builder_rejects_nan_confidence() {
        let err = ConversionConfig::builder().min_confidence(f32::NAN).build();
        assert!(matches!(err, Err(OcrPdfError::InvalidConfig(_))));

        let c = ConversionConfig::builder()
            .min_confidence(f32::INFINITY)
            .build()
            .unwrap();
        assert_eq!(c.min_confidence, 100.0);
    }

    #[test]
    fn debug_redacts_password() {
        let c = ConversionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
