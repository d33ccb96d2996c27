//! Rasterization: turn one page of an input file into a `DynamicImage`.
//!
//! Raster inputs (PNG/JPEG/TIFF) are decoded with the `image` crate and are
//! always a single page. PDF pages are rendered through pdfium at the
//! configured DPI.
//!
//! ## Why cap pixels as well as DPI?
//!
//! A 300-DPI render of an A0 drawing is ~10 000 × 14 000 px. The
//! `max_rendered_pixels` cap bounds memory for such pages; the effective DPI
//! is recomputed from the rendered width so the output page keeps the
//! original physical size.
//!
//! Every method here is blocking; the pipeline calls them from
//! `spawn_blocking`.

use crate::error::PageError;
use crate::pipeline::input::{InputItem, InputKind};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A decoded bitmap for one page of one input.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub image: DynamicImage,
    /// Effective resolution of `image`, used to size the output page.
    pub dpi: f32,
    /// 0-based page index within the source file.
    pub page_index: usize,
}

impl PageRaster {
    /// Page width in PDF points (1/72 inch).
    pub fn width_pt(&self) -> f32 {
        self.image.width() as f32 * 72.0 / self.dpi
    }

    /// Page height in PDF points (1/72 inch).
    pub fn height_pt(&self) -> f32 {
        self.image.height() as f32 * 72.0 / self.dpi
    }
}

/// Converts pages of an input file into bitmaps.
pub trait Rasterizer: Send + Sync {
    /// Number of pages in `item`. Images always have one page.
    fn page_count(&self, item: &InputItem) -> Result<usize, PageError>;

    /// Render the 0-based `page_index` of `item` at `dpi`.
    fn rasterize(&self, item: &InputItem, page_index: usize, dpi: u32)
        -> Result<PageRaster, PageError>;
}

/// Default rasterizer: `image` for raster files, pdfium for PDFs.
///
/// pdfium is only bound when a PDF is actually touched, so image-only
/// batches work on machines without the pdfium shared library.
#[derive(Debug, Clone)]
pub struct NativeRasterizer {
    password: Option<String>,
    max_rendered_pixels: u32,
}

impl NativeRasterizer {
    pub fn new(password: Option<String>, max_rendered_pixels: u32) -> Self {
        Self {
            password,
            max_rendered_pixels,
        }
    }
}

impl Rasterizer for NativeRasterizer {
    fn page_count(&self, item: &InputItem) -> Result<usize, PageError> {
        match item.kind {
            InputKind::Image => Ok(1),
            InputKind::Pdf => pdf_page_count(&item.path, self.password.as_deref()),
        }
    }

    fn rasterize(
        &self,
        item: &InputItem,
        page_index: usize,
        dpi: u32,
    ) -> Result<PageRaster, PageError> {
        match item.kind {
            InputKind::Image => load_image(&item.path, page_index, dpi),
            InputKind::Pdf => render_pdf_page(
                &item.path,
                page_index,
                dpi,
                self.max_rendered_pixels,
                self.password.as_deref(),
            ),
        }
    }
}

/// Decode a raster image file. `dpi` is recorded as its scan resolution.
pub fn load_image(path: &Path, page_index: usize, dpi: u32) -> Result<PageRaster, PageError> {
    if page_index != 0 {
        return Err(PageError::RasterizationFailed {
            page: Some(page_index + 1),
            detail: "image inputs have a single page".to_string(),
        });
    }

    let image = image::open(path).map_err(|e| PageError::RasterizationFailed {
        page: Some(1),
        detail: format!("cannot decode image '{}': {}", path.display(), e),
    })?;

    if image.width() == 0 || image.height() == 0 {
        return Err(PageError::RasterizationFailed {
            page: Some(1),
            detail: "image has zero width or height".to_string(),
        });
    }

    debug!(
        "Decoded {} → {}x{} px",
        path.display(),
        image.width(),
        image.height()
    );

    Ok(PageRaster {
        image,
        dpi: dpi as f32,
        page_index: 0,
    })
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Bind to a pdfium shared library.
///
/// Lookup order: `PDFIUM_LIB_PATH` (file or directory), the current working
/// directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, String> {
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(p);
        let lib = if p.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&p)
        } else {
            p
        };
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| format!("PDFIUM_LIB_PATH '{}': {:?}", lib.display(), e));
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    Pdfium::bind_to_library(&local)
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| {
            format!(
                "{:?}. Install libpdfium or set PDFIUM_LIB_PATH to its location",
                e
            )
        })
}

fn open_error(path: &Path, password: Option<&str>, e: PdfiumError) -> String {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            format!("wrong password for '{}'", path.display())
        } else {
            format!("'{}' is encrypted; provide --password", path.display())
        }
    } else {
        format!("cannot open PDF '{}': {}", path.display(), err_str)
    }
}

fn pdf_page_count(path: &Path, password: Option<&str>) -> Result<usize, PageError> {
    let pdfium = bind_pdfium().map_err(|detail| PageError::RasterizationFailed {
        page: None,
        detail,
    })?;
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| PageError::RasterizationFailed {
            page: None,
            detail: open_error(path, password, e),
        })?;
    let total = document.pages().len() as usize;
    debug!("{}: {} pages", path.display(), total);
    Ok(total)
}

fn render_pdf_page(
    path: &Path,
    page_index: usize,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<PageRaster, PageError> {
    let page_num = page_index + 1;
    let fail = |detail: String| PageError::RasterizationFailed {
        page: Some(page_num),
        detail,
    };

    let pdfium = bind_pdfium().map_err(fail)?;
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| fail(open_error(path, password, e)))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    if page_index >= total {
        return Err(fail(format!("page out of range (document has {total} pages)")));
    }

    let page = pages
        .get(page_index as u16)
        .map_err(|e| fail(format!("{:?}", e)))?;
    let width_pt = page.width().value;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| fail(format!("{:?}", e)))?;
    let image = bitmap.as_image();

    if image.width() == 0 || image.height() == 0 {
        return Err(fail("rendered an empty bitmap".to_string()));
    }

    let effective_dpi = if width_pt > 0.0 {
        image.width() as f32 * 72.0 / width_pt
    } else {
        dpi as f32
    };

    debug!(
        "Rendered {} page {} → {}x{} px @ {:.0} dpi",
        path.display(),
        page_num,
        image.width(),
        image.height(),
        effective_dpi
    );

    Ok(PageRaster {
        image,
        dpi: effective_dpi,
        page_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn image_has_one_page() {
        let r = NativeRasterizer::new(None, 7000);
        let item = InputItem::new("whatever.png", InputKind::Image);
        assert_eq!(r.page_count(&item).unwrap(), 1);
    }

    #[test]
    fn loads_png_with_configured_dpi() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.png");
        RgbImage::from_pixel(600, 300, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let r = NativeRasterizer::new(None, 7000);
        let raster = r
            .rasterize(&InputItem::new(&path, InputKind::Image), 0, 300)
            .unwrap();
        assert_eq!(raster.image.width(), 600);
        assert_eq!(raster.dpi, 300.0);
        // 600 px at 300 dpi is two inches.
        assert!((raster.width_pt() - 144.0).abs() < 0.01);
        assert!((raster.height_pt() - 72.0).abs() < 0.01);
    }

    #[test]
    fn loads_tiff() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan.tiff");
        GrayImage::from_pixel(40, 20, Luma([0])).save(&path).unwrap();
        let raster = load_image(&path, 0, 200).unwrap();
        assert_eq!(raster.image.height(), 20);
    }

    #[test]
    fn zero_byte_image_fails_rasterization() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();
        let err = load_image(&path, 0, 300).unwrap_err();
        assert!(matches!(err, PageError::RasterizationFailed { .. }));
    }

    #[test]
    fn image_page_out_of_range() {
        let err = load_image(Path::new("unused.png"), 1, 300).unwrap_err();
        assert_eq!(err.page(), Some(2));
    }
}
