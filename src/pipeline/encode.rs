//! Image encoding for the two consumers of a page raster.
//!
//! * The OCR engine reads a lossless PNG. JPEG artefacts around glyph edges
//!   measurably hurt recognition at 200–300 DPI.
//! * The output PDF embeds the raster either as a JPEG (`/DCTDecode`, which a
//!   PDF viewer decodes natively) or as raw 8-bit samples that the writer
//!   Flate-compresses.

use crate::config::ImageEncoding;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Colour space of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
}

impl ColorSpace {
    /// PDF name of the colour space.
    pub fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
        }
    }
}

/// Image payload ready to become a PDF image XObject.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    /// `Some("DCTDecode")` for JPEG data; `None` for raw samples.
    pub filter: Option<&'static str>,
    pub data: Vec<u8>,
}

/// Encode a raster as PNG bytes for the OCR engine.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded raster → {} bytes PNG", buf.len());
    Ok(buf)
}

/// Encode a raster for embedding in the output PDF.
///
/// Rasters without colour channels stay single-channel (`DeviceGray`), which
/// keeps bilevel and grayscale scans a third of the size.
pub fn encode_for_pdf(
    img: &DynamicImage,
    encoding: ImageEncoding,
) -> Result<EmbeddedImage, image::ImageError> {
    let gray = !img.color().has_color();
    let (width, height) = (img.width(), img.height());
    let color_space = if gray {
        ColorSpace::DeviceGray
    } else {
        ColorSpace::DeviceRgb
    };

    let (filter, data) = match encoding {
        ImageEncoding::Jpeg { quality } => {
            let mut buf = Vec::new();
            {
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                if gray {
                    encoder.encode_image(&img.to_luma8())?;
                } else {
                    encoder.encode_image(&img.to_rgb8())?;
                }
            }
            (Some("DCTDecode"), buf)
        }
        ImageEncoding::Lossless => {
            let raw = if gray {
                img.to_luma8().into_raw()
            } else {
                img.to_rgb8().into_raw()
            };
            (None, raw)
        }
    };

    debug!(
        "Embedded image {}x{} {} → {} bytes",
        width,
        height,
        color_space.pdf_name(),
        data.len()
    );

    Ok(EmbeddedImage {
        width,
        height,
        color_space,
        filter,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn encode_small_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).expect("valid png");
        assert_eq!(decoded.width(), 10);
    }

    #[test]
    fn jpeg_embedding_keeps_color() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 8, Rgba([0, 128, 255, 255])));
        let e = encode_for_pdf(&img, ImageEncoding::Jpeg { quality: 80 }).unwrap();
        assert_eq!(e.color_space, ColorSpace::DeviceRgb);
        assert_eq!(e.filter, Some("DCTDecode"));
        assert_eq!((e.width, e.height), (16, 8));
        // JPEG SOI marker
        assert_eq!(&e.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn lossless_gray_embedding_is_one_byte_per_pixel() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 3, Luma([200])));
        let e = encode_for_pdf(&img, ImageEncoding::Lossless).unwrap();
        assert_eq!(e.color_space, ColorSpace::DeviceGray);
        assert_eq!(e.filter, None);
        assert_eq!(e.data.len(), 21);
        assert!(e.data.iter().all(|&b| b == 200));
    }
}
