//! Composition: one raster plus its OCR words → one searchable PDF page.
//!
//! The page shows the raster scaled to the full page and carries every word
//! as invisible text (render mode 3) positioned over the word's pixels, so
//! viewers can search and select text while the page still looks exactly
//! like the scan.
//!
//! ## Coordinates
//!
//! Raster pixels have their origin at the top-left; PDF user space has its
//! origin at the bottom-left and is measured in points. With `s = 72 / dpi`:
//!
//! ```text
//! x_pt = x_px · s
//! y_pt = page_height_pt − (y_px + h_px) · s     (baseline at the box bottom)
//! ```
//!
//! Each word is set in Helvetica at the box height and then horizontally
//! scaled (`Tz`) so its advance width matches the box width.

use crate::config::{ConversionConfig, ImageEncoding};
use crate::error::PageError;
use crate::pipeline::encode::{encode_for_pdf, EmbeddedImage};
use crate::pipeline::ocr::{OcrResult, OcrWord};
use crate::pipeline::render::PageRaster;
use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};
use tracing::debug;

/// Resource name of the page image XObject.
pub const IMAGE_RESOURCE: &str = "Im0";
/// Resource name of the text-layer font.
pub const FONT_RESOURCE: &str = "F1";

/// Average Helvetica glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Everything the writer needs to emit one PDF page.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub width_pt: f32,
    pub height_pt: f32,
    /// Image XObject payload referenced as `/Im0`.
    pub image: EmbeddedImage,
    /// Uncompressed content stream.
    pub content: Vec<u8>,
    /// Words placed in the text layer.
    pub word_count: usize,
}

/// Combines a raster and its OCR result into a PDF page.
pub trait Compositor: Send + Sync {
    fn compose(&self, raster: &PageRaster, ocr: &OcrResult) -> Result<ComposedPage, PageError>;
}

/// Default compositor: image XObject plus an invisible Helvetica text layer.
#[derive(Debug, Clone)]
pub struct PdfCompositor {
    min_confidence: f32,
    image_encoding: ImageEncoding,
}

impl PdfCompositor {
    pub fn new(min_confidence: f32, image_encoding: ImageEncoding) -> Self {
        Self {
            min_confidence,
            image_encoding,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(config.min_confidence, config.image_encoding)
    }
}

impl Compositor for PdfCompositor {
    fn compose(&self, raster: &PageRaster, ocr: &OcrResult) -> Result<ComposedPage, PageError> {
        let page = raster.page_index + 1;
        let fail = |detail: String| PageError::CompositionFailed { page, detail };

        if raster.dpi <= 0.0 {
            return Err(fail(format!("invalid raster DPI {}", raster.dpi)));
        }

        let width_pt = raster.width_pt();
        let height_pt = raster.height_pt();
        let scale = 72.0 / raster.dpi;

        let image = encode_for_pdf(&raster.image, self.image_encoding)
            .map_err(|e| fail(format!("cannot encode page image: {e}")))?;

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width_pt.into(),
                    0.into(),
                    0.into(),
                    height_pt.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.into())]),
            Operation::new("Q", vec![]),
        ];

        let placed: Vec<&OcrWord> = ocr
            .words
            .iter()
            .filter(|w| w.confidence >= self.min_confidence)
            .filter(|w| w.bbox.w > 0 && w.bbox.h > 0)
            .collect();

        if !placed.is_empty() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tr", vec![3.into()]));
            for word in &placed {
                operations.extend(word_operations(word, scale, height_pt));
            }
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| fail(format!("cannot encode content stream: {e}")))?;

        debug!(
            "Page {}: composed {:.1}x{:.1} pt, {} of {} words in text layer",
            page,
            width_pt,
            height_pt,
            placed.len(),
            ocr.words.len()
        );

        Ok(ComposedPage {
            width_pt,
            height_pt,
            image,
            content,
            word_count: placed.len(),
        })
    }
}

fn word_operations(word: &OcrWord, scale: f32, page_height_pt: f32) -> Vec<Operation> {
    let text = to_win_ansi(&word.text);
    let x = word.bbox.x as f32 * scale;
    let y = page_height_pt - (word.bbox.y + word.bbox.h) as f32 * scale;
    let size = word.bbox.h as f32 * scale;
    let box_width = word.bbox.w as f32 * scale;
    let natural_width = size * AVG_GLYPH_WIDTH * text.len().max(1) as f32;
    let horizontal_scale = 100.0 * box_width / natural_width;

    vec![
        Operation::new("Tf", vec![Object::Name(FONT_RESOURCE.into()), size.into()]),
        Operation::new("Tz", vec![horizontal_scale.into()]),
        Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
        ),
        Operation::new("Tj", vec![Object::String(text, StringFormat::Literal)]),
    ]
}

/// Encode text for a WinAnsiEncoding simple font; unmappable characters
/// become `?`.
pub fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7E}' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::ColorSpace;
    use crate::pipeline::ocr::BBox;
    use image::{DynamicImage, GrayImage, Luma};

    fn raster(w: u32, h: u32, dpi: f32) -> PageRaster {
        PageRaster {
            image: DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([255]))),
            dpi,
            page_index: 0,
        }
    }

    fn word(text: &str, x: u32, y: u32, w: u32, h: u32, confidence: f32) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            bbox: BBox { x, y, w, h },
            confidence,
            block: 1,
            paragraph: 1,
            line: 1,
        }
    }

    fn decoded(page: &ComposedPage) -> Vec<Operation> {
        Content::decode(&page.content).unwrap().operations
    }

    fn shown_strings(ops: &[Operation]) -> Vec<Vec<u8>> {
        ops.iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn page_size_follows_dpi() {
        let c = PdfCompositor::new(0.0, ImageEncoding::Lossless);
        // US Letter at 300 DPI.
        let page = c.compose(&raster(2550, 3300, 300.0), &OcrResult::default()).unwrap();
        assert!((page.width_pt - 612.0).abs() < 0.01);
        assert!((page.height_pt - 792.0).abs() < 0.01);
        assert_eq!(page.image.color_space, ColorSpace::DeviceGray);
        assert_eq!(page.word_count, 0);
    }

    #[test]
    fn blank_page_has_image_and_no_text_object() {
        let c = PdfCompositor::new(0.0, ImageEncoding::Jpeg { quality: 90 });
        let page = c.compose(&raster(100, 100, 72.0), &OcrResult::default()).unwrap();
        let ops = decoded(&page);
        assert!(ops.iter().any(|op| op.operator == "Do"));
        assert!(!ops.iter().any(|op| op.operator == "BT"));
    }

    #[test]
    fn words_are_invisible_and_positioned() {
        let c = PdfCompositor::new(0.0, ImageEncoding::Lossless);
        let ocr = OcrResult {
            text: "Hello".into(),
            words: vec![word("Hello", 144, 72, 720, 72, 95.0)],
        };
        // 72 DPI keeps pixels equal to points.
        let page = c.compose(&raster(1000, 500, 72.0), &ocr).unwrap();
        let ops = decoded(&page);

        let tr = ops.iter().find(|op| op.operator == "Tr").unwrap();
        assert_eq!(tr.operands[0].as_i64().unwrap(), 3);

        let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
        let x = tm.operands[4].as_float().unwrap();
        let y = tm.operands[5].as_float().unwrap();
        assert!((x - 144.0).abs() < 0.01);
        assert!((y - (500.0 - 144.0)).abs() < 0.01);

        // 5 chars at 72pt with 0.5 average width = 180pt natural; box is 720pt.
        let tz = ops.iter().find(|op| op.operator == "Tz").unwrap();
        assert!((tz.operands[0].as_float().unwrap() - 400.0).abs() < 0.01);

        assert_eq!(shown_strings(&ops), vec![b"Hello".to_vec()]);
        assert_eq!(page.word_count, 1);
    }

    #[test]
    fn low_confidence_words_are_omitted() {
        let c = PdfCompositor::new(60.0, ImageEncoding::Lossless);
        let ocr = OcrResult {
            text: "keep drop".into(),
            words: vec![
                word("keep", 0, 0, 40, 10, 88.0),
                word("drop", 50, 0, 40, 10, 12.0),
            ],
        };
        let page = c.compose(&raster(100, 20, 72.0), &ocr).unwrap();
        assert_eq!(shown_strings(&decoded(&page)), vec![b"keep".to_vec()]);
        assert_eq!(page.word_count, 1);
    }

    #[test]
    fn parentheses_survive_content_encoding() {
        let c = PdfCompositor::new(0.0, ImageEncoding::Lossless);
        let ocr = OcrResult {
            text: "(a)\\b".into(),
            words: vec![word("(a)\\b", 0, 0, 40, 10, 90.0)],
        };
        let page = c.compose(&raster(100, 20, 72.0), &ocr).unwrap();
        assert_eq!(shown_strings(&decoded(&page)), vec![b"(a)\\b".to_vec()]);
    }

    #[test]
    fn win_ansi_mapping() {
        assert_eq!(to_win_ansi("abc"), b"abc".to_vec());
        assert_eq!(to_win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(to_win_ansi("“x”"), vec![0x93, b'x', 0x94]);
        assert_eq!(to_win_ansi("€—"), vec![0x80, 0x97]);
        assert_eq!(to_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn zero_dpi_is_composition_failure() {
        let c = PdfCompositor::new(0.0, ImageEncoding::Lossless);
        let err = c.compose(&raster(10, 10, 0.0), &OcrResult::default()).unwrap_err();
        assert_eq!(err.kind(), "composition_failed");
    }
}
