//! Assembly: ordered composed pages → one PDF file on disk.
//!
//! Pages are appended in the order the pipeline delivers them, which is the
//! enumeration order of (item, page) pairs. One shared Helvetica font object
//! backs the text layer of every page.

use crate::error::OcrPdfError;
use crate::pipeline::compose::{ComposedPage, FONT_RESOURCE, IMAGE_RESOURCE};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Ordered collection of composed pages awaiting serialization.
#[derive(Debug, Default)]
pub struct OutputDocument {
    pages: Vec<ComposedPage>,
}

impl OutputDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: ComposedPage) {
        self.pages.push(page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Serialize to PDF bytes. `compress` Flate-compresses content streams
    /// and raw image samples; JPEG data is stored as is.
    pub fn into_bytes(self, compress: bool) -> Result<Vec<u8>, OcrPdfError> {
        let mut doc = self.into_document()?;
        if compress {
            doc.compress();
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf)
            .map_err(|e| OcrPdfError::AssemblyFailed(e.to_string()))?;
        debug!("Assembled PDF → {} bytes", buf.len());
        Ok(buf)
    }

    /// Build the page tree. Image samples and content streams move into the
    /// document; nothing is copied.
    fn into_document(self) -> Result<Document, OcrPdfError> {
        if self.pages.is_empty() {
            return Err(OcrPdfError::AssemblyFailed(
                "cannot write a PDF without pages".to_string(),
            ));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in self.pages {
            let mut image_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.image.width as i64,
                "Height" => page.image.height as i64,
                "ColorSpace" => page.image.color_space.pdf_name(),
                "BitsPerComponent" => 8,
            };
            if let Some(filter) = page.image.filter {
                image_dict.set("Filter", filter);
            }
            let image_id = doc.add_object(Stream::new(image_dict, page.image.data));
            let content_id = doc.add_object(Stream::new(Dictionary::new(), page.content));

            let mut fonts = Dictionary::new();
            fonts.set(FONT_RESOURCE, font_id);
            let mut xobjects = Dictionary::new();
            xobjects.set(IMAGE_RESOURCE, image_id);

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), page.width_pt.into(), page.height_pt.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => fonts,
                    "XObject" => xobjects,
                },
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Producer" => Object::string_literal(concat!("ocr2pdf ", env!("CARGO_PKG_VERSION"))),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        debug!("Built page tree with {} pages", count);
        Ok(doc)
    }

    /// Serialize and write to `path` atomically, replacing any existing
    /// file. Returns the number of bytes written.
    pub async fn write_atomic(self, path: &Path, compress: bool) -> Result<u64, OcrPdfError> {
        let page_count = self.len();
        let bytes = self.into_bytes(compress)?;
        let tmp_path = temp_sibling(path);

        let write_err = |source| OcrPdfError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Err(e) = tokio::fs::write(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        info!("Wrote {} ({} pages, {} bytes)", path.display(), page_count, bytes.len());
        Ok(bytes.len() as u64)
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageEncoding;
    use crate::pipeline::compose::{Compositor, PdfCompositor};
    use crate::pipeline::ocr::{BBox, OcrResult, OcrWord};
    use crate::pipeline::render::PageRaster;
    use image::{DynamicImage, RgbImage};
    use lopdf::content::Content;
    use tempfile::TempDir;

    fn composed(word: &str, w: u32, h: u32, encoding: ImageEncoding) -> ComposedPage {
        let raster = PageRaster {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb([250, 250, 250]))),
            dpi: 150.0,
            page_index: 0,
        };
        let ocr = OcrResult {
            text: word.to_string(),
            words: vec![OcrWord {
                text: word.to_string(),
                bbox: BBox {
                    x: 10,
                    y: 10,
                    w: 60,
                    h: 20,
                },
                confidence: 90.0,
                block: 1,
                paragraph: 1,
                line: 1,
            }],
        };
        PdfCompositor::new(0.0, encoding)
            .compose(&raster, &ocr)
            .unwrap()
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = OutputDocument::new().into_bytes(true).unwrap_err();
        assert!(matches!(err, OcrPdfError::AssemblyFailed(_)));
    }

    #[test]
    fn pages_keep_order_and_size() {
        for compress in [false, true] {
            let mut out = OutputDocument::new();
            out.push(composed("first", 300, 150, ImageEncoding::Lossless));
            out.push(composed("second", 150, 300, ImageEncoding::Jpeg { quality: 75 }));
            let bytes = out.into_bytes(compress).unwrap();
            let doc = Document::load_mem(&bytes).unwrap();
            let pages = doc.get_pages();
            assert_eq!(pages.len(), 2);

            let first = doc.get_object(pages[&1]).unwrap().as_dict().unwrap();
            let media_box = first.get(b"MediaBox").unwrap().as_array().unwrap();
            // 300 px at 150 DPI is 144 pt.
            assert!((media_box[2].as_float().unwrap() - 144.0).abs() < 0.01);
            assert!((media_box[3].as_float().unwrap() - 72.0).abs() < 0.01);

            let shown: Vec<Vec<u8>> = [1u32, 2]
                .iter()
                .map(|n| {
                    let raw = doc.get_page_content(pages[n]).unwrap();
                    Content::decode(&raw)
                        .unwrap()
                        .operations
                        .into_iter()
                        .find(|op| op.operator == "Tj")
                        .and_then(|op| op.operands.first().and_then(|o| o.as_str().ok()).map(<[u8]>::to_vec))
                        .unwrap()
                })
                .collect();
            assert_eq!(shown, vec![b"first".to_vec(), b"second".to_vec()]);
        }
    }

    #[test]
    fn page_buffers_move_into_document() {
        let page = composed("moved", 120, 80, ImageEncoding::Lossless);
        let image_ptr = page.image.data.as_ptr();
        let content_ptr = page.content.as_ptr();
        let mut out = OutputDocument::new();
        out.push(page);

        let doc = out.into_document().unwrap();
        let streams: Vec<&Stream> = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .collect();
        assert!(streams.iter().any(|s| s.content.as_ptr() == image_ptr));
        assert!(streams.iter().any(|s| s.content.as_ptr() == content_ptr));
    }

    #[test]
    fn producer_is_recorded() {
        let mut out = OutputDocument::new();
        out.push(composed("x", 20, 20, ImageEncoding::Lossless));
        let doc = Document::load_mem(&out.into_bytes(false).unwrap()).unwrap();
        let info_ref = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_ref).unwrap();
        let producer = info.get(b"Producer").unwrap().as_str().unwrap();
        assert!(producer.starts_with(b"ocr2pdf"));
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.pdf");
        std::fs::write(&path, b"stale").unwrap();

        let mut out = OutputDocument::new();
        out.push(composed("fresh", 40, 40, ImageEncoding::Lossless));
        let written = out.write_atomic(&path, true).await.unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk.len() as u64, written);
        assert!(on_disk.starts_with(b"%PDF-1.5"));
        assert!(!tmp.path().join("out.pdf.tmp").exists());
    }

    #[tokio::test]
    async fn write_into_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("out.pdf");
        let mut out = OutputDocument::new();
        out.push(composed("x", 20, 20, ImageEncoding::Lossless));
        let err = out.write_atomic(&path, true).await.unwrap_err();
        assert!(matches!(err, OcrPdfError::OutputWriteFailed { .. }));
    }

    #[test]
    fn temp_sibling_appends_suffix() {
        assert_eq!(
            temp_sibling(Path::new("/a/b/out.pdf")),
            PathBuf::from("/a/b/out.pdf.tmp")
        );
    }
}
