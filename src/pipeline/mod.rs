//! Pipeline stages for image/PDF-to-searchable-PDF conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (a different OCR engine, a mock rasterizer in tests)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──────▶ compose ──▶ assemble
//! (files)   (bitmap)   (words+bbox) (PDF page)  (PDF file)
//!                 └──▶ encode (PNG for OCR, JPEG/raw for the page image)
//! ```
//!
//! 1. [`input`]    — enumerate and classify input files, validate the output path
//! 2. [`render`]   — rasterise one page; runs in `spawn_blocking` because
//!    pdfium and image decoding are CPU-bound
//! 3. [`ocr`]      — run Tesseract and parse word boxes from its TSV output
//! 4. [`compose`]  — lay the raster and an invisible text layer onto one page
//! 5. [`assemble`] — serialise all pages in order and write atomically

pub mod assemble;
pub mod compose;
pub mod encode;
pub mod input;
pub mod ocr;
pub mod render;
