//! Input discovery: classify files and enumerate a file or directory into an
//! ordered list of [`InputItem`]s; pre-flight check of the output path.
//!
//! Classification happens exactly once per file, by extension, and yields a
//! [`FileKind`]. Later stages only ever see [`InputItem`]s whose kind is
//! already known to be supported, so no stage has to "try to open as X".
//!
//! Both checks here run before any page is rendered: a bad input or output
//! path must fail the run without wasting OCR time or leaving partial files.

use crate::error::OcrPdfError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extensions accepted as raster images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

/// Extension accepted as a PDF document.
pub const PDF_EXTENSION: &str = "pdf";

/// Result of classifying a path by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    PdfDocument,
    Unsupported,
}

/// Kind of a supported input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Single-page raster image.
    Image,
    /// PDF document with one or more pages.
    Pdf,
}

impl FileKind {
    /// Map to the supported input kind, if any.
    pub fn input_kind(self) -> Option<InputKind> {
        match self {
            FileKind::Image => Some(InputKind::Image),
            FileKind::PdfDocument => Some(InputKind::Pdf),
            FileKind::Unsupported => None,
        }
    }
}

/// One file queued for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputItem {
    pub path: PathBuf,
    pub kind: InputKind,
}

impl InputItem {
    pub fn new(path: impl Into<PathBuf>, kind: InputKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// File name used in logs and progress output.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Label for one page of this item, e.g. `scan.pdf p3` (1-indexed).
    pub fn page_label(&self, page_index: usize) -> String {
        match self.kind {
            InputKind::Image => self.display_name(),
            InputKind::Pdf => format!("{} p{}", self.display_name(), page_index + 1),
        }
    }
}

/// Classify a path by its (case-insensitive) extension.
pub fn classify(path: &Path) -> FileKind {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
        None => return FileKind::Unsupported,
    };
    if ext == PDF_EXTENSION {
        FileKind::PdfDocument
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        FileKind::Image
    } else {
        FileKind::Unsupported
    }
}

/// Enumerate the input path into an ordered list of items.
///
/// * A single file becomes a one-element list; an unsupported extension is
///   fatal ([`OcrPdfError::UnsupportedFormat`]).
/// * A directory is listed in lexicographic order (by path relative to the
///   directory). Unsupported files are skipped silently. `exclude` (the
///   resolved output file) is never returned, so writing the output into the
///   input directory does not feed it back in on the next run.
pub fn enumerate_inputs(
    input: &Path,
    recursive: bool,
    exclude: Option<&Path>,
) -> Result<Vec<InputItem>, OcrPdfError> {
    if !input.exists() {
        return Err(OcrPdfError::InputNotFound {
            path: input.to_path_buf(),
        });
    }

    if input.is_dir() {
        return enumerate_directory(input, recursive, exclude);
    }

    // Check read permission by attempting to open
    if let Err(e) = fs::File::open(input) {
        return Err(map_io_error(input, e));
    }

    match classify(input).input_kind() {
        Some(kind) => {
            debug!("Resolved single input: {}", input.display());
            Ok(vec![InputItem::new(input, kind)])
        }
        None => Err(OcrPdfError::UnsupportedFormat {
            path: input.to_path_buf(),
        }),
    }
}

fn enumerate_directory(
    dir: &Path,
    recursive: bool,
    exclude: Option<&Path>,
) -> Result<Vec<InputItem>, OcrPdfError> {
    let mut relative: Vec<PathBuf> = Vec::new();
    collect_files(dir, Path::new(""), recursive, &mut relative)?;
    relative.sort();

    let excluded = exclude.and_then(|p| fs::canonicalize(p).ok());

    let mut items = Vec::new();
    let mut skipped = 0usize;
    for rel in relative {
        let path = dir.join(&rel);
        let Some(kind) = classify(&path).input_kind() else {
            skipped += 1;
            continue;
        };
        if let Some(ref out) = excluded {
            if fs::canonicalize(&path).ok().as_ref() == Some(out) {
                debug!("Skipping output file found in input directory: {}", path.display());
                continue;
            }
        }
        items.push(InputItem::new(path, kind));
    }

    if items.is_empty() {
        return Err(OcrPdfError::NoSupportedFiles {
            path: dir.to_path_buf(),
        });
    }

    info!(
        "Found {} supported file(s) in {} ({} skipped)",
        items.len(),
        dir.display(),
        skipped
    );
    Ok(items)
}

/// Collect regular files below `root/rel`, as paths relative to `root`.
fn collect_files(
    root: &Path,
    rel: &Path,
    recursive: bool,
    out: &mut Vec<PathBuf>,
) -> Result<(), OcrPdfError> {
    let dir = root.join(rel);
    let entries = fs::read_dir(&dir).map_err(|e| map_io_error(&dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| map_io_error(&dir, e))?;
        let file_type = entry.file_type().map_err(|e| map_io_error(&entry.path(), e))?;
        let child = rel.join(entry.file_name());

        if file_type.is_dir() {
            if recursive {
                collect_files(root, &child, recursive, out)?;
            }
        } else if entry.path().is_file() {
            out.push(child);
        }
    }
    Ok(())
}

fn map_io_error(path: &Path, e: io::Error) -> OcrPdfError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => OcrPdfError::PermissionDenied {
            path: path.to_path_buf(),
        },
        io::ErrorKind::NotFound => OcrPdfError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => OcrPdfError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    }
}

/// Validate and normalise the output path before any work starts.
///
/// * A missing or different extension is replaced with `.pdf`.
/// * An existing directory is rejected.
/// * The parent directory must already exist; nothing is created here.
pub fn prepare_output_path(output: &Path) -> Result<PathBuf, OcrPdfError> {
    let invalid = |path: &Path, reason: &str| OcrPdfError::OutputPathInvalid {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if output.as_os_str().is_empty() {
        return Err(invalid(output, "path is empty"));
    }
    if output.is_dir() {
        return Err(invalid(
            output,
            "is an existing directory; give a file path such as out.pdf",
        ));
    }

    let is_pdf = output
        .extension()
        .map(|e| e.eq_ignore_ascii_case(PDF_EXTENSION))
        .unwrap_or(false);
    let path = if is_pdf {
        output.to_path_buf()
    } else {
        let with_ext = output.with_extension(PDF_EXTENSION);
        info!("Adding .pdf extension to output path: {}", with_ext.display());
        with_ext
    };

    if path.is_dir() {
        return Err(invalid(&path, "is an existing directory"));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(invalid(&path, "parent directory does not exist"));
        }
    }

    Ok(path)
}
