//! Format normalisation: every input becomes a PDF file on disk.
//!
//! The backend only accepts PDF bytes and the preview pane shows a PDF, so an
//! uploaded PNG/JPEG is wrapped into a one-page PDF first. The canonical copy
//! is written next to the original as `<safe stem>.pdf`; the original is
//! never modified or removed. When that name is the input itself and the
//! input is not really a PDF (an image saved as `.pdf`), the copy goes to
//! `<safe stem>.normalized.pdf` instead.

use crate::error::DocRouteError;
use crate::pdfium;
use crate::pipeline::input::{self, InputFormat};
use crate::pipeline::sanitize::safe_stem;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolution assumed for images without physical size information.
const IMAGE_DPI: f32 = 72.0;

/// Format-detecting reader returning PDF bytes for any supported input.
pub trait DocumentReader: Send + Sync {
    /// Read `path` and return equivalent PDF bytes. Blocking.
    fn read_as_pdf(&self, path: &Path) -> Result<Vec<u8>, DocRouteError>;
}

/// [`DocumentReader`] that passes PDFs through and wraps images with pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumReader;

impl DocumentReader for PdfiumReader {
    fn read_as_pdf(&self, path: &Path) -> Result<Vec<u8>, DocRouteError> {
        let format = input::detect_format(path)?;
        let bytes = std::fs::read(path).map_err(|e| DocRouteError::io(path, e))?;
        match format {
            InputFormat::Pdf => Ok(bytes),
            InputFormat::Png | InputFormat::Jpeg => image_to_pdf(path, &bytes),
        }
    }
}

/// Wrap an encoded image into a single-page PDF sized to the image.
fn image_to_pdf(path: &Path, bytes: &[u8]) -> Result<Vec<u8>, DocRouteError> {
    let conversion_err = |detail: String| DocRouteError::ImageConversion {
        path: path.to_path_buf(),
        detail,
    };

    let decoded = image::load_from_memory(bytes).map_err(|e| conversion_err(e.to_string()))?;
    // pdfium embeds RGB; drop any alpha channel up front.
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
    let width = PdfPoints::new(rgb.width() as f32 * 72.0 / IMAGE_DPI);
    let height = PdfPoints::new(rgb.height() as f32 * 72.0 / IMAGE_DPI);
    debug!(
        "Wrapping {}x{} px image into a {:.0}x{:.0} pt page",
        rgb.width(),
        rgb.height(),
        width.value,
        height.value
    );

    let pdfium = pdfium::bind()?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| conversion_err(format!("{:?}", e)))?;
    let mut page = document
        .pages_mut()
        .create_page_at_end(PdfPagePaperSize::Custom(width, height))
        .map_err(|e| conversion_err(format!("{:?}", e)))?;
    page.objects_mut()
        .create_image_object(PdfPoints::ZERO, PdfPoints::ZERO, &rgb, Some(width), Some(height))
        .map_err(|e| conversion_err(format!("{:?}", e)))?;

    document
        .save_to_bytes()
        .map_err(|e| conversion_err(format!("{:?}", e)))
}

/// Normalise `path` into a PDF beside it and return the new path.
///
/// `None` means nothing is selected yet and yields `Ok(None)`.
pub fn to_pdf(
    reader: &dyn DocumentReader,
    path: Option<&Path>,
) -> Result<Option<PathBuf>, DocRouteError> {
    let Some(path) = path else {
        return Ok(None);
    };

    let stem = safe_stem(path)?;
    let pdf_bytes = reader.read_as_pdf(path)?;
    if !input::is_pdf_bytes(&pdf_bytes) {
        let mut magic = [0u8; 4];
        let n = pdf_bytes.len().min(4);
        magic[..n].copy_from_slice(&pdf_bytes[..n]);
        return Err(DocRouteError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let mut target = parent.join(format!("{stem}.pdf"));

    if same_file(path, &target) {
        if input::detect_format(path)? == InputFormat::Pdf {
            debug!("{} is already canonical", path.display());
            return Ok(Some(target));
        }
        target = parent.join(format!("{stem}.normalized.pdf"));
    }

    std::fs::write(&target, &pdf_bytes).map_err(|e| DocRouteError::io(&target, e))?;
    info!(
        "Normalised {} → {} ({} bytes)",
        path.display(),
        target.display(),
        pdf_bytes.len()
    );
    Ok(Some(target))
}

/// Async wrapper around [`to_pdf`]; the read, conversion and write run on a
/// blocking thread.
pub async fn to_pdf_async(
    reader: Arc<dyn DocumentReader>,
    path: Option<&Path>,
) -> Result<Option<PathBuf>, DocRouteError> {
    let Some(path) = path.map(Path::to_path_buf) else {
        return Ok(None);
    };
    tokio::task::spawn_blocking(move || to_pdf(reader.as_ref(), Some(&path)))
        .await
        .map_err(|e| DocRouteError::Internal(format!("Normalise task panicked: {}", e)))?
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
