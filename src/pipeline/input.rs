//! Input validation: check the user-supplied path and sniff its format.
//!
//! The file picker accepts `.pdf`, `.png`, `.jpg` and `.jpeg`, but the
//! extension is only a hint. The format is taken from the magic bytes so a
//! renamed file is still routed correctly and a non-document fails early
//! with a readable error instead of deep inside pdfium.

use crate::error::DocRouteError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Formats accepted as conversion input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Pdf,
    Png,
    Jpeg,
}

impl InputFormat {
    pub fn is_image(&self) -> bool {
        matches!(self, InputFormat::Png | InputFormat::Jpeg)
    }
}

/// Sniff the format from the first bytes of a file.
pub fn sniff(bytes: &[u8]) -> Option<InputFormat> {
    if bytes.starts_with(PDF_MAGIC) {
        Some(InputFormat::Pdf)
    } else if bytes.starts_with(PNG_MAGIC) {
        Some(InputFormat::Png)
    } else if bytes.starts_with(JPEG_MAGIC) {
        Some(InputFormat::Jpeg)
    } else {
        None
    }
}

/// Check whether `bytes` begin with the PDF header.
pub fn is_pdf_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Validate that `path` is a readable file and detect its format.
pub fn detect_format(path: &Path) -> Result<InputFormat, DocRouteError> {
    if !path.exists() {
        return Err(DocRouteError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut header = Vec::with_capacity(8);
    match std::fs::File::open(path) {
        Ok(f) => {
            f.take(8)
                .read_to_end(&mut header)
                .map_err(|e| DocRouteError::io(path, e))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocRouteError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(DocRouteError::io(path, e)),
    }

    let format = sniff(&header).ok_or_else(|| DocRouteError::UnsupportedFormat {
        path: path.to_path_buf(),
        magic: header.clone(),
    })?;

    debug!("Detected {:?} input: {}", format, path.display());
    Ok(format)
}
