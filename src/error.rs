//! Error types for the docroute library.
//!
//! Two error types mirror the two boundaries a conversion crosses:
//!
//! * [`DocRouteError`]: **Fatal for one request**: the conversion cannot
//!   produce a renderable result (unreadable input, backend failure, missing
//!   image asset). Returned from [`crate::convert::Converter::convert`] and
//!   every pipeline stage.
//!
//! * [`BackendError`]: raised by a [`crate::backend::ParseBackend`]
//!   implementation. The parse router logs it with full request context and
//!   maps it to [`DocRouteError::BackendFailed`] / [`DocRouteError::BackendTimeout`].
//!
//! "No file selected" is deliberately *not* an error: the normaliser and the
//! orchestrator return `Ok(None)` for it.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docroute library.
#[derive(Debug, Error)]
pub enum DocRouteError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Path is empty or has no file-name component.
    #[error("Invalid input '{input}': expected a path to a file")]
    InvalidInput { input: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Input is neither a PDF, a PNG nor a JPEG.
    #[error("Unsupported input format for '{path}': first bytes {magic:?}\nSupported: .pdf, .png, .jpg, .jpeg")]
    UnsupportedFormat { path: PathBuf, magic: Vec<u8> },

    /// The document reader produced bytes that are not a PDF.
    #[error("Normalised document for '{path}' is not a PDF\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF / image errors ────────────────────────────────────────────────
    /// pdfium could not open the PDF.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Image could not be decoded or embedded into a PDF page.
    #[error("Image '{path}' could not be converted to PDF: {detail}")]
    ImageConversion { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or the directory containing it),\n\
or install pdfium system-wide so the platform loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// The parsing backend failed for this request.
    #[error("Parsing backend '{backend}' failed for '{name}': {detail}")]
    BackendFailed {
        backend: String,
        name: String,
        detail: String,
    },

    /// The parsing backend did not finish in time.
    #[error("Parsing backend '{backend}' timed out after {secs}s for '{name}'")]
    BackendTimeout {
        backend: String,
        name: String,
        secs: u64,
    },

    /// The backend reported success but the expected output file is absent.
    #[error("Backend output missing: '{path}'")]
    OutputMissing { path: PathBuf },

    // ── Packaging errors ──────────────────────────────────────────────────
    /// Archival failed and the configured policy is to abort.
    #[error("Failed to archive '{source_dir}' into '{archive}': {reason}")]
    ArchiveFailed {
        source_dir: PathBuf,
        archive: PathBuf,
        reason: String,
    },

    /// An image referenced from the Markdown could not be read.
    #[error("Image asset '{path}' referenced from Markdown could not be read: {source}")]
    AssetMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or request validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Language code is not in the language table.
    #[error("Unsupported language code '{code}'\nRun with --list-languages to see the accepted codes.")]
    InvalidLanguage { code: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocRouteError {
    /// Wrap an [`std::io::Error`] with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocRouteError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by a parsing backend implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend program or service could not be reached at all.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The backend did not finish within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backend's reply could not be understood.
    #[error("invalid reply: {0}")]
    InvalidReply(String),

    /// Local I/O while staging input or unpacking output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
