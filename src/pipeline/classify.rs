//! Scan classification: does a PDF carry a text layer, page by page?
//!
//! A page counts as *scanned* when its extracted text is empty after
//! trimming whitespace. The document is *fully scanned* only when every page
//! is; a document mixing text pages and image-only pages is not, and callers
//! that care read the per-page diagnostics.
//!
//! The verdict is advisory. It is logged and attached to the conversion
//! output but never selects the parse mode; that is the request's
//! `force_ocr` switch.
//!
//! ## Zero-page documents
//!
//! `scanned == total` is vacuously true for an empty document. An empty
//! document is reported as *not* fully scanned, with both counts at zero.

use crate::error::DocRouteError;
use crate::pdfium;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One page's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub index: usize,
    /// Extracted plain text, possibly empty.
    pub text: String,
}

impl Page {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// True when the page has no extractable text.
    pub fn is_scanned(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Per-page result of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDiagnostic {
    /// 1-based page number.
    pub page_num: usize,
    /// Whether the page has a text layer.
    pub has_text: bool,
}

/// Classification result for a whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub num_pages: usize,
    pub scanned_pages: usize,
    pub is_fully_scanned: bool,
    pub pages: Vec<PageDiagnostic>,
}

impl ScanVerdict {
    /// Classify a sequence of pages.
    pub fn from_pages<'a>(pages: impl IntoIterator<Item = &'a Page>) -> Self {
        let mut diagnostics = Vec::new();
        let mut scanned_pages = 0;

        for page in pages {
            let scanned = page.is_scanned();
            if scanned {
                scanned_pages += 1;
                debug!("Page {}: no text -> scanned page", page.index);
            } else {
                debug!("Page {}: has text -> text page", page.index);
            }
            diagnostics.push(PageDiagnostic {
                page_num: page.index,
                has_text: !scanned,
            });
        }

        let num_pages = diagnostics.len();
        if num_pages == 0 {
            warn!("Document has no pages; reporting it as not scanned");
        }

        Self {
            num_pages,
            scanned_pages,
            is_fully_scanned: num_pages > 0 && scanned_pages == num_pages,
            pages: diagnostics,
        }
    }

    /// Classify raw page texts, numbering pages from 1.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let pages: Vec<Page> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Page::new(i + 1, t.as_ref()))
            .collect();
        Self::from_pages(&pages)
    }

    /// 1-based numbers of the pages without a text layer.
    pub fn scanned_page_numbers(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| !p.has_text)
            .map(|p| p.page_num)
            .collect()
    }

    /// True when some but not all pages are scanned.
    pub fn is_mixed(&self) -> bool {
        self.scanned_pages > 0 && self.scanned_pages < self.num_pages
    }
}

/// Source of per-page plain text for a PDF.
pub trait PageTextSource: Send + Sync {
    /// Extract every page's text, in page order. Blocking.
    fn page_texts(&self, pdf: &Path) -> Result<Vec<String>, DocRouteError>;
}

/// [`PageTextSource`] backed by pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumTextSource;

impl PageTextSource for PdfiumTextSource {
    fn page_texts(&self, pdf: &Path) -> Result<Vec<String>, DocRouteError> {
        let pdfium = pdfium::bind()?;
        let document =
            pdfium
                .load_pdf_from_file(pdf, None)
                .map_err(|e| DocRouteError::CorruptPdf {
                    path: pdf.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;

        let mut texts = Vec::with_capacity(document.pages().len() as usize);
        for (idx, page) in document.pages().iter().enumerate() {
            let text = page.text().map_err(|e| DocRouteError::CorruptPdf {
                path: pdf.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;
            texts.push(text.all());
        }
        Ok(texts)
    }
}

/// Classify a PDF on disk. Text extraction runs on a blocking thread.
pub async fn classify_pdf(
    source: Arc<dyn PageTextSource>,
    pdf: &Path,
) -> Result<ScanVerdict, DocRouteError> {
    let path = pdf.to_path_buf();
    let texts = tokio::task::spawn_blocking(move || source.page_texts(&path))
        .await
        .map_err(|e| DocRouteError::Internal(format!("Classify task panicked: {}", e)))??;

    let verdict = ScanVerdict::from_texts(&texts);
    if verdict.is_fully_scanned {
        info!(
            "{}: fully scanned ({} pages, no text layer)",
            pdf.display(),
            verdict.num_pages
        );
    } else {
        info!(
            "{}: not fully scanned ({}/{} pages without text)",
            pdf.display(),
            verdict.scanned_pages,
            verdict.num_pages
        );
    }
    Ok(verdict)
}
