//! Parse routing: turn a normalised PDF into one backend job.
//!
//! The router picks the [`ParseMode`] from the caller's `force_ocr` switch,
//! derives a timestamped base name, prepares the directory the backend's
//! engine writes into (`<root>/<name>/<auto|ocr|vlm>/`) and submits exactly
//! one [`ParseJob`]. It never inspects the document itself.

use crate::backend::{OutputDirs, ParseBackend, ParseJob};
use crate::config::{ParseMode, ParseOptions};
use crate::error::{BackendError, DocRouteError};
use crate::pipeline::sanitize::safe_stem;
use chrono::{DateTime, Local, TimeZone};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// `strftime` pattern appended to the sanitised stem.
pub const TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M%S";

/// `<safe_stem>_<yymmdd_HHMMSS>` using the local clock.
pub fn base_name(path: &Path) -> Result<String, DocRouteError> {
    base_name_at(path, &Local::now())
}

/// [`base_name`] with an explicit timestamp.
pub fn base_name_at<Tz: TimeZone>(path: &Path, at: &DateTime<Tz>) -> Result<String, DocRouteError>
where
    Tz::Offset: std::fmt::Display,
{
    Ok(format!("{}_{}", safe_stem(path)?, at.format(TIMESTAMP_FORMAT)))
}

/// Map "convert pages 1..=N" onto the backend's inclusive 0-based end index.
pub fn last_page_index(max_pages: usize) -> Result<usize, DocRouteError> {
    max_pages.checked_sub(1).ok_or_else(|| {
        DocRouteError::InvalidConfig("max_pages must be at least 1".into())
    })
}

/// Everything the router needs for one document.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Normalised PDF on disk.
    pub pdf_path: PathBuf,
    pub output_root: PathBuf,
    /// Inclusive, 0-based.
    pub end_page_index: usize,
    pub options: ParseOptions,
    pub language: String,
}

/// Where the backend left its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    pub md_dir: PathBuf,
    pub image_dir: PathBuf,
    pub base_name: String,
    pub mode: ParseMode,
}

impl ParsedOutput {
    pub fn markdown_path(&self) -> PathBuf {
        self.md_dir.join(format!("{}.md", self.base_name))
    }

    pub fn layout_pdf_path(&self) -> PathBuf {
        self.md_dir.join(format!("{}_layout.pdf", self.base_name))
    }
}

/// Submits normalised PDFs to a [`ParseBackend`].
#[derive(Clone)]
pub struct ParseRouter {
    backend: Arc<dyn ParseBackend>,
}

impl std::fmt::Debug for ParseRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseRouter")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl ParseRouter {
    pub fn new(backend: Arc<dyn ParseBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Route one document. Failures are logged here with the request
    /// context before being returned.
    pub async fn route(&self, req: &RouteRequest) -> Result<ParsedOutput, DocRouteError> {
        let mode = ParseMode::from_force_ocr(req.options.force_ocr);
        let name = base_name(&req.pdf_path)?;

        let result = self.submit(req, &name, mode).await;
        if let Err(e) = &result {
            error!(
                "Parse failed for {} (name={}, mode={}, lang={}): {}",
                req.pdf_path.display(),
                name,
                mode,
                req.language,
                e
            );
        }
        result
    }

    async fn submit(
        &self,
        req: &RouteRequest,
        name: &str,
        mode: ParseMode,
    ) -> Result<ParsedOutput, DocRouteError> {
        tokio::fs::create_dir_all(&req.output_root)
            .await
            .map_err(|e| DocRouteError::io(&req.output_root, e))?;

        let engine = self.backend.engine();
        let subdir = engine.output_subdir(mode);
        let root = req.output_root.clone();
        let owned_name = name.to_string();
        let dirs = tokio::task::spawn_blocking(move || {
            OutputDirs::prepare_in(&root, &owned_name, subdir)
        })
        .await
        .map_err(|e| DocRouteError::Internal(format!("Prepare task panicked: {}", e)))?
        .map_err(|e| {
            DocRouteError::io(OutputDirs::layout_in(&req.output_root, name, subdir).md_dir, e)
        })?;

        let pdf_bytes = tokio::fs::read(&req.pdf_path)
            .await
            .map_err(|e| DocRouteError::io(&req.pdf_path, e))?;

        let job = ParseJob {
            output_root: req.output_root.clone(),
            file_name: name.to_string(),
            pdf_bytes,
            language: req.language.clone(),
            mode,
            engine,
            end_page_index: req.end_page_index,
            formula_enable: req.options.formula_enable,
            table_enable: req.options.table_enable,
        };

        info!(
            "Submitting '{}' to {} (engine={}, mode={}, lang={}, last page={})",
            name,
            self.backend.name(),
            engine,
            mode,
            req.language,
            req.end_page_index
        );
        self.backend
            .parse(&job)
            .await
            .map_err(|e| self.backend_error(name, e))?;

        Ok(ParsedOutput {
            md_dir: dirs.md_dir,
            image_dir: dirs.image_dir,
            base_name: name.to_string(),
            mode,
        })
    }

    fn backend_error(&self, name: &str, e: BackendError) -> DocRouteError {
        match e {
            BackendError::Timeout { secs } => DocRouteError::BackendTimeout {
                backend: self.backend.name().to_string(),
                name: name.to_string(),
                secs,
            },
            other => DocRouteError::BackendFailed {
                backend: self.backend.name().to_string(),
                name: name.to_string(),
                detail: other.to_string(),
            },
        }
    }
}
