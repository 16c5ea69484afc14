//! The conversion orchestrator.
//!
//! A [`Converter`] owns everything a request needs: the configuration, the
//! language table, the document reader, the page-text source and the parsing
//! backend. Collaborators are injected at construction so tests can swap any
//! of them; the defaults bind pdfium at call time.
//!
//! One request runs its stages strictly in order and stops at the first
//! fatal failure. Nothing is retried and partial output stays on disk.

use crate::backend::ParseBackend;
use crate::config::{ArchivePolicy, ConversionConfig, ConversionRequest};
use crate::error::DocRouteError;
use crate::languages::LanguageTable;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::classify::{self, PageTextSource, PdfiumTextSource, ScanVerdict};
use crate::pipeline::input::{self, InputFormat};
use crate::pipeline::normalize::{self, DocumentReader, PdfiumReader};
use crate::pipeline::package::{self, ArchiveStatus};
use crate::pipeline::route::{last_page_index, ParseRouter, RouteRequest};
use crate::pipeline::inline;
use crate::progress::{ProgressCallback, Stage};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs conversion requests against one backend.
pub struct Converter {
    config: ConversionConfig,
    languages: Arc<LanguageTable>,
    reader: Arc<dyn DocumentReader>,
    text_source: Arc<dyn PageTextSource>,
    router: ParseRouter,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Create a converter using pdfium for normalisation and classification.
    pub fn new(
        config: ConversionConfig,
        languages: Arc<LanguageTable>,
        backend: Arc<dyn ParseBackend>,
    ) -> Self {
        Self {
            config,
            languages,
            reader: Arc::new(PdfiumReader),
            text_source: Arc::new(PdfiumTextSource),
            router: ParseRouter::new(backend),
        }
    }

    /// Replace the document reader used by normalisation.
    pub fn with_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Replace the page-text source used by scan classification.
    pub fn with_text_source(mut self, source: Arc<dyn PageTextSource>) -> Self {
        self.text_source = source;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    /// Convert one request.
    ///
    /// # Returns
    /// `Ok(None)` when the request has no input selected, otherwise the
    /// finished [`ConversionOutput`].
    ///
    /// # Errors
    /// The first fatal stage failure: unreadable or unsupported input,
    /// unknown language, backend failure, missing Markdown or image asset,
    /// and archival failure under [`ArchivePolicy::Abort`].
    pub async fn convert(
        &self,
        request: &ConversionRequest,
    ) -> Result<Option<ConversionOutput>, DocRouteError> {
        let Some(input) = request.input.as_deref() else {
            debug!("No input selected; nothing to convert");
            return Ok(None);
        };

        let reporter = Reporter {
            callback: self.config.progress_callback.as_ref(),
            name: input.display().to_string(),
        };
        reporter.conversion_start();
        let result = self.run(input, request, &reporter).await;
        reporter.conversion_complete(result.is_ok());
        result.map(Some)
    }

    /// Convert one request and write the image-inlined Markdown to
    /// `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn convert_to_file(
        &self,
        request: &ConversionRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<Option<ConversionOutput>, DocRouteError> {
        let Some(output) = self.convert(request).await? else {
            return Ok(None);
        };
        let path = output_path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocRouteError::io(path, e))?;
        }

        let tmp_path = path.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, &output.rendered_markdown)
            .await
            .map_err(|e| DocRouteError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| DocRouteError::io(path, e))?;

        info!("Wrote rendered Markdown to {}", path.display());
        Ok(Some(output))
    }

    /// Synchronous wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn convert_sync(
        &self,
        request: &ConversionRequest,
    ) -> Result<Option<ConversionOutput>, DocRouteError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| DocRouteError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(request))
    }

    async fn run(
        &self,
        input: &Path,
        request: &ConversionRequest,
        reporter: &Reporter<'_>,
    ) -> Result<ConversionOutput, DocRouteError> {
        let total_start = Instant::now();
        info!("Starting conversion: {}", input.display());

        // ── Step 1: Validate request ─────────────────────────────────────────
        let end_page_index = last_page_index(request.max_pages)?;
        let language = if self.config.validate_language {
            self.languages.validate(&request.language)?.to_string()
        } else {
            request.language.clone()
        };

        // ── Step 2: Normalise to PDF ─────────────────────────────────────────
        let (pdf_path, normalize_duration_ms) = reporter
            .stage(Stage::Normalize, async {
                normalize::to_pdf_async(Arc::clone(&self.reader), Some(input))
                    .await?
                    .ok_or_else(|| DocRouteError::Internal("Normaliser returned no path".into()))
            })
            .await?;

        // ── Step 3: Classify (advisory) ──────────────────────────────────────
        let mut classify_duration_ms = 0;
        let scan = if self.config.diagnose_scan {
            reporter.start(Stage::Classify);
            let started = Instant::now();
            match classify::classify_pdf(Arc::clone(&self.text_source), &pdf_path).await {
                Ok(verdict) => {
                    classify_duration_ms = elapsed_ms(started);
                    reporter.complete(Stage::Classify, classify_duration_ms);
                    if verdict.is_fully_scanned && !request.options.force_ocr {
                        info!(
                            "{} has no text layer; the backend decides on OCR in auto mode",
                            pdf_path.display()
                        );
                    }
                    Some(verdict)
                }
                Err(e) => {
                    warn!("Scan classification skipped for {}: {}", pdf_path.display(), e);
                    reporter.error(Stage::Classify, &e.to_string());
                    None
                }
            }
        } else {
            None
        };

        // ── Step 4: Route to the backend ─────────────────────────────────────
        let route_request = RouteRequest {
            pdf_path: pdf_path.clone(),
            output_root: self.config.output_root.clone(),
            end_page_index,
            options: request.options,
            language,
        };
        let (parsed, parse_duration_ms) = reporter
            .stage(Stage::Parse, self.router.route(&route_request))
            .await?;

        // ── Step 5: Archive the output directory ─────────────────────────────
        let archive_dest = self.config.output_root.join(package::archive_file_name(
            self.config.archive_naming,
            &parsed.md_dir,
            &parsed.base_name,
        ));
        reporter.start(Stage::Archive);
        let started = Instant::now();
        let status =
            package::compress_directory_to_zip_async(parsed.md_dir.clone(), archive_dest.clone())
                .await;
        let archive_duration_ms = elapsed_ms(started);
        let (archive_path, archive_entries) = match status {
            ArchiveStatus::Created { entries } => {
                reporter.complete(Stage::Archive, archive_duration_ms);
                (Some(archive_dest), entries)
            }
            ArchiveStatus::Failed { reason } => {
                reporter.error(Stage::Archive, &reason);
                match self.config.archive_policy {
                    ArchivePolicy::Degrade => {
                        warn!(
                            "Continuing without archive for '{}': {}",
                            parsed.base_name, reason
                        );
                        (None, 0)
                    }
                    ArchivePolicy::Abort => {
                        return Err(DocRouteError::ArchiveFailed {
                            source_dir: parsed.md_dir.clone(),
                            archive: archive_dest,
                            reason,
                        });
                    }
                }
            }
        };

        // ── Step 6: Read the backend's Markdown ──────────────────────────────
        let markdown_path = parsed.markdown_path();
        let markdown = tokio::fs::read_to_string(&markdown_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DocRouteError::OutputMissing {
                    path: markdown_path.clone(),
                },
                _ => DocRouteError::io(&markdown_path, e),
            })?;

        let layout_pdf_path = parsed.layout_pdf_path();
        if !layout_pdf_path.exists() {
            warn!("Backend wrote no layout PDF at {}", layout_pdf_path.display());
        }

        // ── Step 7: Inline images ────────────────────────────────────────────
        let (rendered_markdown, inline_duration_ms) = reporter
            .stage(
                Stage::Inline,
                inline::inline_images_async(markdown.clone(), parsed.md_dir.clone()),
            )
            .await?;

        let stats = ConversionStats {
            total_duration_ms: elapsed_ms(total_start),
            normalize_duration_ms,
            classify_duration_ms,
            parse_duration_ms,
            archive_duration_ms,
            inline_duration_ms,
            archive_entries,
            markdown_bytes: markdown.len(),
            rendered_bytes: rendered_markdown.len(),
        };

        info!(
            "Conversion complete: '{}' ({} mode) in {}ms",
            parsed.base_name, parsed.mode, stats.total_duration_ms
        );

        Ok(ConversionOutput {
            rendered_markdown,
            markdown,
            archive_path,
            layout_pdf_path,
            markdown_path,
            output_dir: parsed.md_dir,
            base_name: parsed.base_name,
            mode: parsed.mode,
            scan,
            stats,
        })
    }
}

/// Classify a document without converting it, using pdfium.
///
/// Does not require a parsing backend. An image input has no text layer and
/// is reported as a single scanned page.
pub async fn inspect(path: impl AsRef<Path>) -> Result<ScanVerdict, DocRouteError> {
    inspect_with(Arc::new(PdfiumTextSource), path).await
}

/// [`inspect`] with an explicit page-text source.
pub async fn inspect_with(
    source: Arc<dyn PageTextSource>,
    path: impl AsRef<Path>,
) -> Result<ScanVerdict, DocRouteError> {
    let path = path.as_ref();
    match input::detect_format(path)? {
        InputFormat::Pdf => classify::classify_pdf(source, path).await,
        InputFormat::Png | InputFormat::Jpeg => Ok(ScanVerdict::from_texts(&[""])),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Forwards stage events to the configured callback, if any.
struct Reporter<'a> {
    callback: Option<&'a ProgressCallback>,
    name: String,
}

impl Reporter<'_> {
    fn conversion_start(&self) {
        if let Some(cb) = self.callback {
            cb.on_conversion_start(&self.name);
        }
    }

    fn conversion_complete(&self, success: bool) {
        if let Some(cb) = self.callback {
            cb.on_conversion_complete(&self.name, success);
        }
    }

    fn start(&self, stage: Stage) {
        debug!("{}: {} started", self.name, stage);
        if let Some(cb) = self.callback {
            cb.on_stage_start(&self.name, stage);
        }
    }

    fn complete(&self, stage: Stage, elapsed_ms: u64) {
        debug!("{}: {} finished in {}ms", self.name, stage, elapsed_ms);
        if let Some(cb) = self.callback {
            cb.on_stage_complete(&self.name, stage, elapsed_ms);
        }
    }

    fn error(&self, stage: Stage, error: &str) {
        if let Some(cb) = self.callback {
            cb.on_stage_error(&self.name, stage, error);
        }
    }

    /// Run one fatal stage, reporting its start and outcome.
    async fn stage<T, F>(&self, stage: Stage, fut: F) -> Result<(T, u64), DocRouteError>
    where
        F: Future<Output = Result<T, DocRouteError>>,
    {
        self.start(stage);
        let started = Instant::now();
        match fut.await {
            Ok(value) => {
                let ms = elapsed_ms(started);
                self.complete(stage, ms);
                Ok((value, ms))
            }
            Err(e) => {
                self.error(stage, &e.to_string());
                Err(e)
            }
        }
    }
}
