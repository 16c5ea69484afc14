//! Configuration types for document conversion.
//!
//! Process-wide behaviour lives in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. Everything that changes from one upload to the
//! next (the file, page count, OCR/formula/table switches, language) lives in
//! a [`ConversionRequest`] instead, so one [`crate::convert::Converter`] can
//! serve many requests.

use crate::error::DocRouteError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "./output";

/// Default number of pages converted per request.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Default language profile.
pub const DEFAULT_LANGUAGE: &str = "ch";

/// Configuration shared by every conversion a [`crate::convert::Converter`] runs.
///
/// # Example
/// ```rust
/// use docroute::{ArchivePolicy, ConversionConfig};
///
/// let config = ConversionConfig::builder()
///     .output_root("/tmp/docroute")
///     .archive_policy(ArchivePolicy::Abort)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 2);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory under which every request gets `<name>/<mode>/`. Default: `./output`.
    pub output_root: PathBuf,

    /// What to do when zipping the output directory fails. Default: [`ArchivePolicy::Degrade`].
    pub archive_policy: ArchivePolicy,

    /// How the archive file name is derived. Default: [`ArchiveNaming::Unique`].
    pub archive_naming: ArchiveNaming,

    /// Reject language codes missing from the language table before the
    /// backend is called. Default: true.
    ///
    /// When false, unknown codes are passed through and the backend is
    /// responsible for rejecting them.
    pub validate_language: bool,

    /// Run the scan classifier on the normalised PDF and attach the verdict
    /// to the output. Default: true.
    ///
    /// Purely diagnostic; the parse mode is still chosen by the request's
    /// `force_ocr` flag.
    pub diagnose_scan: bool,

    /// Maximum number of requests in flight for batch conversion. Default: 2.
    pub concurrency: usize,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            archive_policy: ArchivePolicy::default(),
            archive_naming: ArchiveNaming::default(),
            validate_language: true,
            diagnose_scan: true,
            concurrency: 2,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_root", &self.output_root)
            .field("archive_policy", &self.archive_policy)
            .field("archive_naming", &self.archive_naming)
            .field("validate_language", &self.validate_language)
            .field("diagnose_scan", &self.diagnose_scan)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn archive_policy(mut self, policy: ArchivePolicy) -> Self {
        self.config.archive_policy = policy;
        self
    }

    pub fn archive_naming(mut self, naming: ArchiveNaming) -> Self {
        self.config.archive_naming = naming;
        self
    }

    pub fn validate_language(mut self, v: bool) -> Self {
        self.config.validate_language = v;
        self
    }

    pub fn diagnose_scan(mut self, v: bool) -> Self {
        self.config.diagnose_scan = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocRouteError> {
        let c = &self.config;
        if c.output_root.as_os_str().is_empty() {
            return Err(DocRouteError::InvalidConfig(
                "Output root must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DocRouteError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Per-request knobs ────────────────────────────────────────────────────

/// Backend switches for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Always run OCR instead of letting the backend decide.
    pub force_ocr: bool,
    /// Enable formula recognition.
    pub formula_enable: bool,
    /// Enable table recognition.
    pub table_enable: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            force_ocr: false,
            formula_enable: true,
            table_enable: true,
        }
    }
}

/// One user conversion request.
///
/// `input` is optional: a request with nothing selected converts to
/// `Ok(None)`, matching an empty file picker.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// PDF, PNG or JPEG to convert.
    pub input: Option<PathBuf>,
    /// Convert pages `1..=max_pages`. Default: 10.
    pub max_pages: usize,
    /// Backend switches.
    pub options: ParseOptions,
    /// Language code or family selector. Default: `ch`.
    pub language: String,
}

impl Default for ConversionRequest {
    fn default() -> Self {
        Self {
            input: None,
            max_pages: DEFAULT_MAX_PAGES,
            options: ParseOptions::default(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl ConversionRequest {
    /// A request for `input` with default settings.
    pub fn new(input: impl AsRef<Path>) -> Self {
        Self {
            input: Some(input.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// A request with no file selected.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.max_pages = n;
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.options.force_ocr = v;
        self
    }

    pub fn formula(mut self, v: bool) -> Self {
        self.options.formula_enable = v;
        self
    }

    pub fn table(mut self, v: bool) -> Self {
        self.options.table_enable = v;
        self
    }

    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.language = code.into();
        self
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Backend processing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// The backend decides per document whether OCR is needed.
    Auto,
    /// Always run recognition.
    Ocr,
}

impl ParseMode {
    /// Select the mode from the caller's force-OCR switch.
    pub fn from_force_ocr(force_ocr: bool) -> Self {
        if force_ocr {
            ParseMode::Ocr
        } else {
            ParseMode::Auto
        }
    }

    /// Wire value understood by the backend; also the pipeline engine's
    /// output subdirectory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Auto => "auto",
            ParseMode::Ocr => "ocr",
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MinerU engine (`-b` / `backend` field).
///
/// The pipeline engine writes under `<name>/<auto|ocr>/`; every VLM engine
/// writes under `<name>/vlm/` whatever the parse mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    #[default]
    Pipeline,
    VlmTransformers,
    VlmSglangEngine,
    VlmSglangClient,
}

impl Engine {
    /// Wire value passed to MinerU.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Pipeline => "pipeline",
            Engine::VlmTransformers => "vlm-transformers",
            Engine::VlmSglangEngine => "vlm-sglang-engine",
            Engine::VlmSglangClient => "vlm-sglang-client",
        }
    }

    /// Directory under `<root>/<name>/` this engine writes into.
    pub fn output_subdir(&self, mode: ParseMode) -> &'static str {
        match self {
            Engine::Pipeline => mode.as_str(),
            _ => "vlm",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour when the output directory cannot be archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchivePolicy {
    /// Log a warning and deliver the Markdown without an archive. (default)
    #[default]
    Degrade,
    /// Fail the whole request.
    Abort,
}

/// How the archive file name is derived.
///
/// | Variant | Name | Collision behaviour |
/// |---------|------|---------------------|
/// | `PathHash` | `sha256(output dir path string)` | same output path → same archive, overwritten |
/// | `Unique` | `sha256(base name + request token)` | distinct per request |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveNaming {
    /// Hash of the textual output-directory path. Stable across reruns.
    PathHash,
    /// Hash of the base name plus a random per-request token. (default)
    #[default]
    Unique,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.output_root, PathBuf::from("./output"));
        assert_eq!(c.archive_policy, ArchivePolicy::Degrade);
        assert_eq!(c.archive_naming, ArchiveNaming::Unique);
        assert!(c.validate_language);
        assert!(c.diagnose_scan);
    }

    #[test]
    fn builder_rejects_zero_concurrency() {
        let err = ConversionConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, DocRouteError::InvalidConfig(_)), "{err}");
        assert_eq!(ConversionConfig::builder().concurrency(1).build().unwrap().concurrency, 1);
    }

    #[test]
    fn builder_rejects_empty_root() {
        let err = ConversionConfig::builder().output_root("").build().unwrap_err();
        assert!(matches!(err, DocRouteError::InvalidConfig(_)));
    }

    #[test]
    fn request_defaults_match_front_end() {
        let r = ConversionRequest::new("paper.pdf");
        assert_eq!(r.max_pages, 10);
        assert_eq!(r.language, "ch");
        assert!(!r.options.force_ocr);
        assert!(r.options.formula_enable);
        assert!(r.options.table_enable);
        assert!(ConversionRequest::empty().input.is_none());
    }

    #[test]
    fn parse_mode_from_flag() {
        assert_eq!(ParseMode::from_force_ocr(true), ParseMode::Ocr);
        assert_eq!(ParseMode::from_force_ocr(false), ParseMode::Auto);
        assert_eq!(ParseMode::Ocr.to_string(), "ocr");
        assert_eq!(serde_json::to_string(&ParseMode::Auto).unwrap(), "\"auto\"");
    }

    #[test]
    fn engine_output_subdir() {
        assert_eq!(Engine::default(), Engine::Pipeline);
        assert_eq!(Engine::Pipeline.output_subdir(ParseMode::Auto), "auto");
        assert_eq!(Engine::Pipeline.output_subdir(ParseMode::Ocr), "ocr");
        for engine in [
            Engine::VlmTransformers,
            Engine::VlmSglangEngine,
            Engine::VlmSglangClient,
        ] {
            assert_eq!(engine.output_subdir(ParseMode::Auto), "vlm");
            assert_eq!(engine.output_subdir(ParseMode::Ocr), "vlm");
        }
        assert_eq!(Engine::VlmSglangClient.to_string(), "vlm-sglang-client");
        assert_eq!(
            serde_json::to_string(&Engine::VlmTransformers).unwrap(),
            "\"vlm-transformers\""
        );
    }
}
