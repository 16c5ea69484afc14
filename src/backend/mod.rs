//! Parsing backends: the black-box engine that turns a PDF into Markdown.
//!
//! Recognition itself (layout, OCR, formulas, tables) happens outside this
//! crate. A [`ParseBackend`] receives one [`ParseJob`] and must leave its
//! output in the directory layout described by [`OutputDirs`]:
//!
//! ```text
//! <output_root>/<name>/<subdir>/       subdir: auto | ocr | vlm
//!     <name>.md            Markdown with relative image links
//!     <name>_layout.pdf    layout-annotated PDF
//!     images/…             extracted figures
//!     …                    auxiliary metadata (json, etc.)
//! ```
//!
//! `<subdir>` comes from [`Engine::output_subdir`].
//!
//! Two implementations ship with the crate:
//!
//! * [`cli::MineruCli`]: runs the `mineru` command-line tool
//! * [`http::MineruHttp`]: calls a `mineru-api` service

pub mod cli;
pub mod http;

use crate::config::{Engine, ParseMode};
use crate::error::BackendError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use cli::MineruCli;
pub use http::MineruHttp;

/// One request to the parsing backend. Consumed once.
#[derive(Clone)]
pub struct ParseJob {
    /// Root under which `<file_name>/<subdir>/` is written.
    pub output_root: PathBuf,
    /// Base name of the single document (no extension).
    pub file_name: String,
    /// PDF bytes of the document.
    pub pdf_bytes: Vec<u8>,
    /// Language code or family selector.
    pub language: String,
    pub mode: ParseMode,
    /// Engine that runs the job; decides the output subdirectory.
    pub engine: Engine,
    /// Last page to parse, 0-based and inclusive.
    pub end_page_index: usize,
    pub formula_enable: bool,
    pub table_enable: bool,
}

impl std::fmt::Debug for ParseJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseJob")
            .field("output_root", &self.output_root)
            .field("file_name", &self.file_name)
            .field("pdf_bytes", &format_args!("<{} bytes>", self.pdf_bytes.len()))
            .field("language", &self.language)
            .field("mode", &self.mode)
            .field("engine", &self.engine)
            .field("end_page_index", &self.end_page_index)
            .field("formula_enable", &self.formula_enable)
            .field("table_enable", &self.table_enable)
            .finish()
    }
}

impl ParseJob {
    /// Where this job's output is expected.
    pub fn output_dirs(&self) -> OutputDirs {
        OutputDirs::layout_in(
            &self.output_root,
            &self.file_name,
            self.engine.output_subdir(self.mode),
        )
    }
}

/// The two directories a backend writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    /// Extracted images.
    pub image_dir: PathBuf,
    /// Markdown, layout PDF and auxiliary files.
    pub md_dir: PathBuf,
}

impl OutputDirs {
    /// Pipeline-engine layout `<root>/<name>/<mode>/`, computed without
    /// touching the filesystem.
    pub fn layout(output_root: &Path, name: &str, mode: ParseMode) -> Self {
        Self::layout_in(output_root, name, mode.as_str())
    }

    /// Layout `<root>/<name>/<subdir>/`.
    pub fn layout_in(output_root: &Path, name: &str, subdir: &str) -> Self {
        let md_dir = output_root.join(name).join(subdir);
        let image_dir = md_dir.join("images");
        Self { image_dir, md_dir }
    }

    /// Pipeline-engine layout, with both directories created.
    pub fn prepare(output_root: &Path, name: &str, mode: ParseMode) -> std::io::Result<Self> {
        Self::prepare_in(output_root, name, mode.as_str())
    }

    /// [`OutputDirs::layout_in`], with both directories created.
    pub fn prepare_in(output_root: &Path, name: &str, subdir: &str) -> std::io::Result<Self> {
        let dirs = Self::layout_in(output_root, name, subdir);
        std::fs::create_dir_all(&dirs.image_dir)?;
        debug!("Prepared output directory {}", dirs.md_dir.display());
        Ok(dirs)
    }

    /// `<md_dir>/<name>.md`
    pub fn markdown_path(&self, name: &str) -> PathBuf {
        self.md_dir.join(format!("{name}.md"))
    }

    /// `<md_dir>/<name>_layout.pdf`
    pub fn layout_pdf_path(&self, name: &str) -> PathBuf {
        self.md_dir.join(format!("{name}_layout.pdf"))
    }
}

/// A document-parsing engine.
#[async_trait]
pub trait ParseBackend: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Engine this backend runs; the router stamps it on every job.
    fn engine(&self) -> Engine {
        Engine::Pipeline
    }

    /// Parse one document, writing into `job.output_dirs()`.
    async fn parse(&self, job: &ParseJob) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_name_and_mode() {
        let d = OutputDirs::layout(Path::new("out"), "paper_250101_101010", ParseMode::Ocr);
        assert_eq!(d.md_dir, PathBuf::from("out/paper_250101_101010/ocr"));
        assert_eq!(d.image_dir, PathBuf::from("out/paper_250101_101010/ocr/images"));
        assert_eq!(
            d.markdown_path("paper_250101_101010"),
            PathBuf::from("out/paper_250101_101010/ocr/paper_250101_101010.md")
        );
        assert_eq!(
            d.layout_pdf_path("p"),
            PathBuf::from("out/paper_250101_101010/ocr/p_layout.pdf")
        );
    }

    #[test]
    fn prepare_creates_directories() {
        let root = tempfile::tempdir().unwrap();
        let d = OutputDirs::prepare(root.path(), "doc", ParseMode::Auto).unwrap();
        assert!(d.md_dir.is_dir());
        assert!(d.image_dir.is_dir());
        // Idempotent.
        OutputDirs::prepare(root.path(), "doc", ParseMode::Auto).unwrap();
    }

    #[test]
    fn job_debug_hides_bytes() {
        let job = ParseJob {
            output_root: "out".into(),
            file_name: "a".into(),
            pdf_bytes: vec![0; 1024],
            language: "en".into(),
            mode: ParseMode::Auto,
            engine: Engine::Pipeline,
            end_page_index: 4,
            formula_enable: true,
            table_enable: false,
        };
        let s = format!("{job:?}");
        assert!(s.contains("<1024 bytes>"));
        assert_eq!(job.output_dirs().md_dir, PathBuf::from("out/a/auto"));
    }

    #[test]
    fn vlm_jobs_expect_vlm_subdir() {
        let job = ParseJob {
            output_root: "out".into(),
            file_name: "a".into(),
            pdf_bytes: Vec::new(),
            language: "en".into(),
            mode: ParseMode::Ocr,
            engine: Engine::VlmTransformers,
            end_page_index: 0,
            formula_enable: true,
            table_enable: true,
        };
        let dirs = job.output_dirs();
        assert_eq!(dirs.md_dir, PathBuf::from("out/a/vlm"));
        assert_eq!(dirs.markdown_path("a"), PathBuf::from("out/a/vlm/a.md"));
    }
}
