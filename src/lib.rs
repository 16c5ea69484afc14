//! # docroute
//!
//! Convert PDFs and page images to Markdown through an external document
//! parsing engine (MinerU), and package the result for download.
//!
//! ## Why this crate?
//!
//! Layout analysis, OCR, formula and table recognition are the hard part and
//! live in the parsing engine. What remains is plumbing that is easy to get
//! subtly wrong: accept an image or a PDF, give it a stable filesystem-safe
//! name, hand exactly the right job to the engine, then zip the output and
//! produce a self-contained Markdown string with images embedded. This crate
//! does that plumbing with typed errors and an injectable backend.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PNG / JPEG
//!  │
//!  ├─ 1. Normalize  write a canonical PDF beside the input (pdfium)
//!  ├─ 2. Classify   per-page text-layer check (advisory, logged)
//!  ├─ 3. Route      <root>/<name>/<mode>/ + one ParseJob to the backend
//!  ├─ 4. Archive    zip the output directory → <root>/<sha256>.zip
//!  ├─ 5. Inline     ![alt](images/x.jpg) → ![alt](data:image/jpeg;base64,…)
//!  └─ 6. Output     rendered Markdown, raw Markdown, archive, layout PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docroute::{ConversionConfig, ConversionRequest, Converter, LanguageTable, MineruCli};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(
//!         ConversionConfig::default(),
//!         Arc::new(LanguageTable::builtin()),
//!         Arc::new(MineruCli::default()),
//!     );
//!     let request = ConversionRequest::new("paper.pdf").language("en").max_pages(5);
//!     if let Some(output) = converter.convert(&request).await? {
//!         println!("{}", output.markdown);
//!         eprintln!("archive: {:?}", output.archive_path);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docroute` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docroute = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Talks to | Notes |
//! |---------|----------|-------|
//! | [`MineruCli`]  | `mineru` executable | input staged in a temp dir; optional timeout kills the child |
//! | [`MineruHttp`] | `mineru-api` service | multipart upload, zip reply unpacked into the output dir |
//!
//! Implement [`ParseBackend`] to plug in anything else.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod languages;
pub mod output;
pub mod pdfium;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{MineruCli, MineruHttp, OutputDirs, ParseBackend, ParseJob};
pub use config::{
    ArchiveNaming, ArchivePolicy, ConversionConfig, ConversionConfigBuilder, ConversionRequest,
    Engine, ParseMode, ParseOptions,
};
pub use convert::{inspect, inspect_with, Converter};
pub use error::{BackendError, DocRouteError};
pub use languages::{LanguageTable, ScriptFamily};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::classify::{PageDiagnostic, ScanVerdict};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use stream::{convert_stream, BatchItem, BatchStream};
