//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements one step and is testable on its own; the
//! orchestrator in [`crate::convert`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ classify ──▶ route ──▶ package ──▶ inline
//! (sniff)   (→ PDF)      (advisory)   (backend)  (zip)       (data URIs)
//! ```
//!
//! 1. [`input`]: check the path and sniff PDF / PNG / JPEG from magic bytes
//! 2. [`sanitize`]: filesystem-safe stem used for every derived file name
//! 3. [`normalize`]: write a canonical PDF beside the input; pdfium is not
//!    async-safe, so this runs in `spawn_blocking`
//! 4. [`classify`]: per-page text presence; logged and reported, never
//!    changes the parse mode
//! 5. [`route`]: pick the parse mode, prepare `<root>/<name>/<mode>/`,
//!    submit one job to the backend
//! 6. [`package`]: zip the backend's output directory
//! 7. [`inline`]: embed referenced images into the Markdown

pub mod classify;
pub mod inline;
pub mod input;
pub mod normalize;
pub mod package;
pub mod route;
pub mod sanitize;
