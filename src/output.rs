//! Output types returned by a conversion.

use crate::config::ParseMode;
use crate::pipeline::classify::ScanVerdict;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a finished conversion delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Markdown with every relative image reference embedded as a data URI.
    /// Not serialised: it duplicates `markdown` plus the images.
    #[serde(skip)]
    pub rendered_markdown: String,

    /// Markdown exactly as the backend wrote it.
    pub markdown: String,

    /// Zip of the output directory; `None` when archival failed under
    /// [`crate::config::ArchivePolicy::Degrade`].
    pub archive_path: Option<PathBuf>,

    /// Layout-annotated PDF written by the backend.
    pub layout_pdf_path: PathBuf,

    /// `<output_dir>/<base_name>.md`
    pub markdown_path: PathBuf,

    /// `<output_root>/<base_name>/<mode>/`
    pub output_dir: PathBuf,

    /// `<safe stem>_<yymmdd_HHMMSS>`
    pub base_name: String,

    pub mode: ParseMode,

    /// Scan classification of the normalised PDF, when enabled.
    pub scan: Option<ScanVerdict>,

    pub stats: ConversionStats,
}

/// Timing and size figures for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Wall-clock time for the whole request.
    pub total_duration_ms: u64,
    pub normalize_duration_ms: u64,
    pub classify_duration_ms: u64,
    /// Time spent waiting for the backend.
    pub parse_duration_ms: u64,
    pub archive_duration_ms: u64,
    pub inline_duration_ms: u64,
    /// Number of files in the archive (0 when none was written).
    pub archive_entries: usize,
    /// Size of the raw Markdown in bytes.
    pub markdown_bytes: usize,
    /// Size of the image-inlined Markdown in bytes.
    pub rendered_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_skips_rendered_markdown() {
        let out = ConversionOutput {
            rendered_markdown: "![](data:image/png;base64,AAAA)".into(),
            markdown: "![](images/a.png)".into(),
            archive_path: None,
            layout_pdf_path: "out/a/auto/a_layout.pdf".into(),
            markdown_path: "out/a/auto/a.md".into(),
            output_dir: "out/a/auto".into(),
            base_name: "a".into(),
            mode: ParseMode::Auto,
            scan: None,
            stats: ConversionStats::default(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("rendered_markdown").is_none());
        assert_eq!(json["mode"], "auto");
        assert!(json["archive_path"].is_null());
    }
}
