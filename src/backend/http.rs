//! Backend that calls a running `mineru-api` service.
//!
//! The document is posted as multipart form data to `{base_url}/file_parse`
//! with `response_format_zip=true`. The service answers with a zip whose
//! entries sit under `<name>/<subdir>/` (`auto`, `ocr` or `vlm`); they are
//! unpacked into the job's `md_dir` with that prefix removed.

use super::{ParseBackend, ParseJob};
use crate::config::Engine;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Default service address of `mineru-api`.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// [`ParseBackend`] posting documents to a `mineru-api` service.
#[derive(Debug, Clone)]
pub struct MineruHttp {
    base_url: String,
    engine: Engine,
    timeout: Option<Duration>,
}

impl Default for MineruHttp {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl MineruHttp {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            engine: Engine::default(),
            timeout: None,
        }
    }

    /// MinerU engine sent as the `backend` field. Default: [`Engine::Pipeline`].
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Overall request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/file_parse", self.base_url)
    }

    /// Text fields of the multipart form, in send order.
    pub fn form_fields(&self, job: &ParseJob) -> Vec<(&'static str, String)> {
        vec![
            ("lang_list", job.language.clone()),
            ("backend", self.engine.as_str().to_string()),
            ("parse_method", job.mode.as_str().to_string()),
            ("formula_enable", job.formula_enable.to_string()),
            ("table_enable", job.table_enable.to_string()),
            ("start_page_id", "0".to_string()),
            ("end_page_id", job.end_page_index.to_string()),
            ("return_md", "true".to_string()),
            ("return_images", "true".to_string()),
            ("response_format_zip", "true".to_string()),
        ]
    }

    fn form(&self, job: &ParseJob) -> Result<Form, BackendError> {
        let file = Part::bytes(job.pdf_bytes.clone())
            .file_name(format!("{}.pdf", job.file_name))
            .mime_str("application/pdf")
            .map_err(|e| BackendError::Failed(e.to_string()))?;
        let mut form = Form::new().part("files", file);
        for (key, value) in self.form_fields(job) {
            form = form.text(key, value);
        }
        Ok(form)
    }

    fn map_reqwest(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                secs: self.timeout.map(|t| t.as_secs()).unwrap_or(0),
            }
        } else if e.is_connect() {
            BackendError::Unavailable(format!("{}: {}", self.base_url, e))
        } else {
            BackendError::Failed(e.to_string())
        }
    }
}

#[async_trait]
impl ParseBackend for MineruHttp {
    fn name(&self) -> &str {
        "mineru-api"
    }

    fn engine(&self) -> Engine {
        self.engine
    }

    async fn parse(&self, job: &ParseJob) -> Result<(), BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Failed(e.to_string()))?;

        let url = self.endpoint();
        debug!("POST {} for '{}'", url, job.file_name);
        let response = client
            .post(&url)
            .multipart(self.form(job)?)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(500).collect();
            return Err(BackendError::Failed(format!("HTTP {}: {}", status, body)));
        }

        let bytes = response.bytes().await.map_err(|e| self.map_reqwest(e))?;
        let md_dir = job.output_dirs().md_dir;
        let name = job.file_name.clone();
        let subdir = job.engine.output_subdir(job.mode);
        let written =
            tokio::task::spawn_blocking(move || unpack_reply(&bytes, &name, subdir, &md_dir))
            .await
            .map_err(|e| BackendError::Failed(format!("Unpack task panicked: {}", e)))??;

        info!(
            "{} returned {} files for '{}'",
            self.base_url, written, job.file_name
        );
        Ok(())
    }
}

/// Unpack the service's zip reply into `md_dir`, dropping the
/// `<name>/<subdir>/` (or `<name>/`) prefix. Returns the number of files
/// written.
///
/// Entries whose names would escape `md_dir` reject the whole reply.
pub fn unpack_reply(
    bytes: &[u8],
    name: &str,
    subdir: &str,
    md_dir: &Path,
) -> Result<usize, BackendError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| BackendError::InvalidReply(format!("not a zip archive: {}", e)))?;

    let full_prefix = Path::new(name).join(subdir);
    let name_prefix = Path::new(name);
    std::fs::create_dir_all(md_dir)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| BackendError::InvalidReply(format!("entry {}: {}", i, e)))?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(BackendError::InvalidReply(format!(
                "entry '{}' escapes the output directory",
                entry.name()
            )));
        };

        let relative: PathBuf = enclosed
            .strip_prefix(&full_prefix)
            .or_else(|_| enclosed.strip_prefix(name_prefix))
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| enclosed.clone());
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = md_dir.join(&relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    if written == 0 {
        warn!("Reply for '{}' contained no files", name);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseMode;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn job() -> ParseJob {
        ParseJob {
            output_root: "out".into(),
            file_name: "doc".into(),
            pdf_bytes: b"%PDF-1.7".to_vec(),
            language: "korean".into(),
            mode: ParseMode::Auto,
            engine: Engine::Pipeline,
            end_page_index: 9,
            formula_enable: false,
            table_enable: true,
        }
    }

    #[test]
    fn form_fields_reflect_job() {
        let fields = MineruHttp::new("http://mineru:8000/").form_fields(&job());
        let get = |k: &str| fields.iter().find(|(f, _)| *f == k).map(|(_, v)| v.as_str());
        assert_eq!(get("lang_list"), Some("korean"));
        assert_eq!(get("parse_method"), Some("auto"));
        assert_eq!(get("end_page_id"), Some("9"));
        assert_eq!(get("formula_enable"), Some("false"));
        assert_eq!(get("table_enable"), Some("true"));
        assert_eq!(get("response_format_zip"), Some("true"));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            MineruHttp::new("http://mineru:8000/").endpoint(),
            "http://mineru:8000/file_parse"
        );
    }

    #[test]
    fn unpack_strips_name_and_mode_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_of(&[
            ("doc/auto/doc.md", b"# Title\n![](images/a.png)"),
            ("doc/auto/images/a.png", b"\x89PNG"),
            ("doc/auto/doc_layout.pdf", b"%PDF"),
        ]);
        let n = unpack_reply(&bytes, "doc", "auto", dir.path()).unwrap();
        assert_eq!(n, 3);
        assert!(std::fs::read_to_string(dir.path().join("doc.md"))
            .unwrap()
            .starts_with("# Title"));
        assert!(dir.path().join("images/a.png").is_file());
        assert!(dir.path().join("doc_layout.pdf").is_file());
    }

    #[test]
    fn vlm_engine_fields_and_reply_layout() {
        let http = MineruHttp::default().engine(Engine::VlmTransformers);
        let mut j = job();
        j.engine = ParseBackend::engine(&http);
        let fields = http.form_fields(&j);
        assert!(fields.contains(&("backend", "vlm-transformers".to_string())));

        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_of(&[("doc/vlm/doc.md", b"# v"), ("doc/vlm/images/b.jpg", b"\xff\xd8")]);
        let subdir = j.engine.output_subdir(j.mode);
        assert_eq!(unpack_reply(&bytes, "doc", subdir, dir.path()).unwrap(), 2);
        assert!(dir.path().join("doc.md").is_file());
        assert!(dir.path().join("images/b.jpg").is_file());
        assert!(!dir.path().join("vlm").exists());
    }

    #[test]
    fn unpack_accepts_flat_and_name_only_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_of(&[("doc/doc.md", b"a"), ("extra.json", b"{}")]);
        unpack_reply(&bytes, "doc", "ocr", dir.path()).unwrap();
        assert!(dir.path().join("doc.md").is_file());
        assert!(dir.path().join("extra.json").is_file());
    }

    #[test]
    fn unpack_rejects_escaping_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_of(&[("../evil.md", b"x")]);
        let err = unpack_reply(&bytes, "doc", "auto", dir.path()).unwrap_err();
        assert!(matches!(err, BackendError::InvalidReply(_)), "{err}");
    }

    #[test]
    fn unpack_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let err = unpack_reply(b"{\"error\":1}", "doc", "auto", dir.path()).unwrap_err();
        assert!(matches!(err, BackendError::InvalidReply(_)));
    }
}
