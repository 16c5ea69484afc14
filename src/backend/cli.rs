//! Backend that runs the `mineru` command-line tool.
//!
//! `mineru` names its output after the input file stem, so the job's bytes
//! are staged in a temporary directory as `<file_name>.pdf` and that path is
//! handed to the tool. The staging directory is removed when the call
//! returns.
//!
//! ```text
//! mineru -p <staged.pdf> -o <root> -m <auto|ocr> -b <engine> -l <lang>
//!        -e <end page> -f <true|false> -t <true|false>
//! ```

use super::{ParseBackend, ParseJob};
use crate::config::Engine;
use crate::error::BackendError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Default executable name.
pub const DEFAULT_PROGRAM: &str = "mineru";

/// Lines of stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// [`ParseBackend`] driving the `mineru` CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct MineruCli {
    program: PathBuf,
    leading_args: Vec<OsString>,
    engine: Engine,
    timeout: Option<Duration>,
}

impl Default for MineruCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl MineruCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            engine: Engine::default(),
            timeout: None,
        }
    }

    /// Arguments placed before the generated ones, for launchers such as
    /// `uv run mineru` or `python -m mineru.cli.client`.
    pub fn leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// MinerU engine passed with `-b`. Default: [`Engine::Pipeline`].
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Kill the subprocess if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full argument list for a job whose PDF was staged at `input`.
    pub fn args(&self, input: &Path, job: &ParseJob) -> Vec<OsString> {
        let mut args = self.leading_args.clone();
        args.extend([
            "-p".into(),
            input.as_os_str().to_os_string(),
            "-o".into(),
            job.output_root.as_os_str().to_os_string(),
            "-m".into(),
            job.mode.as_str().into(),
            "-b".into(),
            self.engine.as_str().into(),
            "-l".into(),
            job.language.clone().into(),
            "-e".into(),
            job.end_page_index.to_string().into(),
            "-f".into(),
            job.formula_enable.to_string().into(),
            "-t".into(),
            job.table_enable.to_string().into(),
        ]);
        args
    }
}

#[async_trait]
impl ParseBackend for MineruCli {
    fn name(&self) -> &str {
        "mineru-cli"
    }

    fn engine(&self) -> Engine {
        self.engine
    }

    async fn parse(&self, job: &ParseJob) -> Result<(), BackendError> {
        let staging = tempfile::tempdir()?;
        let input = staging.path().join(format!("{}.pdf", job.file_name));
        tokio::fs::write(&input, &job.pdf_bytes).await?;

        let args = self.args(&input, job);
        debug!("Running {} {:?}", self.program.display(), args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackendError::Unavailable(format!(
                        "'{}' not found; install MinerU or set --mineru-bin",
                        self.program.display()
                    ))
                } else {
                    BackendError::Io(e)
                }
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| BackendError::Timeout {
                    secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                tail(&stderr, STDERR_TAIL_LINES)
            )));
        }

        info!(
            "{} finished for '{}' ({} mode)",
            self.program.display(),
            job.file_name,
            job.mode
        );
        Ok(())
    }
}

/// Last `n` non-empty lines of `s`, joined with newlines.
fn tail(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
