//! CLI binary for docroute.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `ConversionRequest`, picks a backend, and prints
//! results.

use anyhow::{Context, Result};
use clap::Parser;
use docroute::backend::{cli::DEFAULT_PROGRAM, http::DEFAULT_BASE_URL};
use docroute::config::{DEFAULT_LANGUAGE, DEFAULT_MAX_PAGES, DEFAULT_OUTPUT_ROOT};
use docroute::{
    convert_stream, inspect, ArchiveNaming, ArchivePolicy, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, ConversionRequest, Converter, Engine, LanguageTable, MineruCli,
    MineruHttp, ParseBackend, ProgressCallback, ScriptFamily, Stage,
};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner per input, showing the stage it is in. Stage results are
/// logged above the spinners.
///
/// Spinners are keyed by the full input path; only the file name is shown.
struct CliProgressCallback {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn bar(&self, name: &str) -> Option<ProgressBar> {
        self.bars.lock().ok()?.get(name).cloned()
    }

    fn label(name: &str) -> String {
        Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string())
    }

    fn log(&self, line: String) {
        // Falls back to stderr when the terminal is hidden.
        if self.multi.println(&line).is_err() {
            eprintln!("{line}");
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, name: &str) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(style);
        bar.set_prefix(Self::label(name));
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(name.to_string(), bar);
        }
    }

    fn on_stage_start(&self, name: &str, stage: Stage) {
        if let Some(bar) = self.bar(name) {
            bar.set_message(format!("{stage}…"));
        }
    }

    fn on_stage_complete(&self, name: &str, stage: Stage, elapsed_ms: u64) {
        self.log(format!(
            "  {} {:<24} {:<10} {}",
            green("✓"),
            Self::label(name),
            stage,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, name: &str, stage: Stage, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.log(format!(
            "  {} {:<24} {:<10} {}",
            red("✗"),
            Self::label(name),
            stage,
            red(&msg)
        ));
    }

    fn on_conversion_complete(&self, name: &str, success: bool) {
        let bar = self.bars.lock().ok().and_then(|mut bars| bars.remove(name));
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        let mark = if success { green("✔") } else { red("✘") };
        self.log(format!("{} {}", mark, bold(&Self::label(name))));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF with the local mineru CLI, Markdown to stdout
  docroute paper.pdf

  # Force OCR on a scanned image, English, first 3 pages
  docroute --ocr -l en -n 3 scan.jpg

  # Self-contained Markdown (images embedded as data URIs)
  docroute paper.pdf --render-to paper.md

  # Use a running mineru-api service
  docroute --backend http --api-url http://gpu-box:8000 paper.pdf

  # Several inputs, two at a time, JSON results
  docroute -c 2 --json a.pdf b.png c.pdf > results.json

  # Check which pages lack a text layer (no backend needed)
  docroute --classify-only scan.pdf

OUTPUT LAYOUT:
  <output-dir>/<name>/<sub>/<name>.md          Markdown from the backend
  <output-dir>/<name>/<sub>/<name>_layout.pdf  layout-annotated PDF
  <output-dir>/<name>/<sub>/images/            extracted figures
  <output-dir>/<sha256>.zip                    archive of the directory above

  <name> is the sanitised file stem plus a _yymmdd_HHMMSS timestamp.
  <sub> is auto or ocr for the pipeline engine and vlm for the vlm-* engines.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (or its directory)
  MINERU_BIN              mineru executable for --backend cli
  MINERU_API_URL          mineru-api base URL for --backend http
  RUST_LOG                Override log filter (e.g. docroute=debug)
"#;

/// Convert PDFs and page images to Markdown through MinerU.
#[derive(Parser, Debug)]
#[command(
    name = "docroute",
    version,
    about = "Convert PDFs and page images to Markdown through MinerU",
    long_about = "Normalise PDF, PNG or JPEG input to PDF, run it through a MinerU backend \
(local CLI or mineru-api service), archive the output directory and produce Markdown with \
images embedded.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF, PNG or JPEG files to convert.
    #[arg(required_unless_present = "list_languages")]
    inputs: Vec<PathBuf>,

    /// Output root directory.
    #[arg(short, long, env = "DOCROUTE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_ROOT)]
    output_dir: PathBuf,

    /// Convert pages 1..=N.
    #[arg(short = 'n', long, env = "DOCROUTE_MAX_PAGES", default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: usize,

    /// Force OCR instead of letting the backend decide.
    #[arg(long, env = "DOCROUTE_FORCE_OCR")]
    ocr: bool,

    /// Disable formula recognition.
    #[arg(long)]
    no_formula: bool,

    /// Disable table recognition.
    #[arg(long)]
    no_table: bool,

    /// Language code or script family (see --list-languages).
    #[arg(short, long, env = "DOCROUTE_LANG", default_value = DEFAULT_LANGUAGE)]
    lang: String,

    /// Parsing backend.
    #[arg(long, env = "DOCROUTE_BACKEND", value_enum, default_value = "cli")]
    backend: BackendArg,

    /// mineru executable used by `--backend cli`.
    #[arg(long, env = "MINERU_BIN", default_value = DEFAULT_PROGRAM)]
    mineru_bin: PathBuf,

    /// mineru-api base URL used by `--backend http`.
    #[arg(long, env = "MINERU_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// MinerU engine (`-b` for the CLI, `backend` field for the API).
    #[arg(long, env = "MINERU_ENGINE", value_enum, default_value = "pipeline")]
    engine: EngineArg,

    /// Per-request backend timeout in seconds.
    #[arg(long, env = "DOCROUTE_BACKEND_TIMEOUT")]
    backend_timeout: Option<u64>,

    /// How the archive file name is derived.
    #[arg(long, value_enum, default_value = "unique")]
    archive_naming: NamingArg,

    /// What to do when the output directory cannot be archived.
    #[arg(long, value_enum, default_value = "degrade")]
    on_archive_failure: FailureArg,

    /// Skip the advisory scanned-page check.
    #[arg(long)]
    no_scan_check: bool,

    /// Accept language codes the built-in table does not know.
    #[arg(long)]
    any_language: bool,

    /// Write the image-inlined Markdown to this file (single input only).
    #[arg(long)]
    render_to: Option<PathBuf>,

    /// Concurrent conversions when several inputs are given.
    #[arg(short, long, env = "DOCROUTE_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Print results as JSON instead of Markdown.
    #[arg(long, env = "DOCROUTE_JSON")]
    json: bool,

    /// Only report which pages lack a text layer; no conversion.
    #[arg(long)]
    classify_only: bool,

    /// Print the language table and exit.
    #[arg(long)]
    list_languages: bool,

    /// Disable progress display.
    #[arg(long, env = "DOCROUTE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCROUTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCROUTE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Cli,
    Http,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Pipeline,
    VlmTransformers,
    VlmSglangEngine,
    VlmSglangClient,
}

impl From<EngineArg> for Engine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Pipeline => Engine::Pipeline,
            EngineArg::VlmTransformers => Engine::VlmTransformers,
            EngineArg::VlmSglangEngine => Engine::VlmSglangEngine,
            EngineArg::VlmSglangClient => Engine::VlmSglangClient,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum NamingArg {
    PathHash,
    Unique,
}

impl From<NamingArg> for ArchiveNaming {
    fn from(v: NamingArg) -> Self {
        match v {
            NamingArg::PathHash => ArchiveNaming::PathHash,
            NamingArg::Unique => ArchiveNaming::Unique,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FailureArg {
    Degrade,
    Abort,
}

impl From<FailureArg> for ArchivePolicy {
    fn from(v: FailureArg) -> Self {
        match v {
            FailureArg::Degrade => ArchivePolicy::Degrade,
            FailureArg::Abort => ArchivePolicy::Abort,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With spinners active, INFO-level library logs would only fight the
    // progress display; warnings (e.g. a skipped archive) still get through.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.classify_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let languages = Arc::new(LanguageTable::builtin());

    // ── Language table ───────────────────────────────────────────────────
    if cli.list_languages {
        print_languages(&languages, cli.json)?;
        return Ok(());
    }

    // ── Classify-only mode ───────────────────────────────────────────────
    if cli.classify_only {
        return classify_only(&cli).await;
    }

    if cli.render_to.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--render-to takes a single input ({} given)", cli.inputs.len());
    }

    // ── Build converter ──────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let converter = Arc::new(Converter::new(config, languages, build_backend(&cli)));

    let requests: Vec<ConversionRequest> =
        cli.inputs.iter().map(|input| build_request(&cli, input)).collect();

    // ── Single input ─────────────────────────────────────────────────────
    if let [request] = requests.as_slice() {
        let output = match cli.render_to {
            Some(ref path) => converter.convert_to_file(request, path).await,
            None => converter.convert(request).await,
        }
        .with_context(|| format!("Conversion of {} failed", cli.inputs[0].display()))?
        .context("No input selected")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else if cli.render_to.is_none() {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !output.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            print_summary(&output, cli.render_to.as_ref());
        }
        return Ok(());
    }

    // ── Several inputs ───────────────────────────────────────────────────
    let total = requests.len();
    let mut failed = 0usize;
    let mut json_items = Vec::new();
    let mut results = convert_stream(Arc::clone(&converter), requests);

    while let Some(item) = results.next().await {
        match item.result {
            Ok(output) => {
                if cli.json {
                    json_items.push(serde_json::json!({
                        "input": item.input,
                        "output": output,
                    }));
                } else if !cli.quiet {
                    eprintln!("{} {}", green("✔"), bold(&item.input.display().to_string()));
                    print_summary(&output, None);
                }
            }
            Err(e) => {
                failed += 1;
                if cli.json {
                    json_items.push(serde_json::json!({
                        "input": item.input,
                        "error": e.to_string(),
                    }));
                } else {
                    eprintln!("{} {}: {}", red("✘"), item.input.display(), e);
                }
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json_items).context("Failed to serialise output")?
        );
    }
    if !cli.quiet && !cli.json {
        eprintln!(
            "{}  {}/{} converted",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            total - failed,
            total
        );
    }
    if failed > 0 {
        anyhow::bail!("{} of {} conversions failed", failed, total);
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .output_root(&cli.output_dir)
        .archive_policy(cli.on_archive_failure.into())
        .archive_naming(cli.archive_naming.into())
        .validate_language(!cli.any_language)
        .diagnose_scan(!cli.no_scan_check)
        .concurrency(cli.concurrency);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_backend(cli: &Cli) -> Arc<dyn ParseBackend> {
    let timeout = cli.backend_timeout.map(Duration::from_secs);
    match cli.backend {
        BackendArg::Cli => {
            let mut backend = MineruCli::new(&cli.mineru_bin).engine(cli.engine.into());
            if let Some(t) = timeout {
                backend = backend.timeout(t);
            }
            Arc::new(backend)
        }
        BackendArg::Http => {
            let mut backend = MineruHttp::new(&cli.api_url).engine(cli.engine.into());
            if let Some(t) = timeout {
                backend = backend.timeout(t);
            }
            Arc::new(backend)
        }
    }
}

fn build_request(cli: &Cli, input: &PathBuf) -> ConversionRequest {
    ConversionRequest::new(input)
        .max_pages(cli.max_pages)
        .force_ocr(cli.ocr)
        .formula(!cli.no_formula)
        .table(!cli.no_table)
        .language(&cli.lang)
}

async fn classify_only(cli: &Cli) -> Result<()> {
    let mut verdicts = Vec::new();
    for input in &cli.inputs {
        let verdict = inspect(input)
            .await
            .with_context(|| format!("Failed to classify {}", input.display()))?;
        if cli.json {
            verdicts.push(serde_json::json!({ "input": input, "scan": verdict }));
        } else {
            let pages = verdict.scanned_page_numbers();
            println!("File:           {}", input.display());
            println!("Pages:          {}", verdict.num_pages);
            println!("Scanned pages:  {}", verdict.scanned_pages);
            println!("Fully scanned:  {}", verdict.is_fully_scanned);
            if verdict.is_mixed() {
                println!("Without text:   {:?}", pages);
            }
        }
    }
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&verdicts).context("Failed to serialise verdicts")?
        );
    }
    Ok(())
}

fn print_languages(table: &LanguageTable, json: bool) -> Result<()> {
    if json {
        let families: serde_json::Map<String, serde_json::Value> = ScriptFamily::ALL
            .iter()
            .map(|f| (f.to_string(), serde_json::json!(table.codes_in(*f))))
            .collect();
        let value = serde_json::json!({
            "selectable": table.selectable(),
            "families": families,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise languages")?
        );
        return Ok(());
    }

    println!("{}", bold("Selectable:"));
    println!("  {}", table.selectable().join(" "));
    for family in ScriptFamily::ALL {
        let header = match family.aggregate_code() {
            Some(code) => format!("{family} (select all with '{code}')"),
            None => family.to_string(),
        };
        println!("{}", bold(&header));
        println!("  {}", table.codes_in(family).join(" "));
    }
    Ok(())
}

fn print_summary(output: &ConversionOutput, rendered_to: Option<&PathBuf>) {
    eprintln!(
        "   {} mode  {}ms  →  {}",
        output.mode,
        output.stats.total_duration_ms,
        bold(&output.markdown_path.display().to_string()),
    );
    match output.archive_path {
        Some(ref p) => eprintln!("   archive  {}", dim(&p.display().to_string())),
        None => eprintln!("   archive  {}", cyan("not written")),
    }
    eprintln!(
        "   layout   {}",
        dim(&output.layout_pdf_path.display().to_string())
    );
    if let Some(path) = rendered_to {
        eprintln!("   rendered {}", dim(&path.display().to_string()));
    }
    if let Some(ref scan) = output.scan {
        if scan.is_fully_scanned {
            eprintln!("   {}", cyan("input has no text layer; consider --ocr"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinners_are_keyed_by_full_path() {
        let cb = CliProgressCallback::new();
        cb.on_conversion_start("/a/report.pdf");
        cb.on_conversion_start("/b/report.pdf");
        assert_eq!(cb.bars.lock().unwrap().len(), 2);

        cb.on_conversion_complete("/a/report.pdf", true);
        assert!(cb.bar("/a/report.pdf").is_none());
        assert!(cb.bar("/b/report.pdf").is_some());
        assert_eq!(CliProgressCallback::label("/b/report.pdf"), "report.pdf");
    }

    #[test]
    fn engine_flag_maps_to_engine() {
        let cli = Cli::parse_from(["docroute", "--engine", "vlm-transformers", "x.pdf"]);
        assert_eq!(Engine::from(cli.engine), Engine::VlmTransformers);
        let cli = Cli::parse_from(["docroute", "x.pdf"]);
        assert_eq!(Engine::from(cli.engine), Engine::Pipeline);
    }
}
