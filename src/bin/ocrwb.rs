//! CLI binary for ocr-workbench.
//!
//! A thin shim over the library crate: maps CLI flags to `ClientConfig`,
//! drives one document through every stage and prints what happened.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_workbench::{
    ClientConfig, ErrorKind, Metadata, NoticeLevel, OcrProgressCallback, OutputFormat,
    ProgressOutcome, ProgressSnapshot, PromptEditor, PromptKind, PromptRequest, RegionVisibility,
    SavedFile, Stage, StageController, StatusResponse, UploadFile, WorkflowObserver,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
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

// ── Terminal UI: stage lines, notices and the OCR progress bar ───────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Renders controller events on stderr.
///
/// The OCR bar is driven by the library's timer, so it moves even though the
/// backend reports nothing until it is done.
struct TerminalUi {
    bar: ProgressBar,
    /// Print stage changes and notices.
    chatty: bool,
}

impl TerminalUi {
    fn new(chatty: bool) -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::hidden(),
            chatty,
        })
    }

    fn line(&self, text: String) {
        self.bar.suspend(|| eprintln!("{text}"));
    }
}

impl WorkflowObserver for TerminalUi {
    fn on_stage_changed(&self, stage: Stage, regions: RegionVisibility) {
        if !self.chatty {
            return;
        }
        let track: String = regions
            .flags()
            .iter()
            .map(|on| if *on { '●' } else { '○' })
            .collect();
        self.line(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("Stage {}/4: {}", stage.number(), stage.label())),
            dim(&track)
        ));
    }

    fn on_notice(&self, level: NoticeLevel, message: &str) {
        if !self.chatty {
            return;
        }
        let mark = match level {
            NoticeLevel::Info => dim("·"),
            NoticeLevel::Success => green("✓"),
            NoticeLevel::Error => red("✗"),
        };
        self.line(format!("  {mark} {message}"));
    }
}

impl OcrProgressCallback for TerminalUi {
    fn on_start(&self) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_style(style);
        self.bar.set_length(100);
        self.bar.set_position(0);
        self.bar.set_prefix("OCR");
        self.bar.set_message("Sending request…");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_tick(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_position(u64::from(snapshot.percent));
        let remaining = snapshot.remaining.as_secs();
        let eta = if remaining == 0 {
            "almost done".to_string()
        } else {
            format!("~{remaining}s left")
        };
        self.bar
            .set_message(format!("{}  {}", snapshot.message, dim(&eta)));
    }

    fn on_finish(&self, outcome: ProgressOutcome) {
        match outcome {
            ProgressOutcome::Completed => {
                self.bar.set_position(100);
                self.bar.finish_and_clear();
            }
            ProgressOutcome::Failed | ProgressOutcome::Cancelled => self.bar.abandon(),
        }
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a PDF, restructure it with AI, save report.md
  ocrwb report.pdf

  # Raw OCR text only, both formats, into ./out
  ocrwb --prompt none -f md -f txt -o out scan.png

  # Custom prompt read from a file
  ocrwb --prompt custom --custom-prompt my-prompt.txt paper.pdf

  # Academic outline with front-matter
  ocrwb --prompt academic --title "Attention" --authors "Vaswani et al." \
        --year 2017 --keywords "transformers, attention" paper.pdf

  # Check the backend only
  ocrwb --status --json

PROMPT KINDS:
  structure   Reformat into structured Markdown (default)
  summarize   Bullet-point summary
  academic    Paper-to-Outline reading guide
  custom      Your own prompt (--custom-prompt FILE)
  none        Skip the AI step; use the raw OCR text

LIMITS:
  Accepted inputs are PDF, PNG and JPEG up to 50 MB. OCR is cancelled after
  --ocr-timeout seconds (default 300).

ENVIRONMENT VARIABLES:
  Every flag can be set with an OCRWB_* variable (see --help).
  RUST_LOG                Overrides the log filter (e.g. ocr_workbench=debug)
"#;

/// Upload a document, run OCR, optionally enhance it with AI and download
/// the result.
#[derive(Parser, Debug)]
#[command(
    name = "ocrwb",
    version,
    about = "OCR a PDF or image through the workbench backend and download Markdown",
    long_about = "Drive one document through the OCR workbench backend: upload, server-side \
OCR, optional AI enhancement, Markdown/plain-text rendering with optional metadata, and \
download. Server resources are released when the run ends unless --keep is given.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF, PNG or JPEG file to process.
    #[arg(required_unless_present = "status")]
    input: Option<PathBuf>,

    /// Backend base URL.
    #[arg(short, long, env = "OCRWB_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Only query the backend status and exit.
    #[arg(long, env = "OCRWB_STATUS")]
    status: bool,

    /// OCR language code.
    #[arg(short, long, env = "OCRWB_LANGUAGE", default_value = "en")]
    language: String,

    /// Disable the text-line orientation classifier.
    #[arg(long, env = "OCRWB_NO_ORIENTATION")]
    no_orientation: bool,

    /// OCR hard timeout in seconds.
    #[arg(long, env = "OCRWB_OCR_TIMEOUT", default_value_t = 300)]
    ocr_timeout: u64,

    /// AI prompt kind: structure, summarize, academic, custom, none.
    #[arg(short, long, env = "OCRWB_PROMPT", value_enum, default_value = "structure")]
    prompt: PromptArg,

    /// File holding the prompt text for `--prompt custom`.
    #[arg(long, env = "OCRWB_CUSTOM_PROMPT")]
    custom_prompt: Option<PathBuf>,

    /// File holding an edited version of a built-in template to send instead.
    #[arg(long, env = "OCRWB_PROMPT_OVERRIDE")]
    prompt_override: Option<PathBuf>,

    /// Document title (front-matter).
    #[arg(long, env = "OCRWB_TITLE")]
    title: Option<String>,

    /// Title in a second language (front-matter).
    #[arg(long, env = "OCRWB_TRANSLATED_TITLE")]
    translated_title: Option<String>,

    /// Authors (front-matter).
    #[arg(long, env = "OCRWB_AUTHORS")]
    authors: Option<String>,

    /// Source or publication (front-matter).
    #[arg(long, env = "OCRWB_SOURCE")]
    source: Option<String>,

    /// Publication year; ignored if not a number.
    #[arg(long, env = "OCRWB_YEAR")]
    year: Option<String>,

    /// Comma-separated keywords (front-matter).
    #[arg(long, env = "OCRWB_KEYWORDS")]
    keywords: Option<String>,

    /// Abstract (front-matter).
    #[arg(long = "abstract", env = "OCRWB_ABSTRACT")]
    abstract_text: Option<String>,

    /// Extra front-matter field as key=value; repeatable.
    #[arg(long = "field", env = "OCRWB_FIELDS", value_name = "KEY=VALUE", value_delimiter = ';')]
    fields: Vec<String>,

    /// Download format; repeatable.
    #[arg(short, long = "format", env = "OCRWB_FORMAT", value_enum,
          value_delimiter = ',', default_value = "md")]
    formats: Vec<FormatArg>,

    /// Directory to save downloads into.
    #[arg(short, long, env = "OCRWB_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Download name without extension (default: the input file's stem).
    #[arg(long, env = "OCRWB_FILENAME")]
    filename: Option<String>,

    /// Keep the uploaded file on the server (skip cleanup).
    #[arg(long, env = "OCRWB_KEEP")]
    keep: bool,

    /// Print a JSON summary on stdout.
    #[arg(long, env = "OCRWB_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "OCRWB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCRWB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCRWB_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PromptArg {
    Structure,
    Summarize,
    Academic,
    Custom,
    None,
}

impl From<PromptArg> for PromptKind {
    fn from(v: PromptArg) -> Self {
        match v {
            PromptArg::Structure => PromptKind::Structure,
            PromptArg::Summarize => PromptKind::Summarize,
            PromptArg::Academic => PromptKind::Academic,
            PromptArg::Custom => PromptKind::Custom,
            PromptArg::None => PromptKind::None,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Md,
    Txt,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Md => OutputFormat::Md,
            FormatArg::Txt => OutputFormat::Txt,
        }
    }
}

/// What `--json` prints after a run.
#[derive(Debug, Serialize)]
struct RunSummary {
    file_id: String,
    prompt: PromptKind,
    raw_chars: usize,
    processed_chars: usize,
    ocr_seconds: Option<f64>,
    downloads: Vec<SavedFile>,
    kept_on_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the progress bar and the
    // stage lines; keep them at WARN unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build controller ─────────────────────────────────────────────────
    let config = ClientConfig::builder()
        .base_url(cli.server.as_str())
        .language(cli.language.as_str())
        .use_textline_orientation(!cli.no_orientation)
        .ocr_timeout_secs(cli.ocr_timeout)
        .build()
        .context("Invalid configuration")?;

    let ui = TerminalUi::new(!cli.quiet && !cli.json);
    let mut ctl = StageController::with_http(config.clone())
        .context("Failed to create the HTTP client")?
        .with_observer(ui.clone());
    if show_progress {
        ctl = ctl.with_progress(ui.clone());
    }

    // ── Status-only mode ─────────────────────────────────────────────────
    if cli.status {
        let status = ctl
            .check_status()
            .await
            .with_context(|| format!("{} is not answering", config.endpoint("api/status")))?;
        print_status(&cli, &config, &status)?;
        return Ok(());
    }

    let input = cli
        .input
        .as_deref()
        .context("An input file is required")?;

    // Local inputs are checked before anything is uploaded.
    let prompt = build_prompt(&cli).await?;
    let metadata = build_metadata(&cli);
    let file = UploadFile::load(input, config.max_upload_bytes)
        .await
        .with_context(|| format!("Cannot use {}", input.display()))?;
    file.validate(config.max_upload_bytes)?;

    ctl.check_status()
        .await
        .with_context(|| format!("Backend at {} is not available", config.base_url))?;

    // ── Run every stage ──────────────────────────────────────────────────
    let outcome = run(&mut ctl, &cli, &file, &prompt, metadata.as_ref()).await;

    // Release server resources on success and on failure alike.
    let kept = cli.keep && ctl.session().file_id.is_some();
    if kept {
        if !cli.quiet {
            eprintln!(
                "{} kept on the server as file_id={}",
                dim("·"),
                ctl.session().file_id.as_deref().unwrap_or_default()
            );
        }
    } else if let Some(cleanup) = ctl.reset() {
        let _ = cleanup.await;
    }

    let mut summary = outcome?;
    summary.kept_on_server = kept;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        for saved in &summary.downloads {
            eprintln!(
                "{}  {}  {}",
                green("✔"),
                bold(&saved.path.display().to_string()),
                dim(&format!("{} bytes", saved.bytes)),
            );
        }
        eprintln!(
            "   {} OCR chars  →  {} chars after '{}'{}",
            dim(&summary.raw_chars.to_string()),
            dim(&summary.processed_chars.to_string()),
            summary.prompt,
            summary
                .ocr_seconds
                .map(|s| format!("  ({s:.2}s OCR)"))
                .unwrap_or_default(),
        );
    }

    Ok(())
}

/// Upload → OCR → enhance or skip → render → download.
async fn run(
    ctl: &mut StageController,
    cli: &Cli,
    file: &UploadFile,
    prompt: &PromptRequest,
    metadata: Option<&Metadata>,
) -> Result<RunSummary> {
    let file_id = ctl.submit_upload(file).await.context("Upload failed")?;
    let raw_text = ctl.run_ocr().await.context("OCR failed")?;

    let processed = match ctl.enhance_with_prompt(prompt).await {
        Ok(text) => text,
        // The raw text is still worth keeping when the AI step fails.
        Err(e) if matches!(e.kind(), ErrorKind::Backend | ErrorKind::NetworkUnreachable) => {
            tracing::warn!("AI enhancement failed, falling back to raw text: {}", e);
            ctl.skip_enhance()?
        }
        Err(e) => return Err(e).context("AI enhancement failed"),
    };

    ctl.render_outputs(metadata)
        .await
        .context("Generating Markdown failed")?;

    let mut downloads = Vec::new();
    let mut formats: Vec<OutputFormat> = Vec::new();
    for format in cli.formats.iter().copied().map(OutputFormat::from) {
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    for format in formats {
        let saved = ctl
            .download(format, cli.filename.as_deref(), &cli.output_dir)
            .await
            .with_context(|| format!("Downloading {format} failed"))?;
        downloads.push(saved);
    }

    Ok(RunSummary {
        file_id,
        prompt: prompt.kind,
        raw_chars: raw_text.chars().count(),
        processed_chars: processed.chars().count(),
        ocr_seconds: ctl.session().ocr_seconds,
        downloads,
        kept_on_server: false,
    })
}

/// Map `--prompt`, `--custom-prompt` and `--prompt-override` to a request.
async fn build_prompt(cli: &Cli) -> Result<PromptRequest> {
    let mut editor = PromptEditor::new(cli.prompt.into());

    if let Some(ref path) = cli.custom_prompt {
        editor.set_custom_text(read_text(path).await?);
    }
    if let Some(ref path) = cli.prompt_override {
        if !editor.kind().calls_backend() || editor.kind() == PromptKind::Custom {
            anyhow::bail!("--prompt-override only applies to structure, summarize or academic");
        }
        editor.set_allow_edit(true);
        editor.edit_preview(read_text(path).await?)?;
    }

    let request = editor.request();
    request.validate().context("Use --custom-prompt FILE")?;
    Ok(request)
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}

/// Map the metadata flags; `None` when nothing was given.
fn build_metadata(cli: &Cli) -> Option<Metadata> {
    let mut meta = Metadata::new();
    if let Some(ref v) = cli.title {
        meta = meta.title(v.as_str());
    }
    if let Some(ref v) = cli.translated_title {
        meta = meta.translated_title(v.as_str());
    }
    if let Some(ref v) = cli.authors {
        meta = meta.authors(v.as_str());
    }
    if let Some(ref v) = cli.source {
        meta = meta.source(v.as_str());
    }
    if let Some(ref v) = cli.year {
        meta = meta.year_str(v);
    }
    if let Some(ref v) = cli.keywords {
        meta = meta.keywords_csv(v);
    }
    if let Some(ref v) = cli.abstract_text {
        meta = meta.abstract_text(v.as_str());
    }
    for pair in &cli.fields {
        meta = meta.custom_field_pair(pair);
    }
    (!meta.is_empty()).then_some(meta)
}

fn print_status(cli: &Cli, config: &ClientConfig, status: &StatusResponse) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(status).context("Failed to serialise status")?
        );
        return Ok(());
    }
    let yes_no = |b: bool| if b { green("yes") } else { red("no") };
    println!("Server:       {}", config.base_url);
    if let Some(ref s) = status.status {
        println!("Status:       {}", s);
    }
    if let Some(ref m) = status.message {
        println!("Message:      {}", m);
    }
    if let Some(ref v) = status.version {
        println!("Version:      {}", v);
    }
    if let Some(ocr) = status.ocr_available {
        println!("OCR:          {}", yes_no(ocr));
    }
    println!("AI enhance:   {}", yes_no(status.gemini_available));
    Ok(())
}
