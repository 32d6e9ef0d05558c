//! CLI binary for edgequake-pdf2text.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2text::{
    analyze, convert_to_file, CancelSignal, ConversionProgressCallback, ExtractionConfig,
    Granularity, ProgressCallback, SufficiencyVerdict,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the text layer is read, then a
/// page bar with one log line per finished page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Pages that already printed a failure line.
    failed: Mutex<HashSet<usize>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading text layer…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &str) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_document_classified(
        &self,
        total_pages: usize,
        verdict: &SufficiencyVerdict,
        pages_to_transcribe: usize,
    ) {
        let prefix = if pages_to_transcribe == 0 {
            "Extracting"
        } else {
            "Transcribing"
        };
        self.activate_bar(total_pages, prefix);
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!(
                "{total_pages} pages, {pages_to_transcribe} to transcribe"
            )),
            dim(&format!(
                "({} chars in text layer)",
                verdict.effective_character_count
            )),
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize, transcribing: bool) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        let source = if transcribing { "ocr" } else { "text" };
        self.bar.set_message(format!("page {page_num} ({source})"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let already_failed = self
            .failed
            .lock()
            .map(|mut f| f.remove(&page_num))
            .unwrap_or(false);

        if !already_failed {
            let secs = self.elapsed_secs(page_num);
            self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {:<8}  {}",
                green("✓"),
                page_num,
                total,
                dim(&format!("{text_len:>5} chars")),
                dim(&format!("{secs:.1}s")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut f) = self.failed.lock() {
            f.insert(page_num);
        }

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_conversion_complete(&self, _total_pages: usize, _failed_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF (born-digital or scanned) to text
  pdf2text document.pdf document.txt

  # Show the text-layer decision without calling the API
  pdf2text --analyze-only scan.pdf

  # Decide per page instead of per document
  pdf2text --granularity page mixed.pdf mixed.txt

  # Different model / endpoint
  pdf2text --model gpt-4.1 --endpoint https://proxy.local/v1/responses in.pdf out.txt

OUTPUT FORMAT:
  === Page 1 ===
  <page text>

  === Page 2 ===
  ...

  Pages that could not be transcribed contain
  [transcription failed: <reason>] and the run continues.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          Bearer token (needed only when a page is transcribed)
  PDFIUM_LIB_PATH         Path to libpdfium (directory or file)
  PDF2TEXT_MODEL          Override model ID
  PDF2TEXT_ENDPOINT       Override transcription endpoint
  RUST_LOG                Override the log filter

EXIT STATUS:
  0  all pages written (some may carry failure markers)
  1  usage error, unreadable input, or unrecoverable failure
"#;

/// Convert PDF files to plain text, transcribing scanned documents with a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2text",
    version,
    about = "Convert PDF files to plain text, with vision-model OCR for scanned documents",
    long_about = "Convert a PDF to plain text. When the document's text layer holds fewer \
than --threshold non-whitespace characters, every page is rendered and transcribed by a \
vision model; otherwise the text layer is written directly.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file.
    input: PathBuf,

    /// Output text file (UTF-8).
    #[arg(required_unless_present = "analyze_only")]
    output: Option<PathBuf>,

    /// Vision model ID.
    #[arg(long, env = "PDF2TEXT_MODEL", default_value = edgequake_pdf2text::config::DEFAULT_MODEL)]
    model: String,

    /// Transcription endpoint URL.
    #[arg(
        long,
        env = "PDF2TEXT_ENDPOINT",
        default_value = edgequake_pdf2text::config::DEFAULT_ENDPOINT
    )]
    endpoint: String,

    /// API key (bearer token).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Minimum non-whitespace characters for the text layer to count.
    #[arg(long, env = "PDF2TEXT_THRESHOLD", default_value_t = 200)]
    threshold: usize,

    /// Decide once per document or per page.
    #[arg(long, env = "PDF2TEXT_GRANULARITY", value_enum, default_value = "document")]
    granularity: GranularityArg,

    /// Per-page threshold used with --granularity page.
    #[arg(long, env = "PDF2TEXT_MIN_PAGE_CHARS", default_value_t = 50)]
    min_page_chars: usize,

    /// Render scale over 72 DPI (0.5–8).
    #[arg(long, env = "PDF2TEXT_SCALE", default_value_t = 4.0)]
    scale: f32,

    /// HTTP attempts per page, including the first.
    #[arg(long, env = "PDF2TEXT_MAX_ATTEMPTS", default_value_t = 6)]
    max_attempts: u32,

    /// Per-attempt API timeout in seconds.
    #[arg(long, env = "PDF2TEXT_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Seed the retry jitter for reproducible delays.
    #[arg(long, env = "PDF2TEXT_JITTER_SEED")]
    jitter_seed: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TEXT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Path to a text file containing a custom transcription instruction.
    #[arg(long, env = "PDF2TEXT_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Print the text-layer analysis only; no transcription, no output file.
    #[arg(long)]
    analyze_only: bool,

    /// Print the analysis as JSON (with --analyze-only).
    #[arg(long, requires = "analyze_only")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TEXT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum GranularityArg {
    Document,
    Page,
}

impl From<GranularityArg> for Granularity {
    fn from(v: GranularityArg) -> Self {
        match v {
            GranularityArg::Document => Granularity::Document,
            GranularityArg::Page => Granularity::Page,
        }
    }
}

#[tokio::main]
async fn main() {
    // Help and version exit 0; every other parse error exits 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", red("error:"), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.analyze_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Analyze-only mode ────────────────────────────────────────────────
    if cli.analyze_only {
        let config = build_config(&cli, None, CancelSignal::never()).await?;
        let analysis = analyze(&cli.input, &config)
            .await
            .context("Failed to analyze PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&analysis).context("Failed to serialize analysis")?
            );
        } else {
            println!("File:            {}", cli.input.display());
            println!("Pages:           {}", analysis.page_count);
            println!(
                "Effective chars: {}  (threshold {})",
                analysis.verdict.effective_character_count, config.threshold
            );
            println!(
                "Text layer:      {}",
                if analysis.verdict.requires_transcription {
                    "insufficient, transcription required"
                } else {
                    "sufficient"
                }
            );
            if !analysis.pages_to_transcribe.is_empty() {
                let pages: Vec<String> = analysis
                    .pages_to_transcribe
                    .iter()
                    .map(|p| p.to_string())
                    .collect();
                println!("Transcribe:      {}", pages.join(", "));
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let (cancel_handle, cancel) = CancelSignal::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", cyan("⚠ interrupt received, stopping after the current page"));
            cancel_handle.cancel();
        }
    });

    let config = build_config(&cli, progress_cb, cancel).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .as_ref()
        .context("OUTPUT is required unless --analyze-only is given")?;

    let report = convert_to_file(&cli.input, output_path, &config)
        .await
        .context("Conversion failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} pages ({:?})  {} transcribed  {}ms  →  {}",
            if report.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.total_pages,
            report.mode,
            report.transcribed_pages,
            report.duration_ms,
            bold(&output_path.display().to_string()),
        );
        if report.failed_pages > 0 {
            eprintln!(
                "   {} page(s) carry a failure marker",
                red(&report.failed_pages.to_string())
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancelSignal,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .threshold(cli.threshold)
        .granularity(cli.granularity.into())
        .min_page_chars(cli.min_page_chars)
        .render_scale(cli.scale)
        .model(cli.model.clone())
        .endpoint(cli.endpoint.clone())
        .max_attempts(cli.max_attempts)
        .api_timeout_secs(cli.api_timeout)
        .cancel(cancel);

    if let Some(ref path) = cli.instruction {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(text);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(seed) = cli.jitter_seed {
        builder = builder.jitter_seed(seed);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
