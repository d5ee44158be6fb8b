//! CLI binary for edgequake-invoice.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the extracted JSON.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_invoice::{
    extract_files, extract_to_file, ExtractionConfig, ExtractionOutput,
    ExtractionProgressCallback, ProgressCallback, RunResult,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a single spinner whose prefix follows the
/// pipeline phase, plus one log line per uploaded page and per retry.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading pages…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, total_pages: usize) {
        self.bar.set_prefix("Uploading");
        self.bar.set_message(format!("{total_pages} page(s)"));
    }

    fn on_page_uploaded(&self, index: usize, total_pages: usize, artifact_name: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total_pages,
            dim(artifact_name),
        ));
    }

    fn on_round_start(&self, round: u32, max_rounds: u32) {
        self.bar.set_prefix("Extracting");
        self.bar.set_message(format!("round {round}/{max_rounds}"));
    }

    fn on_retry(&self, round: u32, reason: &str, backoff_ms: u64) {
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Round {:>2}  {}  {}",
            cyan("↻"),
            round,
            red(&msg),
            dim(&format!("retry in {:.1}s", backoff_ms as f64 / 1000.0)),
        ));
    }

    fn on_tool_call(&self, name: &str, terminal: bool) {
        let kind = if terminal { "final" } else { "intermediate" };
        self.bar.println(format!("  {} {}  {}", cyan("ƒ"), bold(name), dim(kind)));
    }

    fn on_cleanup_complete(&self, deleted: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed > 0 {
            eprintln!(
                "{} {} uploaded file(s) could not be deleted",
                cyan("⚠"),
                red(&failed.to_string())
            );
        } else {
            eprintln!("{} {} uploaded file(s) deleted", dim("·"), deleted);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract to stdout
  invoice2json page-1.png page-2.png

  # Extract to a file
  invoice2json scan.jpg -o invoice.json

  # Plain text mode (no function calling)
  invoice2json --no-tools scan.jpg

  # Full run result and stats as JSON
  invoice2json --json scan.jpg > run.json

EXIT STATUS:
  0  a value was extracted
  1  fatal error (bad input, auth, transport, protocol)
  2  the model gave no usable answer (diagnostic)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Gemini API key (sent as ?key=)
  GOOGLE_API_KEY          Fallback API key
  GEMINI_ACCESS_TOKEN     OAuth access token (sent as Bearer), used when
                          neither API key variable is set
  GEMINI_MODEL            Override model ID
  RUST_LOG                Override log filter
"#;

/// Extract a structured invoice from page images using Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2json",
    version,
    about = "Extract a structured invoice from page images using Gemini",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page images (png, jpeg, webp, gif), in page order.
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "INVOICE2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Gemini model ID.
    #[arg(long, env = "GEMINI_MODEL", default_value = "models/gemini-1.5-pro-latest")]
    model: String,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OAuth bearer token, used when no API key is given.
    ///
    /// Without this flag, GEMINI_ACCESS_TOKEN is consulted only after
    /// GEMINI_API_KEY and GOOGLE_API_KEY.
    #[arg(long)]
    token: Option<String>,

    /// API origin.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = "https://generativelanguage.googleapis.com")]
    base_url: String,

    /// Ask for JSON in reply text instead of offering function calling.
    #[arg(long, env = "INVOICE2JSON_NO_TOOLS")]
    no_tools: bool,

    /// Retry budget shared by all rounds after the first.
    #[arg(long, env = "INVOICE2JSON_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,

    /// Wait after an HTTP 500 before resending, in milliseconds.
    #[arg(long, env = "INVOICE2JSON_RETRY_BACKOFF_MS", default_value_t = 3000)]
    retry_backoff_ms: u64,

    /// Path to a text file containing a custom prompt.
    #[arg(long, env = "INVOICE2JSON_PROMPT")]
    prompt_file: Option<PathBuf>,

    /// Output the full run result and stats as JSON.
    #[arg(long, env = "INVOICE2JSON_JSON")]
    json: bool,

    /// Disable progress spinner.
    #[arg(long, env = "INVOICE2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE2JSON_QUIET")]
    quiet: bool,

    /// Per-HTTP-call timeout in seconds.
    #[arg(long, env = "INVOICE2JSON_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level feedback; keep library logs quiet while it runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = match cli.output {
        Some(ref output_path) => extract_to_file(&cli.pages, output_path, &config)
            .await
            .context("Extraction failed")?,
        None => extract_files(&cli.pages, &config)
            .await
            .context("Extraction failed")?,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        if let RunResult::Extracted(ref value) = output.result {
            let json = serde_json::to_string_pretty(value).context("Failed to serialise value")?;
            println!("{json}");
        }
    }

    if !cli.quiet {
        print_summary(&cli, &output);
    }

    Ok(match output.result {
        RunResult::Extracted(_) => ExitCode::SUCCESS,
        RunResult::Diagnostic(_) => ExitCode::from(2),
    })
}

fn print_summary(cli: &Cli, output: &ExtractionOutput) {
    let stats = &output.stats;
    match &output.result {
        RunResult::Extracted(value) => {
            let target = cli
                .output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default();
            let shape = match value {
                serde_json::Value::Object(m) => format!("{} field(s)", m.len()),
                serde_json::Value::Array(a) => format!("{} item(s)", a.len()),
                _ => "scalar".to_string(),
            };
            eprintln!("{} Valid values  {}{}", green("✔"), dim(&shape), target);
        }
        RunResult::Diagnostic(d) => {
            eprintln!("{} Invalid values  {}", red("✘"), d);
        }
    }
    eprintln!(
        "   {} page(s)  /  {} round(s)  /  {} retr{}  /  {}ms total",
        stats.pages,
        stats.rounds,
        stats.retries,
        if stats.retries == 1 { "y" } else { "ies" },
        stats.total_duration_ms,
    );
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let prompt = if let Some(ref path) = cli.prompt_file {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .model(cli.model.as_str())
        .base_url(cli.base_url.as_str())
        .tool_calling(!cli.no_tools)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .api_timeout_secs(cli.api_timeout);

    // Unset credentials fall through to the library's environment lookup.
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.as_str());
    } else if let Some(ref token) = cli.token {
        builder = builder.bearer_token(token.as_str());
    }
    if let Some(p) = prompt {
        builder = builder.prompt(p);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
