//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use docsift_core::{DocumentProcessor, ProgressReporter, Retriever, SkipReason, StageSummary};
use docsift_fetch::{HttpFetcher, JsonFileSearch};
use docsift_shared::{AppConfig, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docsift: turn search results into chunked, section-tagged text.
#[derive(Parser)]
#[command(
    name = "docsift",
    version,
    about = "Retrieve documents and reduce them to bounded, section-tagged text chunks.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docsift/docsift.toml.
    #[arg(long, global = true, env = "DOCSIFT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sanitize and chunk a retrieval batch.
    Process {
        /// Retrieval batch JSON (stdin when omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the processed batch (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum characters per chunk.
        #[arg(long)]
        max_chunk_size: Option<usize>,

        /// Documents processed at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Search for a structured query and fetch the resulting pages.
    Retrieve {
        /// JSON file of saved search hits.
        #[arg(long)]
        results: PathBuf,

        /// Structured query JSON (stdin when omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the retrieval batch (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum search hits to fetch.
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Retrieve, then process, in one go.
    Run {
        /// JSON file of saved search hits.
        #[arg(long)]
        results: PathBuf,

        /// Structured query JSON (stdin when omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the processed batch (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// only stage payloads.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsift=info",
        1 => "docsift=debug",
        _ => "docsift=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Process {
            input,
            output,
            max_chunk_size,
            concurrency,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(size) = max_chunk_size {
                config.chunking.max_chunk_size = size;
            }
            if let Some(n) = concurrency {
                config.processing.concurrency = n;
            }
            config.validate()?;
            cmd_process(&config, input.as_deref(), output.as_deref()).await
        }
        Command::Retrieve {
            results,
            input,
            output,
            max_results,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(n) = max_results {
                config.retrieval.max_search_results = n;
            }
            config.validate()?;
            cmd_retrieve(&config, &results, input.as_deref(), output.as_deref()).await
        }
        Command::Run {
            results,
            input,
            output,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_run(&config, &results, input.as_deref(), output.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Stage commands
// ---------------------------------------------------------------------------

async fn cmd_process(
    config: &AppConfig,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let payload = read_input(input).await?;

    info!(
        max_chunk_size = config.chunking.max_chunk_size,
        concurrency = config.processing.concurrency,
        "processing documents"
    );

    let reporter = CliProgress::new();
    let out = process_payload(config, &payload, &reporter).await;

    write_output(output, &out).await?;
    fail_on_envelope(&out)
}

async fn cmd_retrieve(
    config: &AppConfig,
    results: &Path,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let payload = read_input(input).await?;

    info!(
        results = %results.display(),
        max_results = config.retrieval.max_search_results,
        "retrieving documents"
    );

    let reporter = CliProgress::new();
    let out = retrieve_payload(config, results, &payload, &reporter).await?;

    write_output(output, &out).await?;
    fail_on_envelope(&out)
}

async fn cmd_run(
    config: &AppConfig,
    results: &Path,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let payload = read_input(input).await?;

    // Each stage finishes its own spinner in `done`, so each gets a fresh one.
    let retrieved = retrieve_payload(config, results, &payload, &CliProgress::new()).await?;
    // An envelope must not be handed on as if it were a batch.
    let out = if envelope_message(&retrieved).is_some() {
        retrieved
    } else {
        process_payload(config, &retrieved, &CliProgress::new()).await
    };

    write_output(output, &out).await?;
    fail_on_envelope(&out)
}

async fn retrieve_payload(
    config: &AppConfig,
    results: &Path,
    payload: &str,
    reporter: &CliProgress,
) -> Result<String> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.retrieval.fetch_timeout_secs))?;
    let retriever = Retriever::new(
        JsonFileSearch::new(results),
        fetcher,
        config.retrieval.clone(),
    );
    Ok(retriever.run_with(payload, reporter).await)
}

async fn process_payload(config: &AppConfig, payload: &str, reporter: &CliProgress) -> String {
    let processor = Arc::new(DocumentProcessor::from_config(config));
    processor.process_concurrent(payload, reporter).await
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => tokio::fs::read_to_string(p)
            .await
            .wrap_err_with(|| format!("failed to read input '{}'", p.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .wrap_err("failed to read input from stdin")?;
            Ok(buf)
        }
    }
}

async fn write_output(path: Option<&Path>, payload: &str) -> Result<()> {
    match path {
        Some(p) => tokio::fs::write(p, format!("{payload}\n"))
            .await
            .wrap_err_with(|| format!("failed to write output '{}'", p.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(payload.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}

/// The `error` message of a `{"error": ...}` envelope, if `payload` is one.
fn envelope_message(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get("error")?.as_str().map(String::from)
}

fn fail_on_envelope(payload: &str) -> Result<()> {
    match envelope_message(payload) {
        Some(message) => Err(eyre!("stage returned an error: {message}")),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {url}"));
    }

    fn document_started(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Processing [{current}/{total}] {url}"));
    }

    fn document_skipped(&self, url: &str, reason: &SkipReason) {
        self.spinner.println(format!("  skipped {url}: {reason}"));
    }

    fn done(&self, summary: &StageSummary) {
        self.spinner.finish_and_clear();
        eprintln!(
            "  {}: kept {}/{} in {:.1}s (run {})",
            summary.stage,
            summary.kept,
            summary.received,
            summary.elapsed.as_secs_f64(),
            summary.run_id,
        );
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
