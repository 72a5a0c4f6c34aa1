//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use pdfrag_core::{
    Engine, IngestRequest, ProgressReporter, Providers, QueryRequest, WireMessage,
};
use pdfrag_shared::{
    AppConfig, DocumentId, PipelineConfig, init_config, load_config, validate_api_key,
};
use tracing::info;

/// Crates whose events the default filter lets through.
const LOG_TARGETS: [&str; 6] = [
    "pdfrag",
    "pdfrag_core",
    "pdfrag_loader",
    "pdfrag_providers",
    "pdfrag_storage",
    "pdfrag_shared",
];

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pdfrag: question answering over PDF documents.
#[derive(Parser)]
#[command(
    name = "pdfrag",
    version,
    about = "Index PDF documents and answer questions about them.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Override the index root directory from the config file.
    #[arg(long, global = true, env = "PDFRAG_STORES_DIR")]
    pub stores_dir: Option<PathBuf>,

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
    /// Download a PDF and build its vector index.
    Ingest {
        /// URL of the PDF.
        url: String,

        /// Identifier the index is stored under.
        #[arg(long)]
        document_id: DocumentId,
    },

    /// Ask a question about an ingested document.
    Query {
        #[arg(long)]
        document_id: DocumentId,

        #[arg(short, long)]
        question: String,

        /// JSON file with prior messages: `[{"role": "user"|"bot", "text": "..."}]`.
        #[arg(long)]
        messages: Option<PathBuf>,

        /// Print the resulting history as JSON after the answer.
        #[arg(long)]
        show_history: bool,
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

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
    let stores_dir = cli.stores_dir;
    match cli.command {
        Command::Ingest { url, document_id } => {
            cmd_ingest(url, document_id, stores_dir.as_deref()).await
        }
        Command::Query {
            document_id,
            question,
            messages,
            show_history,
        } => {
            cmd_query(
                document_id,
                question,
                messages.as_deref(),
                show_history,
                stores_dir.as_deref(),
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Load config, apply flag overrides, and wire the engine.
fn build_engine(stores_dir: Option<&Path>) -> Result<Engine> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let mut pipeline = PipelineConfig::from(&config);
    if let Some(dir) = stores_dir {
        pipeline.stores_dir = dir.to_path_buf();
    }

    Ok(Engine::new(&pipeline, Providers::openai(&config)?)?)
}

async fn cmd_ingest(url: String, document_id: DocumentId, stores_dir: Option<&Path>) -> Result<()> {
    let engine = build_engine(stores_dir)?;
    info!(%url, %document_id, "ingesting document");

    let reporter = CliProgress::new();
    let response = engine
        .ingest(
            IngestRequest {
                source_url: url,
                document_id,
            },
            &reporter,
        )
        .await?;
    drop(reporter);

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_query(
    document_id: DocumentId,
    question: String,
    messages_file: Option<&Path>,
    show_history: bool,
    stores_dir: Option<&Path>,
) -> Result<()> {
    let messages = match messages_file {
        Some(path) => read_messages(path)?,
        None => Vec::new(),
    };
    let engine = build_engine(stores_dir)?;

    let reporter = CliProgress::new();
    let response = engine
        .query(
            QueryRequest {
                document_id,
                question,
                messages,
            },
            &reporter,
        )
        .await?;
    drop(reporter);

    println!("{}", response.answer);
    if show_history {
        println!("{}", serde_json::to_string_pretty(&response.history)?);
    }
    Ok(())
}

fn read_messages(path: &Path) -> Result<Vec<WireMessage>> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("{} is not a JSON array of messages", path.display()))
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner showing the pipeline step currently running.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn step(&self, workflow: &str, step: &str) {
        self.spinner.set_message(format!("{workflow}: {}", step.replace('_', " ")));
    }

    fn done(&self, _workflow: &str, _elapsed: Duration) {
        self.spinner.finish_and_clear();
    }
}

// A failed run never reaches `done`.
impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ingest() {
        let cli = Cli::try_parse_from([
            "pdfrag",
            "ingest",
            "https://example.com/a.pdf",
            "--document-id",
            "42",
        ])
        .unwrap();

        match cli.command {
            Command::Ingest { url, document_id } => {
                assert_eq!(url, "https://example.com/a.pdf");
                assert_eq!(document_id, DocumentId(42));
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn parses_query_with_history_file() {
        let cli = Cli::try_parse_from([
            "pdfrag",
            "-v",
            "query",
            "--document-id",
            "7",
            "-q",
            "What is the summary?",
            "--messages",
            "history.json",
            "--show-history",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Query {
                document_id,
                question,
                messages,
                show_history,
            } => {
                assert_eq!(document_id, DocumentId(7));
                assert_eq!(question, "What is the summary?");
                assert_eq!(messages, Some(PathBuf::from("history.json")));
                assert!(show_history);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn rejects_non_numeric_document_id() {
        let parsed = Cli::try_parse_from(["pdfrag", "ingest", "https://x.test/a.pdf", "--document-id", "abc"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn reads_messages_file() {
        let path = std::env::temp_dir().join(format!("pdfrag-messages-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"role":"user","text":"hi"},{"role":"bot","messages":"hello"}]"#,
        )
        .unwrap();

        let messages = read_messages(&path).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, "bot");
        assert_eq!(messages[1].text, "hello");

        let _ = std::fs::remove_file(&path);
    }
}
