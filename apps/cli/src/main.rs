//! pdfrag CLI: ingest PDFs and ask questions about them.
//!
//! Stands in for an HTTP front end: each subcommand builds one request,
//! runs it through the engine, and prints the response.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
