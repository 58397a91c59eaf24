//! docsift CLI: retrieve documents and reduce them to section-tagged chunks.
//!
//! Each stage reads one JSON payload and writes one JSON payload, so the
//! commands compose with pipes as well as with files.

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
