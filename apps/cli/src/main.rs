//! TweetRAG CLI: chat with your own tweet archive.
//!
//! Embeds a markdown tweet export into a local vector store and answers
//! questions about it with a locally running Ollama model.

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
