//! TweetRAG TUI: interactive terminal chat over a tweet archive.
//!
//! Two tabs, built with `ratatui` + `crossterm`: a chat screen that answers
//! questions from the archive, and an archive screen showing the collection
//! and its ingest history.

mod app;
mod screens;
mod widgets;

use std::fs::File;

use color_eyre::eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tweetrag_shared::{config_dir, load_config, validate_config};

/// Log file written under the config directory; the terminal belongs to the UI.
const LOG_FILE_NAME: &str = "tui.log";

fn main() -> Result<()> {
    color_eyre::install()?;
    let _guard = init_file_logging()?;

    let config = load_config()?;
    validate_config(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let ctx = app::AppContext::new(config, runtime.handle().clone())?;
    app::run(ctx)
}

/// Route tracing to `~/.tweetrag/tui.log`. The guard must outlive the app.
fn init_file_logging() -> Result<WorkerGuard> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = File::options()
        .append(true)
        .create(true)
        .open(dir.join(LOG_FILE_NAME))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tweetrag=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(non_blocking)
        .init();

    Ok(guard)
}
