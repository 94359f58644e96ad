//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use tweetrag_core::ingest::{self, IngestConfig, IngestResult, IngestSource, ProgressReporter};
use tweetrag_core::rag::{self, PromptTemplate, RagRequest};
use tweetrag_core::{Embedder, Generator, setup};
use tweetrag_shared::{
    AppConfig, ModelConfig, TweetRagError, expand_home, init_config, load_config, preview,
    validate_config,
};
use tweetrag_storage::Storage;

/// Preview length for sample tweets after ingest.
const SAMPLE_PREVIEW_CHARS: usize = 80;

/// Preview length for retrieved tweets.
const HIT_PREVIEW_CHARS: usize = 100;

/// Ingest runs shown by `info`.
const RECENT_RUNS: usize = 5;

/// Words that end a chat session.
const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// TweetRAG: ask questions about your tweet archive with a local LLM.
#[derive(Parser)]
#[command(
    name = "tweetrag",
    version,
    about = "Embed a markdown tweet archive and chat with it using local Ollama models.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Vector database file (overrides config).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Collection name (overrides config).
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Ollama base URL (overrides config and OLLAMA_HOST).
    #[arg(long, global = true)]
    pub ollama_url: Option<String>,

    /// Embedding model (overrides config).
    #[arg(long, global = true)]
    pub embedding_model: Option<String>,

    /// Generation model (overrides config).
    #[arg(long, global = true)]
    pub generation_model: Option<String>,

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
    /// Load a tweet archive and embed any tweets not yet stored.
    Ingest {
        /// A single markdown archive file.
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// Directory of archive files (defaults to the configured tweets dir).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// File pattern for directory ingestion.
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Ask a single question about the archive.
    Ask {
        /// The question.
        question: String,

        /// Number of tweets to use as context.
        #[arg(short = 'k', long)]
        n_results: Option<usize>,
    },

    /// Interactive question loop.
    Chat {
        /// Number of tweets to use as context.
        #[arg(short = 'k', long)]
        n_results: Option<usize>,
    },

    /// Show the tweets most similar to a query, without generating.
    Search {
        /// Search text.
        query: String,

        /// Number of results.
        #[arg(short = 'k', long, default_value = "5")]
        n_results: usize,
    },

    /// Show collection info and recent ingest runs.
    Info,

    /// Check that Ollama is reachable and the models are installed.
    Setup {
        /// Pull any missing models.
        #[arg(long)]
        pull: bool,
    },

    /// Delete the collection and its ingest history.
    Reset {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
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

/// Initialize tracing based on CLI flags. Logs go to stderr so answers on
/// stdout stay pipeable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "tweetrag=info",
        1 => "tweetrag=debug",
        _ => "tweetrag=trace",
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
// Config resolution
// ---------------------------------------------------------------------------

/// Everything a command needs, resolved from defaults, file, env and flags.
struct Resolved {
    config: AppConfig,
    db_path: PathBuf,
    collection: String,
    models: ModelConfig,
}

/// Apply CLI flag overrides on top of the loaded config.
fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(db) = &cli.db {
        config.defaults.db_path = db.to_string_lossy().to_string();
    }
    if let Some(collection) = &cli.collection {
        config.defaults.collection = collection.clone();
    }
    if let Some(url) = &cli.ollama_url {
        config.ollama.base_url = url.clone();
    }
    if let Some(model) = &cli.embedding_model {
        config.ollama.embedding_model = model.clone();
    }
    if let Some(model) = &cli.generation_model {
        config.ollama.generation_model = model.clone();
    }
}

fn resolve(cli: &Cli) -> Result<Resolved> {
    let mut config = load_config()?;
    apply_cli_overrides(&mut config, cli);
    validate_config(&config)?;

    let models = ModelConfig::try_from(&config)?;
    Ok(Resolved {
        db_path: expand_home(&config.defaults.db_path),
        collection: config.defaults.collection.clone(),
        models,
        config,
    })
}

/// Open the database read-only, pointing at `ingest` when it does not exist yet.
async fn open_for_reading(db_path: &Path) -> Result<Storage> {
    match Storage::open_readonly(db_path).await {
        Ok(storage) => Ok(storage),
        Err(TweetRagError::Io { .. }) => Err(eyre!(
            "no tweet database at '{}'; run `tweetrag ingest` first",
            db_path.display()
        )),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&cli).await,
        };
    }

    let resolved = resolve(&cli)?;
    match cli.command {
        Command::Ingest { file, dir, pattern } => {
            cmd_ingest(&resolved, file, dir, pattern).await
        }
        Command::Ask {
            question,
            n_results,
        } => cmd_ask(&resolved, &question, n_results).await,
        Command::Chat { n_results } => cmd_chat(&resolved, n_results).await,
        Command::Search { query, n_results } => cmd_search(&resolved, &query, n_results).await,
        Command::Info => cmd_info(&resolved).await,
        Command::Setup { pull } => cmd_setup(&resolved, pull).await,
        Command::Reset { yes } => cmd_reset(&resolved, yes).await,
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Pick the ingest source: an explicit file, else a directory with a pattern.
fn ingest_source(
    config: &AppConfig,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    pattern: Option<String>,
) -> IngestSource {
    match file {
        Some(path) => IngestSource::File(path),
        None => IngestSource::Directory {
            dir: dir.unwrap_or_else(|| PathBuf::from(&config.defaults.tweets_dir)),
            pattern: pattern.unwrap_or_else(|| config.defaults.file_pattern.clone()),
        },
    }
}

async fn cmd_ingest(
    resolved: &Resolved,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    pattern: Option<String>,
) -> Result<()> {
    let source = ingest_source(&resolved.config, file, dir, pattern);

    // Fail on a bad source before creating the database
    ingest::check_source(&source)?;

    let (_client, embedder, _generator) = tweetrag_core::ollama_models(&resolved.models)?;
    let storage = Storage::open(&resolved.db_path).await?;

    info!(
        collection = %resolved.collection,
        model = embedder.model_name(),
        db = %resolved.db_path.display(),
        "ingesting tweets"
    );

    let config = IngestConfig {
        source,
        collection: resolved.collection.clone(),
    };
    let reporter = CliProgress::new();
    let report = ingest::ingest(&config, &embedder, &storage, &reporter).await?;
    let result = &report.result;

    println!();
    println!("  Collection: {}", result.collection.name);
    println!("  Documents:  {}", result.collection.document_count);
    println!("  Model:      {}", result.collection.embedding_model);
    println!(
        "  This run:   {} embedded, {} already stored, {} duplicates, {} failed",
        result.embedded,
        result.skipped,
        result.duplicates,
        result.failed()
    );
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());

    if !report.samples.is_empty() {
        println!();
        println!("  Sample tweets:");
        for (i, tweet) in report.samples.iter().enumerate() {
            println!("  {}. {}", i + 1, tweet.preview(SAMPLE_PREVIEW_CHARS));
            if let Some(ts) = &tweet.timestamp {
                println!("     {ts}");
            }
        }
    }

    if !result.failures.is_empty() {
        println!();
        println!("  Failed tweets (re-run ingest to retry):");
        for (id, err) in &result.failures {
            println!("  - {id}: {err}");
        }
    }
    println!();

    Ok(())
}

fn rag_request(resolved: &Resolved, question: &str, n_results: Option<usize>) -> Result<RagRequest> {
    let template = PromptTemplate::from_config(resolved.config.prompt.template.as_deref())?;
    Ok(RagRequest {
        collection: resolved.collection.clone(),
        question: question.to_string(),
        n_results: n_results.unwrap_or(resolved.config.defaults.context_tweets),
        template,
    })
}

fn print_answer(answer: &rag::RagAnswer) {
    println!();
    if answer.hits.is_empty() {
        println!("  No matching tweets found.");
    } else {
        println!("  Retrieved tweets:");
        for (i, hit) in answer.hits.iter().enumerate() {
            println!("  {}. {}", i + 1, hit.tweet.preview(HIT_PREVIEW_CHARS));
        }
    }
    println!();
    println!("Answer:");
    println!("{}", answer.answer);
    println!();
}

async fn cmd_ask(resolved: &Resolved, question: &str, n_results: Option<usize>) -> Result<()> {
    let storage = open_for_reading(&resolved.db_path).await?;
    let (_client, embedder, generator) = tweetrag_core::ollama_models(&resolved.models)?;
    let request = rag_request(resolved, question, n_results)?;

    let spinner = thinking_spinner(generator.model_name());
    let result = rag::answer(&embedder, &generator, &storage, &request).await;
    spinner.finish_and_clear();

    print_answer(&result?);
    Ok(())
}

/// Whether a chat input line ends the session.
fn is_exit_command(line: &str) -> bool {
    EXIT_COMMANDS
        .iter()
        .any(|cmd| line.trim().eq_ignore_ascii_case(cmd))
}

async fn cmd_chat(resolved: &Resolved, n_results: Option<usize>) -> Result<()> {
    let storage = open_for_reading(&resolved.db_path).await?;
    let (_client, embedder, generator) = tweetrag_core::ollama_models(&resolved.models)?;
    // Validate the template once, up front
    rag_request(resolved, "", n_results)?;

    println!(
        "Chatting with '{}' ({} tweets). Type 'quit' to exit.",
        resolved.collection,
        storage.count(&resolved.collection).await?
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_command(question) {
            break;
        }

        let request = rag_request(resolved, question, n_results)?;
        let spinner = thinking_spinner(generator.model_name());
        let result = rag::answer(&embedder, &generator, &storage, &request).await;
        spinner.finish_and_clear();

        match result {
            Ok(answer) => print_answer(&answer),
            Err(e) => {
                warn!(error = %e, "question failed");
                println!("Error: {e}");
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn cmd_search(resolved: &Resolved, query: &str, n_results: usize) -> Result<()> {
    let storage = open_for_reading(&resolved.db_path).await?;
    let (_client, embedder, _generator) = tweetrag_core::ollama_models(&resolved.models)?;

    let results =
        rag::search_similar(&embedder, &storage, &resolved.collection, query, n_results).await?;

    if results.hits.is_empty() {
        println!("No matching tweets found.");
        return Ok(());
    }

    println!();
    for (i, hit) in results.hits.iter().enumerate() {
        println!(
            "  {}. [{:.4}] {}",
            i + 1,
            hit.distance,
            hit.tweet.preview(HIT_PREVIEW_CHARS)
        );
        if let Some(ts) = &hit.tweet.timestamp {
            println!("     {ts}");
        }
        if let Some(url) = &hit.tweet.url {
            println!("     {url}");
        }
    }
    println!();
    Ok(())
}

async fn cmd_info(resolved: &Resolved) -> Result<()> {
    let storage = open_for_reading(&resolved.db_path).await?;

    let Some(info) = storage.get_collection(&resolved.collection).await? else {
        println!(
            "Collection '{}' does not exist yet. Run `tweetrag ingest` first.",
            resolved.collection
        );
        return Ok(());
    };

    println!();
    println!("  Collection: {}", info.name);
    println!("  Documents:  {}", info.document_count);
    println!("  Model:      {}", info.embedding_model);
    match info.dimension {
        Some(dim) => println!("  Dimension:  {dim}"),
        None => println!("  Dimension:  (empty)"),
    }
    println!("  Created:    {}", info.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Updated:    {}", info.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Database:   {}", resolved.db_path.display());

    let runs = storage
        .list_ingest_runs(&resolved.collection, RECENT_RUNS)
        .await?;
    if !runs.is_empty() {
        println!();
        println!("  Recent ingest runs:");
        for run in &runs {
            let when = run.started_at.format("%Y-%m-%d %H:%M:%S");
            match (&run.finished_at, &run.stats) {
                (Some(_), Some(stats)) => println!(
                    "  - {when}  embedded {}, skipped {}, failed {}",
                    stats["embedded"], stats["skipped"], stats["failed"]
                ),
                _ => println!("  - {when}  (interrupted)"),
            }
        }
    }
    println!();
    Ok(())
}

async fn cmd_setup(resolved: &Resolved, pull: bool) -> Result<()> {
    let (client, _embedder, _generator) = tweetrag_core::ollama_models(&resolved.models)?;

    let report = setup::check_setup(&client, &resolved.models)
        .await
        .map_err(|e| {
            eyre!(
                "cannot reach Ollama at {}: {e}\n  Install it from https://ollama.com and run `ollama serve`.",
                resolved.models.base_url
            )
        })?;

    println!();
    println!("  Ollama:     {} (v{})", resolved.models.base_url, report.server_version);
    for model in &report.required {
        let mark = if model.installed { "ok" } else { "missing" };
        println!("  {:<11} {} [{mark}]", format!("{}:", model.role.as_str()), model.name);
    }
    println!();

    if report.is_ready() {
        println!("  All models installed. Ready to ingest.");
        println!();
        return Ok(());
    }

    if pull {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Pulling missing models (this can take a while)");
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        let pulled = setup::pull_missing(&client, &report).await;
        spinner.finish_and_clear();
        for name in pulled? {
            println!("  Pulled {name}");
        }
    } else {
        for model in report.missing() {
            println!("  Run `ollama pull {}` or `tweetrag setup --pull`.", model.name);
        }
    }
    println!();
    Ok(())
}

async fn cmd_reset(resolved: &Resolved, yes: bool) -> Result<()> {
    if !yes {
        return Err(eyre!(
            "this deletes collection '{}' and all its embeddings; pass --yes to confirm",
            resolved.collection
        ));
    }

    let storage = Storage::open(&resolved.db_path).await?;
    if storage.delete_collection(&resolved.collection).await? {
        println!("Deleted collection '{}'.", resolved.collection);
    } else {
        println!("Collection '{}' does not exist.", resolved.collection);
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(cli: &Cli) -> Result<()> {
    let mut config: AppConfig = load_config()?;
    apply_cli_overrides(&mut config, cli);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn thinking_spinner(model: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Thinking ({model})..."));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn tweet_embedded(&self, tweet_id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Embedding [{current}/{total}] {tweet_id}"));
    }

    fn done(&self, _result: &IngestResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands_are_case_insensitive() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("  EXIT "));
        assert!(is_exit_command("Q"));
        assert!(!is_exit_command("quite"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "tweetrag",
            "--collection",
            "archive2009",
            "--generation-model",
            "mistral",
            "ask",
            "what?",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.defaults.collection, "archive2009");
        assert_eq!(config.ollama.generation_model, "mistral");
        assert_eq!(config.ollama.embedding_model, "mxbai-embed-large");
    }

    #[test]
    fn global_flags_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["tweetrag", "search", "rails", "-k", "2", "--db", "x.db"])
            .unwrap();
        assert_eq!(cli.db.as_deref(), Some(Path::new("x.db")));
        match cli.command {
            Command::Search { query, n_results } => {
                assert_eq!(query, "rails");
                assert_eq!(n_results, 2);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn ingest_source_defaults_to_tweets_dir() {
        let config = AppConfig::default();
        assert_eq!(
            ingest_source(&config, None, None, None),
            IngestSource::Directory {
                dir: PathBuf::from("data"),
                pattern: "*.md".into()
            }
        );
        assert_eq!(
            ingest_source(&config, Some("a.md".into()), None, None),
            IngestSource::File(PathBuf::from("a.md"))
        );
    }

    #[test]
    fn file_and_dir_conflict() {
        assert!(
            Cli::try_parse_from(["tweetrag", "ingest", "--file", "a.md", "--dir", "data"]).is_err()
        );
    }
}
