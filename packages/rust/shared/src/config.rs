//! Application configuration for TweetRAG.
//!
//! User config lives at `~/.tweetrag/tweetrag.toml`.
//! CLI flags override environment variables, which override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TweetRagError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tweetrag.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tweetrag";

/// Env var overriding `[ollama].base_url` (same name the Ollama CLI reads).
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

/// Env var overriding `[ollama].embedding_model`.
pub const EMBEDDING_MODEL_ENV: &str = "TWEETRAG_EMBEDDING_MODEL";

/// Env var overriding `[ollama].generation_model`.
pub const GENERATION_MODEL_ENV: &str = "TWEETRAG_GENERATION_MODEL";

/// Placeholder replaced with the retrieved tweets in a prompt template.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Placeholder replaced with the user's question in a prompt template.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

// ---------------------------------------------------------------------------
// Config structs (matching tweetrag.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Ollama runtime settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Prompt settings.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the vector database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory scanned by `ingest` when no file is given.
    #[serde(default = "default_tweets_dir")]
    pub tweets_dir: String,

    /// File name pattern for directory ingestion.
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Vector collection name.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Number of similar tweets fed to the generator as context.
    #[serde(default = "default_context_tweets")]
    pub context_tweets: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            tweets_dir: default_tweets_dir(),
            file_pattern: default_file_pattern(),
            collection: default_collection(),
            context_tweets: default_context_tweets(),
        }
    }
}

fn default_db_path() -> String {
    "~/.tweetrag/tweets.db".into()
}
fn default_tweets_dir() -> String {
    "data".into()
}
fn default_file_pattern() -> String {
    "*.md".into()
}
fn default_collection() -> String {
    "tweets".into()
}
fn default_context_tweets() -> usize {
    3
}

/// `[ollama]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for tweet and query embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Model used for answer generation.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Per-request timeout. Generation on CPU can be slow.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_embedding_model() -> String {
    "mxbai-embed-large".into()
}
fn default_generation_model() -> String {
    "llama2".into()
}
fn default_timeout_secs() -> u64 {
    120
}

/// `[prompt]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Custom prompt template; must contain `{context}` and `{question}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

// ---------------------------------------------------------------------------
// Runtime config (merged from config + env + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime model configuration after file, env and CLI flags are merged.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Ollama API base URL.
    pub base_url: Url,
    /// Embedding model name.
    pub embedding_model: String,
    /// Generation model name.
    pub generation_model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl TryFrom<&AppConfig> for ModelConfig {
    type Error = TweetRagError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(&config.ollama.base_url)?,
            embedding_model: config.ollama.embedding_model.clone(),
            generation_model: config.ollama.generation_model.clone(),
            timeout_secs: config.ollama.timeout_secs,
        })
    }
}

/// Port the Ollama server listens on by default.
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Parse and check an Ollama base URL.
///
/// Bare `host` or `host:port` values (as accepted by `OLLAMA_HOST`) get an
/// `http://` scheme, and the Ollama port when none is given. A URL with an
/// explicit scheme keeps that scheme's default port.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let invalid = |e: &dyn std::fmt::Display| {
        TweetRagError::config(format!("invalid Ollama base URL '{raw}': {e}"))
    };

    let url = if raw.contains("://") {
        Url::parse(raw).map_err(|e| invalid(&e))?
    } else {
        let mut url = Url::parse(&format!("http://{raw}")).map_err(|e| invalid(&e))?;
        if !has_explicit_port(raw) {
            url.set_port(Some(DEFAULT_OLLAMA_PORT))
                .map_err(|()| invalid(&"host cannot carry a port"))?;
        }
        url
    };

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(&format!("unsupported scheme '{other}'"))),
    }
}

/// Whether a scheme-less `host[:port][/path]` names a port.
fn has_explicit_port(raw: &str) -> bool {
    let authority = raw.split('/').next().unwrap_or(raw);
    authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tweetrag/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TweetRagError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tweetrag/tweetrag.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk and apply environment overrides.
/// Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TweetRagError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TweetRagError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(host) = non_empty(OLLAMA_HOST_ENV) {
        config.ollama.base_url = host;
    }
    if let Some(model) = non_empty(EMBEDDING_MODEL_ENV) {
        config.ollama.embedding_model = model;
    }
    if let Some(model) = non_empty(GENERATION_MODEL_ENV) {
        config.ollama.generation_model = model;
    }
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TweetRagError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TweetRagError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TweetRagError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Check that the resolved config is usable before talking to Ollama.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    parse_base_url(&config.ollama.base_url)?;

    if config.defaults.context_tweets == 0 {
        return Err(TweetRagError::config(
            "defaults.context_tweets must be at least 1",
        ));
    }

    if config.ollama.embedding_model.trim().is_empty() {
        return Err(TweetRagError::config("ollama.embedding_model is empty"));
    }
    if config.ollama.generation_model.trim().is_empty() {
        return Err(TweetRagError::config("ollama.generation_model is empty"));
    }

    if let Some(template) = &config.prompt.template {
        validate_template(template)?;
    }

    Ok(())
}

/// A prompt template must mention both placeholders.
pub fn validate_template(template: &str) -> Result<()> {
    for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(TweetRagError::config(format!(
                "prompt template is missing the {placeholder} placeholder"
            )));
        }
    }
    Ok(())
}
