//! HTTP client for a local Ollama runtime.
//!
//! Covers the endpoints TweetRAG needs: embeddings (`/api/embed`),
//! non-streaming generation (`/api/generate`), and the setup helpers
//! (`/api/tags`, `/api/pull`, `/api/version`).

mod types;

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use tweetrag_shared::{ModelConfig, Result, TweetRagError};

pub use types::{Generation, ModelInfo};
use types::{
    EmbedRequest, EmbedResponse, ErrorResponse, GenerateRequest, GenerateResponse, PullRequest,
    PullResponse, TagsResponse, VersionResponse,
};

/// User-Agent string for Ollama requests.
const USER_AGENT: &str = concat!("TweetRAG/", env!("CARGO_PKG_VERSION"));

/// Default timeout for requests in seconds. Generation on CPU is slow.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Pulls download gigabytes; allow far longer than ordinary requests.
const PULL_TIMEOUT_SECS: u64 = 60 * 60;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Connection settings for [`OllamaClient`].
#[derive(Debug, Clone)]
pub struct OllamaOptions {
    /// Base URL of the Ollama server.
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OllamaOptions {
    /// Options for a server at `base_url` with the default timeout.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl From<&ModelConfig> for OllamaOptions {
    fn from(config: &ModelConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin async client for the Ollama REST API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: Url,
}

impl OllamaClient {
    /// Build a client for the given server.
    pub fn new(opts: &OllamaOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| TweetRagError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(&opts.base_url),
        })
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Embed a single text.
    #[instrument(skip_all, fields(model = %model))]
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(model, &[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| TweetRagError::Model(format!("{model}: no embedding returned")))
    }

    /// Embed several texts in one request. Output order matches input order.
    #[instrument(skip_all, fields(model = %model, count = texts.len()))]
    pub async fn embed_batch(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let req = EmbedRequest {
            model,
            input: texts,
        };
        let resp: EmbedResponse = self.post_json("api/embed", &req).await?;

        if resp.embeddings.len() != texts.len() {
            return Err(TweetRagError::Model(format!(
                "{model}: expected {} embeddings, got {}",
                texts.len(),
                resp.embeddings.len()
            )));
        }
        if resp.embeddings.iter().any(Vec::is_empty) {
            return Err(TweetRagError::Model(format!("{model}: empty embedding vector")));
        }

        debug!(
            dimension = resp.embeddings[0].len(),
            "received embeddings"
        );
        Ok(resp.embeddings)
    }

    /// Generate a completion for `prompt` without streaming.
    #[instrument(skip_all, fields(model = %model, prompt_len = prompt.len()))]
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<Generation> {
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let resp: GenerateResponse = self.post_json("api/generate", &req).await?;
        let generation = Generation::from(resp);

        debug!(
            chars = generation.text.len(),
            eval_count = ?generation.eval_count,
            "generation complete"
        );
        Ok(generation)
    }

    /// List locally installed models.
    #[instrument(skip_all)]
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("api/tags")?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TweetRagError::network(&url, e))?;
        let tags: TagsResponse = decode(&url, response).await?;
        Ok(tags.models)
    }

    /// Download a model, blocking until the pull completes.
    #[instrument(skip_all, fields(model = %model))]
    pub async fn pull_model(&self, model: &str) -> Result<()> {
        info!("pulling model");
        let url = self.endpoint("api/pull")?;
        let req = PullRequest {
            model,
            stream: false,
        };
        let response = self
            .client
            .post(url.clone())
            .timeout(Duration::from_secs(PULL_TIMEOUT_SECS))
            .json(&req)
            .send()
            .await
            .map_err(|e| TweetRagError::network(&url, e))?;
        let resp: PullResponse = decode(&url, response).await?;

        if resp.status != "success" {
            return Err(TweetRagError::Model(format!(
                "{model}: pull ended with status '{}'",
                resp.status
            )));
        }
        info!("model pulled");
        Ok(())
    }

    /// Server version. Doubles as a reachability check.
    #[instrument(skip_all)]
    pub async fn version(&self) -> Result<String> {
        let url = self.endpoint("api/version")?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TweetRagError::network(&url, e))?;
        let resp: VersionResponse = decode(&url, response).await?;
        Ok(resp.version)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| TweetRagError::config(format!("invalid endpoint '{path}': {e}")))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| TweetRagError::network(&url, e))?;
        decode(&url, response).await
    }
}

/// Check the status and decode a JSON body, surfacing Ollama's `error` text.
async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TweetRagError::network(url, format!("failed to read body: {e}")))?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(TweetRagError::network(
            url,
            format!("HTTP {status}: {}", detail.trim()),
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| TweetRagError::parse(format!("{url}: unexpected response body: {e}")))
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
