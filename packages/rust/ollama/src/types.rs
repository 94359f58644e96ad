//! Wire types for the Ollama REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct EmbedRequest<'a> {
    pub model: &'a str,
    pub input: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PullRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedResponse {
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullResponse {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionResponse {
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A completed (non-streaming) generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Model that produced the text.
    pub model: String,
    /// Generated text.
    pub text: String,
    /// Whether the model reported completion.
    pub done: bool,
    /// Wall-clock time spent, in nanoseconds, as reported by Ollama.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ns: Option<u64>,
    /// Number of tokens generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
}

impl From<GenerateResponse> for Generation {
    fn from(resp: GenerateResponse) -> Self {
        Self {
            model: resp.model,
            text: resp.response,
            done: resp.done,
            total_duration_ns: resp.total_duration,
            eval_count: resp.eval_count,
        }
    }
}

/// A locally installed model, as listed by `/api/tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Full model name including tag, e.g. `llama2:latest`.
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,
    /// Content digest.
    #[serde(default)]
    pub digest: String,
    /// Last modification time.
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl ModelInfo {
    /// Whether this model satisfies a requested name. An untagged request
    /// matches the `:latest` tag.
    pub fn matches(&self, requested: &str) -> bool {
        if self.name == requested {
            return true;
        }
        !requested.contains(':') && self.name == format!("{requested}:latest")
    }
}
