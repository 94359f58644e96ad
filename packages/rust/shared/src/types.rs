//! Core domain types for TweetRAG archives and collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format tag recorded for tweets parsed from markdown archives.
pub const MARKDOWN_FORMAT: &str = "markdown";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for ingest run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Tweet
// ---------------------------------------------------------------------------

/// A single tweet extracted from an archive, with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    /// Status ID from the tweet URL, or a content-derived `md_` fallback.
    pub tweet_id: String,
    /// Tweet text (blockquote lines joined by spaces).
    pub content: String,
    /// Raw timestamp as written in the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Parsed timestamp, when the raw form is recognized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    /// Status URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Author handle from the status URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// File the tweet was loaded from.
    pub source_file: String,
    /// Archive format tag.
    pub format: String,
}

impl Tweet {
    /// Character count of the tweet text.
    pub fn length(&self) -> usize {
        self.content.chars().count()
    }

    /// Truncate the tweet text for display, appending `...` when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.content, max_chars)
    }
}

/// Truncate `text` to `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

// ---------------------------------------------------------------------------
// Search & collection types
// ---------------------------------------------------------------------------

/// A stored tweet returned by a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The stored tweet.
    pub tweet: Tweet,
    /// Cosine distance to the query vector (lower is closer).
    pub distance: f64,
}

/// Summary of a vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Embedding model the vectors were produced with.
    pub embedding_model: String,
    /// Vector dimension, fixed by the first insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    /// Number of stored tweets.
    pub document_count: usize,
    /// When the collection was created.
    pub created_at: DateTime<Utc>,
    /// When the collection last changed.
    pub updated_at: DateTime<Utc>,
}

/// A recorded ingest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRun {
    /// Run identifier.
    pub id: RunId,
    /// Collection ingested into.
    pub collection: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished (absent if interrupted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// JSON stats written on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}
