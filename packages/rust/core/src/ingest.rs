//! Ingest flow: archive → plan against stored IDs → embed → vector store.
//!
//! Re-running an ingest only embeds tweets whose IDs are not yet stored,
//! so an interrupted or repeated run never duplicates documents.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use tweetrag_shared::{CollectionInfo, Result, RunId, Tweet, TweetRagError};
use tweetrag_storage::Storage;

use crate::models::Embedder;

/// Progress is logged at `info` every this many embedded tweets.
const LOG_EVERY: usize = 5;

/// Number of sample tweets returned by [`ingest`].
const SAMPLE_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Config & result types
// ---------------------------------------------------------------------------

/// Where to read tweets from.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestSource {
    /// A single markdown archive.
    File(PathBuf),
    /// Every file in `dir` matching `pattern`.
    Directory { dir: PathBuf, pattern: String },
}

/// Configuration for the [`ingest`] flow.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Archive source.
    pub source: IngestSource,
    /// Target collection.
    pub collection: String,
}

/// Tweets split by whether they still need embedding.
#[derive(Debug, Default)]
pub struct IngestPlan {
    /// New tweets, in input order.
    pub to_embed: Vec<Tweet>,
    /// Tweets whose ID is already in the collection.
    pub already_stored: usize,
    /// Repeated IDs within the batch (first occurrence wins).
    pub duplicates: usize,
}

/// Outcome of [`embed_tweets`].
#[derive(Debug, Clone)]
pub struct IngestResult {
    /// Ingest run record.
    pub run_id: RunId,
    /// Collection state after the run.
    pub collection: CollectionInfo,
    /// Tweets handed to the run.
    pub loaded: usize,
    /// Tweets embedded and stored.
    pub embedded: usize,
    /// Tweets already present.
    pub skipped: usize,
    /// Repeated IDs dropped from the batch.
    pub duplicates: usize,
    /// Tweets that failed to embed or store: `(tweet_id, error)`.
    pub failures: Vec<(String, String)>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl IngestResult {
    /// Number of failed tweets.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Outcome of [`ingest`]: the run result plus a preview of loaded tweets.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub result: IngestResult,
    /// Up to three of the loaded tweets.
    pub samples: Vec<Tweet>,
}

/// JSON stats written to the ingest run record.
#[derive(Debug, Serialize)]
struct RunStats {
    loaded: usize,
    embedded: usize,
    skipped: usize,
    duplicates: usize,
    failed: usize,
    elapsed_ms: u128,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting ingest status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each tweet is embedded and stored.
    fn tweet_embedded(&self, tweet_id: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, result: &IngestResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn tweet_embedded(&self, _tweet_id: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &IngestResult) {}
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Load tweets from the configured source.
pub fn load_tweets(source: &IngestSource) -> Result<Vec<Tweet>> {
    match source {
        IngestSource::File(path) => tweetrag_archive::load_tweets_from_file(path),
        IngestSource::Directory { dir, pattern } => {
            tweetrag_archive::load_tweets_from_directory(dir, pattern)
        }
    }
}

/// Check the source exists and has the right shape, without reading it.
pub fn check_source(source: &IngestSource) -> Result<()> {
    match source {
        IngestSource::File(path) => tweetrag_archive::check_markdown_file(path),
        IngestSource::Directory { dir, .. } => tweetrag_archive::check_directory(dir),
    }
}

/// Split `tweets` into those that still need embedding and those that don't.
pub fn plan_ingest(existing_ids: &HashSet<String>, tweets: Vec<Tweet>) -> IngestPlan {
    let mut seen: HashSet<String> = HashSet::new();
    let mut plan = IngestPlan::default();

    for tweet in tweets {
        if existing_ids.contains(&tweet.tweet_id) {
            plan.already_stored += 1;
        } else if !seen.insert(tweet.tweet_id.clone()) {
            plan.duplicates += 1;
        } else {
            plan.to_embed.push(tweet);
        }
    }

    plan
}

/// Embed and store every tweet not already in `collection`.
///
/// A tweet that fails is logged and recorded in the result; the run carries
/// on with the rest.
#[instrument(skip_all, fields(collection = %collection, tweets = tweets.len()))]
pub async fn embed_tweets<E: Embedder>(
    embedder: &E,
    storage: &Storage,
    collection: &str,
    tweets: Vec<Tweet>,
    progress: &dyn ProgressReporter,
) -> Result<IngestResult> {
    let start = Instant::now();
    let loaded = tweets.len();

    progress.phase("Opening collection");
    storage
        .get_or_create_collection(collection, embedder.model_name())
        .await?;
    let run_id = storage.insert_ingest_run(collection).await?;

    progress.phase("Checking stored tweets");
    let existing = storage.tweet_ids(collection).await?;
    let plan = plan_ingest(&existing, tweets);
    let total = plan.to_embed.len();

    info!(
        new = total,
        already_stored = plan.already_stored,
        duplicates = plan.duplicates,
        "ingest planned"
    );

    progress.phase("Embedding tweets");
    let mut embedded = 0usize;
    let mut skipped = plan.already_stored;
    let mut failures: Vec<(String, String)> = Vec::new();

    for (i, tweet) in plan.to_embed.iter().enumerate() {
        let current = i + 1;
        match embed_one(embedder, storage, collection, tweet).await {
            Ok(true) => embedded += 1,
            Ok(false) => {
                debug!(tweet_id = %tweet.tweet_id, "tweet stored concurrently, skipped");
                skipped += 1;
            }
            Err(e) => {
                warn!(tweet_id = %tweet.tweet_id, error = %e, "failed to embed tweet");
                failures.push((tweet.tweet_id.clone(), e.to_string()));
            }
        }

        progress.tweet_embedded(&tweet.tweet_id, current, total);
        if current % LOG_EVERY == 0 {
            info!(current, total, "embedding progress");
        }
    }

    let elapsed = start.elapsed();
    let stats = RunStats {
        loaded,
        embedded,
        skipped,
        duplicates: plan.duplicates,
        failed: failures.len(),
        elapsed_ms: elapsed.as_millis(),
    };
    let stats_json = serde_json::to_value(&stats)
        .map_err(|e| TweetRagError::Storage(format!("failed to encode run stats: {e}")))?;
    storage.finish_ingest_run(&run_id, &stats_json).await?;

    let collection_info = storage.get_collection(collection).await?.ok_or_else(|| {
        TweetRagError::Storage(format!("collection '{collection}' disappeared during ingest"))
    })?;

    let result = IngestResult {
        run_id,
        collection: collection_info,
        loaded,
        embedded,
        skipped,
        duplicates: plan.duplicates,
        failures,
        elapsed,
    };

    info!(
        embedded = result.embedded,
        skipped = result.skipped,
        failed = result.failed(),
        documents = result.collection.document_count,
        elapsed_ms = elapsed.as_millis() as u64,
        "ingest complete"
    );
    progress.done(&result);
    Ok(result)
}

/// Run the full ingest: load the archive, then embed what is new.
#[instrument(skip_all, fields(collection = %config.collection))]
pub async fn ingest<E: Embedder>(
    config: &IngestConfig,
    embedder: &E,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    progress.phase("Loading archive");
    let tweets = load_tweets(&config.source)?;
    let samples: Vec<Tweet> = tweets.iter().take(SAMPLE_COUNT).cloned().collect();

    let result = embed_tweets(embedder, storage, &config.collection, tweets, progress).await?;
    Ok(IngestReport { result, samples })
}

async fn embed_one<E: Embedder>(
    embedder: &E,
    storage: &Storage,
    collection: &str,
    tweet: &Tweet,
) -> Result<bool> {
    let vector = embedder.embed(&tweet.content).await?;
    storage.insert_tweet(collection, tweet, &vector).await
}
