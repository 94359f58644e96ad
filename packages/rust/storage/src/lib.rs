//! libSQL vector store for tweet embeddings (offline, embedded mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding named
//! collections of tweets, each with an f32 embedding written through
//! libSQL's native `vector32()` and searched by `vector_distance_cos()`.
//!
//! **Access rules:**
//! - Ingest: read-write via [`Storage::open`]
//! - Ask/search/TUI: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info, instrument};

use tweetrag_shared::{CollectionInfo, IngestRun, Result, RunId, SearchHit, Tweet, TweetRagError};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TweetRagError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TweetRagError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database not found"),
            ));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        TweetRagError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TweetRagError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Collection operations
    // -----------------------------------------------------------------------

    /// Load a collection, creating it if it does not exist.
    ///
    /// A collection is bound to the embedding model that filled it; asking
    /// for an existing collection with a different model is rejected.
    #[instrument(skip_all, fields(collection = %name, model = %embedding_model))]
    pub async fn get_or_create_collection(
        &self,
        name: &str,
        embedding_model: &str,
    ) -> Result<CollectionInfo> {
        if let Some(existing) = self.get_collection(name).await? {
            if existing.embedding_model != embedding_model {
                return Err(TweetRagError::model_mismatch(
                    name,
                    &existing.embedding_model,
                    embedding_model,
                ));
            }
            info!(documents = existing.document_count, "loaded existing collection");
            return Ok(existing);
        }

        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO collections (name, embedding_model, dimension, created_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?4)",
                params![name, embedding_model, now.as_str(), now.as_str()],
            )
            .await
            .map_err(db_err)?;

        info!("created new collection");
        self.get_collection(name).await?.ok_or_else(|| {
            TweetRagError::Storage(format!("collection '{name}' missing after insert"))
        })
    }

    /// Get a collection by name, with its current document count.
    pub async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.name, c.embedding_model, c.dimension, c.created_at, c.updated_at,
                        (SELECT COUNT(*) FROM tweets t WHERE t.collection = c.name)
                 FROM collections c WHERE c.name = ?1",
                params![name],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_collection(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List all collections by name.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.name, c.embedding_model, c.dimension, c.created_at, c.updated_at,
                        (SELECT COUNT(*) FROM tweets t WHERE t.collection = c.name)
                 FROM collections c ORDER BY c.name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_collection(&row)?);
        }
        Ok(results)
    }

    /// Delete a collection with its tweets and ingest runs.
    ///
    /// Returns `false` when the collection did not exist.
    #[instrument(skip_all, fields(collection = %name))]
    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        self.check_writable()?;

        let tx = self.conn.transaction().await.map_err(db_err)?;
        tx.execute("DELETE FROM tweets WHERE collection = ?1", params![name])
            .await
            .map_err(db_err)?;
        tx.execute("DELETE FROM ingest_runs WHERE collection = ?1", params![name])
            .await
            .map_err(db_err)?;
        let removed = tx
            .execute("DELETE FROM collections WHERE name = ?1", params![name])
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        info!(existed = removed > 0, "collection deleted");
        Ok(removed > 0)
    }

    // -----------------------------------------------------------------------
    // Tweet operations
    // -----------------------------------------------------------------------

    /// IDs of every tweet stored in `collection`.
    pub async fn tweet_ids(&self, collection: &str) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tweet_id FROM tweets WHERE collection = ?1",
                params![collection],
            )
            .await
            .map_err(db_err)?;

        let mut ids = HashSet::new();
        while let Ok(Some(row)) = rows.next().await {
            ids.insert(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(ids)
    }

    /// Store a tweet and its embedding.
    ///
    /// The first insert fixes the collection's vector dimension. Returns
    /// `false` if a tweet with the same ID was already stored.
    pub async fn insert_tweet(
        &self,
        collection: &str,
        tweet: &Tweet,
        embedding: &[f32],
    ) -> Result<bool> {
        self.check_writable()?;
        if embedding.is_empty() {
            return Err(TweetRagError::validation("embedding vector is empty"));
        }

        let dimension = self.collection_dimension(collection).await?.ok_or_else(|| {
            TweetRagError::validation(format!("unknown collection '{collection}'"))
        })?;
        if let Some(dim) = dimension {
            if dim != embedding.len() {
                return Err(TweetRagError::validation(format!(
                    "embedding dimension {} does not match collection '{collection}' dimension {dim}",
                    embedding.len()
                )));
            }
        }

        let vector = vector_literal(embedding)?;
        let now = Utc::now().to_rfc3339();
        let posted_at = tweet.posted_at.map(|dt| dt.to_rfc3339());

        // Dimension, row and timestamp commit together
        let tx = self.conn.transaction().await.map_err(db_err)?;
        if dimension.is_none() {
            tx.execute(
                "UPDATE collections SET dimension = ?1 WHERE name = ?2 AND dimension IS NULL",
                params![embedding.len() as i64, collection],
            )
            .await
            .map_err(db_err)?;
        }

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO tweets
                 (collection, tweet_id, content, embedding, length, timestamp, posted_at,
                  url, author, source_file, format, created_at)
                 VALUES (?1, ?2, ?3, vector32(?4), ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    collection,
                    tweet.tweet_id.as_str(),
                    tweet.content.as_str(),
                    vector.as_str(),
                    tweet.length() as i64,
                    tweet.timestamp.as_deref(),
                    posted_at.as_deref(),
                    tweet.url.as_deref(),
                    tweet.author.as_deref(),
                    tweet.source_file.as_str(),
                    tweet.format.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;

        if inserted > 0 {
            tx.execute(
                "UPDATE collections SET updated_at = ?1 WHERE name = ?2",
                params![now.as_str(), collection],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        if dimension.is_none() && inserted > 0 {
            debug!(dimension = embedding.len(), "collection dimension fixed");
        }
        Ok(inserted > 0)
    }

    /// Vector dimension of `collection`: `None` if the collection does not
    /// exist, `Some(None)` before its first insert.
    async fn collection_dimension(&self, collection: &str) -> Result<Option<Option<usize>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT dimension FROM collections WHERE name = ?1",
                params![collection],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            // NULL until the first insert
            Ok(Some(row)) => Ok(Some(row.get::<i64>(0).ok().map(|d| d as usize))),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Number of tweets stored in `collection`.
    pub async fn count(&self, collection: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM tweets WHERE collection = ?1",
                params![collection],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(db_err)? as usize),
            Ok(None) => Ok(0),
            Err(e) => Err(db_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Similarity search
    // -----------------------------------------------------------------------

    /// The `limit` stored tweets closest to `query` by cosine distance.
    #[instrument(skip_all, fields(collection = %collection, limit = limit))]
    pub async fn query_similar(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let Some(Some(dimension)) = self.collection_dimension(collection).await? else {
            return Ok(Vec::new());
        };
        if dimension != query.len() {
            return Err(TweetRagError::validation(format!(
                "query dimension {} does not match collection '{collection}' dimension {dimension}",
                query.len()
            )));
        }

        let vector = vector_literal(query)?;
        let mut rows = self
            .conn
            .query(
                "SELECT tweet_id, content, timestamp, posted_at, url, author, source_file, format,
                        vector_distance_cos(embedding, vector32(?1)) AS distance
                 FROM tweets
                 WHERE collection = ?2
                 ORDER BY distance ASC, tweet_id ASC
                 LIMIT ?3",
                params![vector.as_str(), collection, limit as i64],
            )
            .await
            .map_err(db_err)?;

        let mut hits = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let distance: f64 = row.get(8).map_err(db_err)?;
            hits.push(SearchHit {
                tweet: row_to_tweet(&row)?,
                distance,
            });
        }
        debug!(hits = hits.len(), "similarity query complete");
        Ok(hits)
    }

    // -----------------------------------------------------------------------
    // Ingest run operations
    // -----------------------------------------------------------------------

    /// Record the start of an ingest run.
    pub async fn insert_ingest_run(&self, collection: &str) -> Result<RunId> {
        self.check_writable()?;
        let id = RunId::new();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_runs (id, collection, started_at) VALUES (?1, ?2, ?3)",
                params![id.to_string(), collection, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Mark an ingest run finished with its stats.
    pub async fn finish_ingest_run(&self, id: &RunId, stats: &serde_json::Value) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let stats_json = stats.to_string();
        self.conn
            .execute(
                "UPDATE ingest_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json.as_str(), id.to_string()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent ingest runs for `collection`, newest first.
    pub async fn list_ingest_runs(&self, collection: &str, limit: usize) -> Result<Vec<IngestRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, collection, started_at, finished_at, stats_json
                 FROM ingest_runs WHERE collection = ?1
                 ORDER BY id DESC LIMIT ?2",
                params![collection, limit as i64],
            )
            .await
            .map_err(db_err)?;

        let mut runs = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            runs.push(row_to_ingest_run(&row)?);
        }
        Ok(runs)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn db_err(e: libsql::Error) -> TweetRagError {
    TweetRagError::Storage(e.to_string())
}

/// JSON array text accepted by `vector32()`.
fn vector_literal(values: &[f32]) -> Result<String> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(TweetRagError::validation("embedding contains non-finite values"));
    }
    serde_json::to_string(values)
        .map_err(|e| TweetRagError::Storage(format!("failed to encode vector: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TweetRagError::Storage(format!("invalid date: {e}")))
}

/// Columns: name, embedding_model, dimension, created_at, updated_at, count.
fn row_to_collection(row: &libsql::Row) -> Result<CollectionInfo> {
    let created_at: String = row.get(3).map_err(db_err)?;
    let updated_at: String = row.get(4).map_err(db_err)?;
    Ok(CollectionInfo {
        name: row.get::<String>(0).map_err(db_err)?,
        embedding_model: row.get::<String>(1).map_err(db_err)?,
        dimension: row.get::<i64>(2).ok().map(|d| d as usize),
        document_count: row.get::<i64>(5).map_err(db_err)? as usize,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

/// Columns: tweet_id, content, timestamp, posted_at, url, author, source_file, format.
fn row_to_tweet(row: &libsql::Row) -> Result<Tweet> {
    let posted_at = match row.get::<String>(3).ok() {
        Some(s) => Some(parse_datetime(&s)?),
        None => None,
    };
    Ok(Tweet {
        tweet_id: row.get::<String>(0).map_err(db_err)?,
        content: row.get::<String>(1).map_err(db_err)?,
        timestamp: row.get::<String>(2).ok(),
        posted_at,
        url: row.get::<String>(4).ok(),
        author: row.get::<String>(5).ok(),
        source_file: row.get::<String>(6).map_err(db_err)?,
        format: row.get::<String>(7).map_err(db_err)?,
    })
}

/// Columns: id, collection, started_at, finished_at, stats_json.
fn row_to_ingest_run(row: &libsql::Row) -> Result<IngestRun> {
    let id: String = row.get(0).map_err(db_err)?;
    let started_at: String = row.get(2).map_err(db_err)?;
    let finished_at = match row.get::<String>(3).ok() {
        Some(s) => Some(parse_datetime(&s)?),
        None => None,
    };
    let stats = match row.get::<String>(4).ok() {
        Some(s) => Some(
            serde_json::from_str(&s)
                .map_err(|e| TweetRagError::Storage(format!("invalid stats json: {e}")))?,
        ),
        None => None,
    };

    Ok(IngestRun {
        id: id
            .parse()
            .map_err(|e| TweetRagError::Storage(format!("invalid run id '{id}': {e}")))?,
        collection: row.get::<String>(1).map_err(db_err)?,
        started_at: parse_datetime(&started_at)?,
        finished_at,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweetrag_shared::MARKDOWN_FORMAT;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("tweetrag_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn tweet(id: &str, content: &str) -> Tweet {
        Tweet {
            tweet_id: id.into(),
            content: content.into(),
            timestamp: Some("Tue Aug 05 14:19:12 +0000 2008".into()),
            posted_at: DateTime::parse_from_rfc3339("2008-08-05T14:19:12Z")
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            url: Some(format!("https://twitter.com/dammitandy/status/{id}")),
            author: Some("dammitandy".into()),
            source_file: "data/tweets.md".into(),
            format: MARKDOWN_FORMAT.into(),
        }
    }

    #[tokio::test]
    async fn open_creates_schema() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("tweetrag_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn collection_create_then_load() {
        let storage = test_storage().await;

        let created = storage
            .get_or_create_collection("tweets", "mxbai-embed-large")
            .await
            .expect("create");
        assert_eq!(created.name, "tweets");
        assert_eq!(created.document_count, 0);
        assert!(created.dimension.is_none());

        let loaded = storage
            .get_or_create_collection("tweets", "mxbai-embed-large")
            .await
            .expect("load");
        assert_eq!(loaded.created_at, created.created_at);

        assert_eq!(storage.list_collections().await.unwrap().len(), 1);
        assert!(storage.get_collection("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn collection_rejects_different_model() {
        let storage = test_storage().await;
        storage
            .get_or_create_collection("tweets", "mxbai-embed-large")
            .await
            .unwrap();
        let err = storage
            .get_or_create_collection("tweets", "nomic-embed-text")
            .await
            .unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));
    }

    #[tokio::test]
    async fn insert_fixes_dimension_and_is_idempotent() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();

        let first = storage
            .insert_tweet("tweets", &tweet("1", "hello"), &[1.0, 0.0, 0.0])
            .await
            .expect("insert");
        assert!(first);

        let again = storage
            .insert_tweet("tweets", &tweet("1", "hello"), &[1.0, 0.0, 0.0])
            .await
            .expect("re-insert");
        assert!(!again);

        let info = storage.get_collection("tweets").await.unwrap().unwrap();
        assert_eq!(info.dimension, Some(3));
        assert_eq!(info.document_count, 1);
        assert_eq!(storage.count("tweets").await.unwrap(), 1);

        let ids = storage.tweet_ids("tweets").await.unwrap();
        assert!(ids.contains("1"));
    }

    #[tokio::test]
    async fn insert_rejects_dimension_mismatch() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();
        storage
            .insert_tweet("tweets", &tweet("1", "a"), &[1.0, 0.0, 0.0])
            .await
            .unwrap();

        let err = storage
            .insert_tweet("tweets", &tweet("2", "b"), &[1.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));
        assert_eq!(storage.count("tweets").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_first_insert_leaves_dimension_unset() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();

        let err = storage
            .insert_tweet("tweets", &tweet("1", "a"), &[f32::NAN, 0.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));

        let info = storage.get_collection("tweets").await.unwrap().unwrap();
        assert_eq!(info.dimension, None);
        assert_eq!(info.document_count, 0);

        // A different size is still accepted as the first real vector
        assert!(storage
            .insert_tweet("tweets", &tweet("1", "a"), &[1.0, 0.0])
            .await
            .unwrap());
        let info = storage.get_collection("tweets").await.unwrap().unwrap();
        assert_eq!(info.dimension, Some(2));
    }

    #[tokio::test]
    async fn collection_dimension_tracks_first_insert() {
        let storage = test_storage().await;
        assert_eq!(storage.collection_dimension("tweets").await.unwrap(), None);

        storage.get_or_create_collection("tweets", "m").await.unwrap();
        assert_eq!(storage.collection_dimension("tweets").await.unwrap(), Some(None));

        for i in 0..3 {
            storage
                .insert_tweet("tweets", &tweet(&i.to_string(), "t"), &[1.0, 0.0, 0.5, 0.25])
                .await
                .unwrap();
        }
        assert_eq!(storage.collection_dimension("tweets").await.unwrap(), Some(Some(4)));
        assert_eq!(storage.count("tweets").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn insert_into_unknown_collection_fails() {
        let storage = test_storage().await;
        let result = storage.insert_tweet("nope", &tweet("1", "a"), &[1.0]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn query_similar_orders_by_cosine_distance() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();
        storage
            .insert_tweet("tweets", &tweet("east", "pointing east"), &[1.0, 0.0])
            .await
            .unwrap();
        storage
            .insert_tweet("tweets", &tweet("north", "pointing north"), &[0.0, 1.0])
            .await
            .unwrap();
        storage
            .insert_tweet("tweets", &tweet("northeast", "pointing northeast"), &[0.7, 0.7])
            .await
            .unwrap();

        let hits = storage
            .query_similar("tweets", &[0.9, 0.1], 2)
            .await
            .expect("query");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].tweet.tweet_id, "east");
        assert_eq!(hits[1].tweet.tweet_id, "northeast");
        assert!(hits[0].distance <= hits[1].distance);

        // Metadata survives the round trip
        let hit = &hits[0].tweet;
        assert_eq!(hit.content, "pointing east");
        assert_eq!(hit.author.as_deref(), Some("dammitandy"));
        assert!(hit.posted_at.is_some());
    }

    #[tokio::test]
    async fn query_similar_empty_collection() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();
        let hits = storage.query_similar("tweets", &[1.0, 0.0], 3).await.unwrap();
        assert!(hits.is_empty());

        let hits = storage.query_similar("missing", &[1.0], 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn query_similar_rejects_wrong_dimension() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();
        storage
            .insert_tweet("tweets", &tweet("1", "a"), &[1.0, 0.0])
            .await
            .unwrap();
        assert!(storage.query_similar("tweets", &[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn ingest_run_lifecycle() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();

        let run_id = storage.insert_ingest_run("tweets").await.expect("insert run");
        let runs = storage.list_ingest_runs("tweets", 5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].finished_at.is_none());

        storage
            .finish_ingest_run(&run_id, &serde_json::json!({ "embedded": 10 }))
            .await
            .expect("finish run");

        let runs = storage.list_ingest_runs("tweets", 5).await.unwrap();
        assert_eq!(runs[0].id, run_id);
        assert!(runs[0].finished_at.is_some());
        assert_eq!(runs[0].stats.as_ref().unwrap()["embedded"], 10);
    }

    #[tokio::test]
    async fn delete_collection_cascades() {
        let storage = test_storage().await;
        storage.get_or_create_collection("tweets", "m").await.unwrap();
        storage
            .insert_tweet("tweets", &tweet("1", "a"), &[1.0, 0.0])
            .await
            .unwrap();
        storage.insert_ingest_run("tweets").await.unwrap();

        assert!(storage.delete_collection("tweets").await.unwrap());
        assert!(storage.get_collection("tweets").await.unwrap().is_none());
        assert_eq!(storage.count("tweets").await.unwrap(), 0);
        assert!(storage.list_ingest_runs("tweets", 5).await.unwrap().is_empty());

        assert!(!storage.delete_collection("tweets").await.unwrap());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("tweetrag_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.get_or_create_collection("tweets", "m").await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get_collection("tweets").await.unwrap().is_some());

        let result = ro.insert_ingest_run("tweets").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_missing_file_is_io_error() {
        let tmp = std::env::temp_dir().join(format!("tweetrag_missing_{}.db", Uuid::now_v7()));
        let err = Storage::open_readonly(&tmp).await.err().expect("should fail");
        assert!(matches!(err, TweetRagError::Io { .. }));
    }
}
