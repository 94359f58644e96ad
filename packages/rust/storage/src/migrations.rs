//! SQL migration definitions for the TweetRAG vector store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: collections, tweets (vector32 embeddings), ingest_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Named vector collections; dimension is NULL until the first insert
CREATE TABLE IF NOT EXISTS collections (
    name            TEXT PRIMARY KEY,
    embedding_model TEXT NOT NULL,
    dimension       INTEGER,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Tweets with their embedding stored as a libSQL f32 vector blob
CREATE TABLE IF NOT EXISTS tweets (
    collection  TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    tweet_id    TEXT NOT NULL,
    content     TEXT NOT NULL,
    embedding   BLOB NOT NULL,
    length      INTEGER NOT NULL,
    timestamp   TEXT,
    posted_at   TEXT,
    url         TEXT,
    author      TEXT,
    source_file TEXT NOT NULL,
    format      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (collection, tweet_id)
);

CREATE INDEX IF NOT EXISTS idx_tweets_collection ON tweets(collection);

-- Ingest run history
CREATE TABLE IF NOT EXISTS ingest_runs (
    id          TEXT PRIMARY KEY,
    collection  TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_ingest_runs_collection ON ingest_runs(collection);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
