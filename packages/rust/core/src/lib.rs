//! Core orchestration for TweetRAG.
//!
//! Ties the archive parser, the Ollama models and the vector store together
//! into the two end-to-end flows: [`ingest`] (archive → embeddings) and
//! [`rag`] (question → retrieved tweets → generated answer), plus the
//! [`setup`] readiness checks.

pub mod ingest;
pub mod models;
pub mod rag;
pub mod setup;

pub use ingest::{
    IngestConfig, IngestPlan, IngestReport, IngestResult, IngestSource, ProgressReporter,
    SilentProgress,
};
pub use models::{Embedder, Generator, OllamaEmbedder, OllamaGenerator, ollama_models};
pub use rag::{PromptTemplate, RagAnswer, RagRequest, SearchResults};
pub use setup::{ModelRole, ModelStatus, SetupReport};
