//! Embedding and generation model seams.
//!
//! The ingest and RAG flows are generic over [`Embedder`] and [`Generator`]
//! so they can run against Ollama in production and deterministic doubles
//! in tests.

use std::future::Future;

use tracing::instrument;

use tweetrag_ollama::{OllamaClient, OllamaOptions};
use tweetrag_shared::{ModelConfig, Result};

/// Turns text into a fixed-length vector.
pub trait Embedder: Send + Sync {
    /// Model name recorded on the collection.
    fn model_name(&self) -> &str;

    /// Embed one text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// Produces an answer from a fully rendered prompt.
pub trait Generator: Send + Sync {
    /// Model name, for display.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// Ollama-backed models
// ---------------------------------------------------------------------------

/// [`Embedder`] backed by an Ollama embedding model.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text).await
    }
}

/// [`Generator`] backed by an Ollama generation model.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
}

impl OllamaGenerator {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let generation = self.client.generate(&self.model, prompt).await?;
        Ok(generation.text.trim().to_string())
    }
}

/// The client plus both models described by `config`, sharing one connection pool.
pub fn ollama_models(
    config: &ModelConfig,
) -> Result<(OllamaClient, OllamaEmbedder, OllamaGenerator)> {
    let client = OllamaClient::new(&OllamaOptions::from(config))?;
    let embedder = OllamaEmbedder::new(client.clone(), &config.embedding_model);
    let generator = OllamaGenerator::new(client.clone(), &config.generation_model);
    Ok((client, embedder, generator))
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------
