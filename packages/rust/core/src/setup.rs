//! Model runtime readiness checks.
//!
//! Confirms the Ollama server is reachable and that the configured embedding
//! and generation models are installed, pulling the missing ones on request.

use tracing::{info, instrument, warn};

use tweetrag_ollama::OllamaClient;
use tweetrag_shared::{ModelConfig, Result};

/// What a model is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Embedding,
    Generation,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Generation => "generation",
        }
    }
}

/// Installation status of one required model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStatus {
    pub role: ModelRole,
    pub name: String,
    pub installed: bool,
}

/// Result of [`check_setup`].
#[derive(Debug, Clone)]
pub struct SetupReport {
    /// Ollama server version.
    pub server_version: String,
    /// Every locally installed model name.
    pub installed_models: Vec<String>,
    /// Required models, embedding first.
    pub required: Vec<ModelStatus>,
}

impl SetupReport {
    /// Required models that are not installed.
    pub fn missing(&self) -> impl Iterator<Item = &ModelStatus> {
        self.required.iter().filter(|m| !m.installed)
    }

    /// Whether every required model is installed.
    pub fn is_ready(&self) -> bool {
        self.missing().next().is_none()
    }
}

/// Probe the server and check the configured models are installed.
#[instrument(skip_all, fields(url = %client.base_url()))]
pub async fn check_setup(client: &OllamaClient, models: &ModelConfig) -> Result<SetupReport> {
    let server_version = client.version().await?;
    let installed = client.list_models().await?;

    let required = [
        (ModelRole::Embedding, &models.embedding_model),
        (ModelRole::Generation, &models.generation_model),
    ]
    .into_iter()
    .map(|(role, name)| ModelStatus {
        role,
        name: name.clone(),
        installed: installed.iter().any(|m| m.matches(name)),
    })
    .collect::<Vec<_>>();

    let report = SetupReport {
        server_version,
        installed_models: installed.into_iter().map(|m| m.name).collect(),
        required,
    };

    for model in report.missing() {
        warn!(model = %model.name, role = model.role.as_str(), "required model not installed");
    }
    info!(
        version = %report.server_version,
        ready = report.is_ready(),
        "setup check complete"
    );
    Ok(report)
}

/// Pull every model the report lists as missing. Returns the names pulled.
#[instrument(skip_all)]
pub async fn pull_missing(client: &OllamaClient, report: &SetupReport) -> Result<Vec<String>> {
    let mut pulled = Vec::new();
    for model in report.missing() {
        // Both roles may name the same model
        if pulled.contains(&model.name) {
            continue;
        }
        client.pull_model(&model.name).await?;
        pulled.push(model.name.clone());
    }
    Ok(pulled)
}
