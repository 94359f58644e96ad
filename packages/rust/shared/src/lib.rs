//! Shared types, error model, and configuration for TweetRAG.
//!
//! This crate is the foundation depended on by all other TweetRAG crates.
//! It provides:
//! - [`TweetRagError`], the unified error type
//! - Domain types ([`Tweet`], [`SearchHit`], [`CollectionInfo`], [`RunId`])
//! - Configuration ([`AppConfig`], [`ModelConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONTEXT_PLACEHOLDER, DefaultsConfig, ModelConfig, OllamaConfig, PromptConfig,
    QUESTION_PLACEHOLDER, apply_env_overrides, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, parse_base_url, validate_config,
    validate_template,
};
pub use error::{Result, TweetRagError};
pub use types::{CollectionInfo, IngestRun, MARKDOWN_FORMAT, RunId, SearchHit, Tweet, preview};
