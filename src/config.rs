use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use product_search_core::search::{SearchParams, TieBreak};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Deadline covering the embedding call and every store call of one search.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:9876".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_semantic_pool")]
    pub semantic_pool: usize,
    /// `"retrieval"` keeps store order on equal scores; `"id"` sorts ties by ID.
    #[serde(default = "default_tie_break")]
    pub tie_break: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
            semantic_pool: default_semantic_pool(),
            tie_break: default_tie_break(),
        }
    }
}

fn default_final_limit() -> usize {
    10
}
fn default_semantic_pool() -> usize {
    50
}
fn default_tie_break() -> String {
    "retrieval".to_string()
}

impl RetrievalConfig {
    pub fn search_params(&self) -> Result<SearchParams> {
        let tie_break = match self.tie_break.as_str() {
            "retrieval" => TieBreak::RetrievalOrder,
            "id" => TieBreak::DocumentId,
            other => anyhow::bail!(
                "Unknown retrieval.tie_break: '{}'. Must be retrieval or id.",
                other
            ),
        };
        Ok(SearchParams {
            final_limit: self.final_limit,
            semantic_pool: self.semantic_pool,
            tie_break,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama or OpenAI-compatible provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries for batch encoding during ingestion; query-time encoding never retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `"qdrant"` or `"memory"`.
    #[serde(default = "default_store_provider")]
    pub provider: String,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Records file loaded into the `memory` store at startup.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            url: default_store_url(),
            collection: default_collection(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            seed_path: None,
        }
    }
}

fn default_store_provider() -> String {
    "qdrant".to_string()
}
fn default_store_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_collection() -> String {
    "products".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Points per upsert request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if config.retrieval.semantic_pool < config.retrieval.final_limit {
        anyhow::bail!("retrieval.semantic_pool must be >= retrieval.final_limit");
    }
    config.retrieval.search_params()?;

    // Validate server
    if config.server.request_timeout_ms == 0 {
        anyhow::bail!("server.request_timeout_ms must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" | "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, ollama, or openai.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if matches!(config.embedding.provider.as_str(), "ollama" | "openai") {
        if config.embedding.dims.is_none() {
            anyhow::bail!(
                "embedding.dims must be set when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate store
    match config.store.provider.as_str() {
        "qdrant" | "memory" => {}
        other => anyhow::bail!(
            "Unknown store provider: '{}'. Must be qdrant or memory.",
            other
        ),
    }
    if config.store.collection.trim().is_empty() {
        anyhow::bail!("store.collection must not be empty");
    }
    if config.store.seed_path.is_some() && config.store.provider != "memory" {
        anyhow::bail!("store.seed_path is only used with the memory store");
    }

    if config.ingest.chunk_size == 0 {
        anyhow::bail!("ingest.chunk_size must be > 0");
    }

    Ok(())
}
