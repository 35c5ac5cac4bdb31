//! Collaborator assembly and the `psearch search` command.
//!
//! [`build_searcher`] turns a [`Config`] into a ready [`TieredSearcher`];
//! both the HTTP server and the CLI go through it so they rank identically.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use product_search_core::embedding::EmbeddingProvider;
use product_search_core::search::{SearchOutcome, TieredSearcher};
use product_search_core::store::memory::InMemoryStore;
use product_search_core::store::CandidateStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::ingest::{read_records, seed_memory_store};
use crate::qdrant::QdrantStore;

/// Build the candidate store named by `[store].provider`.
///
/// The `memory` store starts empty unless `[store].seed_path` points at a
/// records file (CSV, JSON or JSON Lines by extension), which is embedded
/// with `embedder` on startup.
pub async fn create_store(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
) -> Result<Arc<dyn CandidateStore>> {
    match config.store.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantStore::new(&config.store)?)),
        "memory" => {
            let store = InMemoryStore::with_dims(embedder.dims());
            match &config.store.seed_path {
                Some(path) => {
                    let (docs, skipped) = read_records(path, None).with_context(|| {
                        format!("Failed to load seed records: {}", path.display())
                    })?;
                    let inserted = seed_memory_store(
                        &store,
                        embedder,
                        &docs,
                        config.embedding.batch_size,
                    )
                    .await?;
                    tracing::info!(inserted, skipped, "seeded in-memory store");
                }
                None => tracing::warn!("in-memory store has no seed_path; searches return nothing"),
            }
            Ok(Arc::new(store))
        }
        other => bail!("Unknown store provider: {}", other),
    }
}

/// Assemble a [`TieredSearcher`] from config.
pub async fn build_searcher(config: &Config) -> Result<TieredSearcher> {
    if !config.embedding.is_enabled() {
        bail!("Search needs an embedding provider; [embedding].provider is 'disabled'");
    }
    let params = config.retrieval.search_params()?;
    let embedder = create_provider(&config.embedding)?;
    let store = create_store(config, embedder.as_ref()).await?;

    tracing::debug!(
        model = embedder.model_name(),
        dims = embedder.dims(),
        store = %config.store.provider,
        "search collaborators ready"
    );

    Ok(TieredSearcher::new(embedder, store, params))
}

/// Entry point for `psearch search`.
///
/// Runs one tiered search under the server's request deadline and prints
/// either a numbered listing or the same JSON body `GET /search` returns.
pub async fn run_search(config: &Config, query: &str, json: bool) -> Result<()> {
    let searcher = build_searcher(config).await?;
    let deadline = Duration::from_millis(config.server.request_timeout_ms);

    let outcome = tokio::time::timeout(deadline, searcher.search(query))
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "search did not finish within {} ms",
                config.server.request_timeout_ms
            )
        })??;

    if json {
        let body = serde_json::json!({
            "status": true,
            "results": outcome.into_results(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_outcome(outcome);
    }
    Ok(())
}

fn print_outcome(outcome: SearchOutcome) {
    let stats = outcome.stats.clone();
    let results = outcome.into_results();
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, item) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, item.score, item.name);
        println!("    id: {}", item.id);
        if let Some(desc) = item.description.as_deref().filter(|d| !d.trim().is_empty()) {
            println!("    description: \"{}\"", desc.replace('\n', " ").trim());
        }
    }
    println!();
    println!(
        "exact: {}  prefix: {}  substring: {}  semantic: {}",
        stats.exact, stats.prefix, stats.substr, stats.rest
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use product_search_core::error::SearchError;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.store.provider = "memory".to_string();
        // Constructing the Ollama provider makes no network call.
        config.embedding.provider = "ollama".to_string();
        config.embedding.model = Some("nomic-embed-text".to_string());
        config.embedding.dims = Some(4);
        config
    }

    #[tokio::test]
    async fn test_blank_query_is_an_error_in_both_output_modes() {
        let config = memory_config();
        for json in [false, true] {
            let err = run_search(&config, "   ", json).await.unwrap_err();
            assert!(
                matches!(err.downcast_ref::<SearchError>(), Some(SearchError::EmptyQuery)),
                "json={json}: {err:#}"
            );
        }
    }

    #[tokio::test]
    async fn test_disabled_embeddings_rejected_up_front() {
        let mut config = memory_config();
        config.embedding.provider = "disabled".to_string();
        let err = build_searcher(&config).await.err().unwrap();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn test_build_searcher_uses_retrieval_params() {
        let mut config = memory_config();
        config.retrieval.final_limit = 5;
        config.retrieval.semantic_pool = 20;
        let searcher = build_searcher(&config).await.unwrap();
        assert_eq!(searcher.params().final_limit, 5);
        assert_eq!(searcher.params().semantic_pool, 20);
    }

    #[tokio::test]
    async fn test_memory_store_without_seed_is_empty() {
        let mut config = Config::default();
        config.store.provider = "memory".to_string();
        config.embedding.provider = "disabled".to_string();
        let embedder = create_provider(&config.embedding).unwrap();
        let store = create_store(&config, embedder.as_ref()).await.unwrap();
        let hits = store.search(&[0.0; 4], None, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_seeded_from_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("products.csv");
        std::fs::write(&path, "ID,Name,Description\n1,Apple Juice,\n2,Pear Nectar,Bottled\n")
            .unwrap();
        let mut config = Config::default();
        config.store.provider = "memory".to_string();
        config.store.seed_path = Some(path);
        let embedder = FixedEmbedder;
        let store = create_store(&config, &embedder).await.unwrap();
        let filter = product_search_core::store::FieldMatch::first_word("pear");
        let hits = store.search(&[1.0, 0.0], Some(&filter), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.description.as_deref(), Some("Bottled"));
    }

    #[tokio::test]
    async fn test_memory_store_missing_seed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.provider = "memory".to_string();
        config.store.seed_path = Some(dir.path().join("absent.jsonl"));
        config.embedding.provider = "disabled".to_string();
        let embedder = create_provider(&config.embedding).unwrap();
        let err = create_store(&config, embedder.as_ref())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to load seed records"));
    }
}
