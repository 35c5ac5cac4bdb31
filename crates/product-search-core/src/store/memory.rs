//! In-memory [`CandidateStore`] for tests and small catalogs.
//!
//! Documents live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity; equal scores keep insertion order.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Document, Hit};

use super::{CandidateStore, FieldMatch};

struct StoredDoc {
    doc: Document,
    vector: Vec<f32>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    dims: Option<usize>,
    docs: RwLock<Vec<StoredDoc>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            dims: None,
            docs: RwLock::new(Vec::new()),
        }
    }

    /// A store that rejects vectors whose length is not `dims`.
    pub fn with_dims(dims: usize) -> Self {
        Self {
            dims: Some(dims),
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Append a document. Several entries may share a product ID, as in a
    /// real index where a product was loaded twice.
    pub fn insert(&self, doc: Document, vector: Vec<f32>) -> Result<()> {
        if let Some(dims) = self.dims {
            if vector.len() != dims {
                bail!(
                    "vector for document {} has {} dims, store expects {}",
                    doc.id,
                    vector.len(),
                    dims
                );
            }
        }
        let mut docs = self
            .docs
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        docs.push(StoredDoc { doc, vector });
        Ok(())
    }

    /// Number of stored entries. Fails if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        Ok(docs.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandidateStore for InMemoryStore {
    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&FieldMatch>,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        let mut hits: Vec<Hit> = docs
            .iter()
            .filter(|sd| filter.map_or(true, |f| f.matches(&sd.doc)))
            .map(|sd| Hit::new(sd.doc.clone(), cosine_similarity(vector, &sd.vector)))
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert(Document::new("1", "Green Tea", None), vec![1.0, 0.0])
            .unwrap();
        store
            .insert(Document::new("2", "Greenhouse Kit", None), vec![0.8, 0.6])
            .unwrap();
        store
            .insert(Document::new("3", "Black Tea", None), vec![0.0, 1.0])
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_unfiltered_sorted_by_similarity() {
        let hits = store().search(&[1.0, 0.0], None, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_limit_applies() {
        let hits = store().search(&[1.0, 0.0], None, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_exact_filter() {
        let filter = FieldMatch::first_word("green");
        let hits = store().search(&[0.0, 1.0], Some(&filter), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "1");
    }

    #[tokio::test]
    async fn test_prefix_filter() {
        let filter = FieldMatch::first_word_prefix("gre");
        let hits = store().search(&[0.0, 1.0], Some(&filter), 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryStore::new();
        for id in ["b", "a", "c"] {
            store
                .insert(Document::new(id, "Same", None), vec![1.0, 1.0])
                .unwrap();
        }
        let hits = store.search(&[1.0, 1.0], None, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_dims_enforced() {
        let store = InMemoryStore::with_dims(3);
        let err = store
            .insert(Document::new("1", "x", None), vec![1.0])
            .unwrap_err();
        assert!(err.to_string().contains("3"));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_poisoned_lock_is_an_error() {
        let store = std::sync::Arc::new(InMemoryStore::with_dims(1));
        store.insert(Document::new("1", "x", None), vec![1.0]).unwrap();

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.docs.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(store.len().is_err());
        assert!(store.is_empty().is_err());
        assert!(store
            .insert(Document::new("2", "y", None), vec![1.0])
            .is_err());
    }
}
