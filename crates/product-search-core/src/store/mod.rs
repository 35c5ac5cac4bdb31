//! Candidate store abstraction.
//!
//! The [`CandidateStore`] trait is the only view the tiered planner has of
//! the vector index: a top-K similarity search, optionally restricted to
//! documents whose payload matches a [`FieldMatch`].
//!
//! Implementations must be `Send + Sync` and tolerate concurrent reads.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Hit;

/// Payload field a search filter can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    /// Scalar key: normalized first word of the product name.
    FirstWord,
    /// Array key: every prefix of the first word.
    FirstWordPrefixes,
}

impl PayloadField {
    /// Payload key as written by ingestion.
    pub fn key(&self) -> &'static str {
        match self {
            PayloadField::FirstWord => "first_word",
            PayloadField::FirstWordPrefixes => "first_word_prefixes",
        }
    }
}

/// Keyword filter: equality on a scalar field, membership on an array field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub field: PayloadField,
    pub value: String,
}

impl FieldMatch {
    pub fn first_word(value: impl Into<String>) -> Self {
        Self {
            field: PayloadField::FirstWord,
            value: value.into(),
        }
    }

    pub fn first_word_prefix(value: impl Into<String>) -> Self {
        Self {
            field: PayloadField::FirstWordPrefixes,
            value: value.into(),
        }
    }

    /// Whether a document satisfies this filter.
    pub fn matches(&self, doc: &crate::models::Document) -> bool {
        match self.field {
            PayloadField::FirstWord => doc.first_word == self.value,
            PayloadField::FirstWordPrefixes => {
                doc.first_word_prefixes.iter().any(|p| *p == self.value)
            }
        }
    }
}

/// Abstract vector index consumed by the tiered planner.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Return up to `limit` hits ordered by descending similarity to
    /// `vector`, restricted to documents matching `filter` when given.
    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&FieldMatch>,
        limit: usize,
    ) -> Result<Vec<Hit>>;
}
