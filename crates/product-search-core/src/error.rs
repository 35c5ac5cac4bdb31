//! Error type for the tiered search pipeline.

use std::fmt;

use thiserror::Error;

/// Retrieval pass that issued a candidate store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Exact,
    Prefix,
    Semantic,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Exact => "exact",
            Tier::Prefix => "prefix",
            Tier::Semantic => "semantic",
        })
    }
}

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent an unusable query.
    Validation,
    /// A collaborator failed; the request produced no results.
    Internal,
}

/// Failure of a whole search request. No partial results accompany it.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Query text is required")]
    EmptyQuery,

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("{tier} tier store search failed: {error:#}")]
    Store { tier: Tier, error: anyhow::Error },
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::EmptyQuery => ErrorKind::Validation,
            SearchError::Embedding(_) | SearchError::Store { .. } => ErrorKind::Internal,
        }
    }
}
