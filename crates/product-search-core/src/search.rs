//! Tiered product retrieval: exact, then prefix, then semantic.
//!
//! The planner operates entirely through the [`EmbeddingProvider`] and
//! [`CandidateStore`] traits. The application constructs a
//! [`TieredSearcher`] with its collaborators and calls
//! [`TieredSearcher::search`] once per request.
//!
//! # Algorithm
//!
//! 1. Normalize the query and take its first word; embed the raw query once.
//! 2. **Exact**: vector search restricted to `first_word == <first word>`.
//! 3. **Prefix**: if exact left room, vector search for the residual budget
//!    restricted to documents whose `first_word_prefixes` contain the first
//!    word; IDs already selected are dropped.
//! 4. **Semantic**: if room remains, unfiltered search over a wider pool,
//!    skipping IDs already selected, until the residual budget is filled.
//! 5. Split semantic hits into `substr` (normalized query is a substring of
//!    the normalized name) and `rest`.
//! 6. Sort each bucket by score (desc), concatenate
//!    exact → prefix → substr → rest, truncate to `final_limit`.
//!
//! Each tier runs only after the previous tier's hit count is known. A
//! failure anywhere aborts the request; partial results are never returned.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::{SearchError, Tier};
use crate::models::{Hit, ResultItem};
use crate::normalize::{first_word, normalize};
use crate::store::{CandidateStore, FieldMatch};

/// How to order hits with equal scores inside a bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Keep the order the candidate store returned.
    #[default]
    RetrievalOrder,
    /// Ascending document ID.
    DocumentId,
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Maximum results returned per query.
    pub final_limit: usize,
    /// Candidates requested from the unfiltered semantic pass.
    pub semantic_pool: usize,
    pub tie_break: TieBreak,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            final_limit: 10,
            semantic_pool: 50,
            tie_break: TieBreak::RetrievalOrder,
        }
    }
}

/// Hits grouped by the tier (and semantic sub-split) that produced them.
#[derive(Debug, Clone, Default)]
pub struct Buckets {
    pub exact: Vec<Hit>,
    pub prefix: Vec<Hit>,
    pub substr: Vec<Hit>,
    pub rest: Vec<Hit>,
}

/// Which tiers ran for a query and how many hits each contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierStats {
    /// Tiers that issued a store call, in execution order.
    pub tiers_run: Vec<Tier>,
    pub exact: usize,
    pub prefix: usize,
    pub substr: usize,
    pub rest: usize,
}

impl TierStats {
    fn from_buckets(tiers_run: Vec<Tier>, buckets: &Buckets) -> Self {
        Self {
            tiers_run,
            exact: buckets.exact.len(),
            prefix: buckets.prefix.len(),
            substr: buckets.substr.len(),
            rest: buckets.rest.len(),
        }
    }
}

/// Ranked hits for one query plus per-tier bookkeeping.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<Hit>,
    pub stats: TierStats,
}

impl SearchOutcome {
    /// Project the ranked hits onto the public result shape, preserving order.
    pub fn into_results(self) -> Vec<ResultItem> {
        self.hits.into_iter().map(ResultItem::from).collect()
    }
}

/// Tiered query planner with injected collaborators.
#[derive(Clone)]
pub struct TieredSearcher {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn CandidateStore>,
    params: SearchParams,
}

impl TieredSearcher {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn CandidateStore>,
        params: SearchParams,
    ) -> Self {
        Self {
            embedder,
            store,
            params,
        }
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Run the tiered search for `query`.
    ///
    /// Returns [`SearchError::EmptyQuery`] without touching any collaborator
    /// if `query` is blank.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let normalized = normalize(query);
        let word = first_word(&normalized);
        let limit = self.params.final_limit;

        let vector = self
            .embedder
            .encode(query)
            .await
            .map_err(SearchError::Embedding)?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut buckets = Buckets::default();
        let mut tiers_run = Vec::new();

        let filter = FieldMatch::first_word(word);
        let hits = self
            .run_tier(Tier::Exact, &vector, Some(&filter), limit)
            .await?;
        tiers_run.push(Tier::Exact);
        buckets.exact = take_unseen(hits, &mut seen, limit);

        let remaining = limit.saturating_sub(seen.len());
        if remaining > 0 {
            // Exact matches also carry the word among their prefixes; they are
            // dropped here and the semantic tier fills the shortfall.
            let filter = FieldMatch::first_word_prefix(word);
            let hits = self
                .run_tier(Tier::Prefix, &vector, Some(&filter), remaining)
                .await?;
            tiers_run.push(Tier::Prefix);
            buckets.prefix = take_unseen(hits, &mut seen, remaining);
        }

        let remaining = limit.saturating_sub(seen.len());
        if remaining > 0 {
            let pool = self.params.semantic_pool.max(limit);
            let hits = self.run_tier(Tier::Semantic, &vector, None, pool).await?;
            tiers_run.push(Tier::Semantic);
            let semantic = take_unseen(hits, &mut seen, remaining);
            let (substr, rest) = split_semantic(semantic, &normalized);
            buckets.substr = substr;
            buckets.rest = rest;
        }

        let stats = TierStats::from_buckets(tiers_run, &buckets);
        let hits = merge_buckets(buckets, limit, self.params.tie_break);
        Ok(SearchOutcome { hits, stats })
    }

    async fn run_tier(
        &self,
        tier: Tier,
        vector: &[f32],
        filter: Option<&FieldMatch>,
        limit: usize,
    ) -> Result<Vec<Hit>, SearchError> {
        self.store
            .search(vector, filter, limit)
            .await
            .map_err(|error| SearchError::Store { tier, error })
    }
}

/// Keep hits in retrieval order whose IDs are not yet in `seen`, up to `cap`.
fn take_unseen(hits: Vec<Hit>, seen: &mut HashSet<String>, cap: usize) -> Vec<Hit> {
    let mut out = Vec::with_capacity(cap.min(hits.len()));
    for hit in hits {
        if out.len() == cap {
            break;
        }
        if seen.insert(hit.document.id.clone()) {
            out.push(hit);
        }
    }
    out
}

/// Partition semantic hits by whether the normalized query occurs in the
/// normalized product name. Order within each side is preserved.
pub fn split_semantic(hits: Vec<Hit>, normalized_query: &str) -> (Vec<Hit>, Vec<Hit>) {
    hits.into_iter()
        .partition(|h| normalize(&h.document.name).contains(normalized_query))
}

/// Sort each bucket by descending score, concatenate in fixed bucket order,
/// and truncate to `limit`.
pub fn merge_buckets(buckets: Buckets, limit: usize, tie_break: TieBreak) -> Vec<Hit> {
    let Buckets {
        mut exact,
        mut prefix,
        mut substr,
        mut rest,
    } = buckets;

    let mut merged = Vec::with_capacity(limit);
    for bucket in [&mut exact, &mut prefix, &mut substr, &mut rest] {
        sort_bucket(bucket, tie_break);
        merged.append(bucket);
    }
    merged.truncate(limit);
    merged
}

/// Stable descending sort by score.
fn sort_bucket(bucket: &mut [Hit], tie_break: TieBreak) {
    bucket.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| match tie_break {
                TieBreak::RetrievalOrder => Ordering::Equal,
                TieBreak::DocumentId => a.id().cmp(b.id()),
            })
    });
}
