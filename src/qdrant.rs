//! Qdrant-backed [`CandidateStore`].
//!
//! Talks to Qdrant over gRPC with `qdrant-client`. Searches send the query
//! vector plus an optional keyword filter; a keyword `match` condition is
//! equality on a scalar payload field and membership on an array field, so
//! one condition serves both the exact (`first_word`) and prefix
//! (`first_word_prefixes`) tiers.
//!
//! Collection management goes through [`CollectionWriter`] and is used by
//! the ingestion pipeline only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    CollectionExistsRequest, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeleteCollectionBuilder, Distance, FieldType, Filter, Query, QueryPoints, QueryPointsBuilder,
    ScoredPoint, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::time::Duration;

use product_search_core::models::{Document, Hit};
use product_search_core::store::{CandidateStore, FieldMatch, PayloadField};

use crate::config::StoreConfig;
use crate::ingest::{CollectionWriter, Point};

/// gRPC client for one Qdrant collection.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Build a client for `[store]`. No connection is made until the first call.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .skip_compatibility_check();
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .with_context(|| format!("Invalid Qdrant url: {}", config.url))?;
        Ok(Self {
            client,
            collection: config.collection.clone(),
        })
    }
}

#[async_trait]
impl CandidateStore for QdrantStore {
    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&FieldMatch>,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let request = query_request(&self.collection, vector, filter, limit);
        let response = self
            .client
            .query(request)
            .await
            .context("Qdrant query failed")?;
        response.result.into_iter().map(hit_from_scored_point).collect()
    }
}

#[async_trait]
impl CollectionWriter for QdrantStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn recreate_collection(&self, dims: usize) -> Result<()> {
        if self
            .client
            .collection_exists(CollectionExistsRequest {
                collection_name: self.collection.clone(),
            })
            .await
            .context("Qdrant collection lookup failed")?
        {
            self.client
                .delete_collection(DeleteCollectionBuilder::new(&self.collection))
                .await
                .context("Qdrant delete collection failed")?;
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dims as u64, Distance::Cosine)),
            )
            .await
            .context("Qdrant create collection failed")?;
        Ok(())
    }

    async fn create_keyword_indexes(&self) -> Result<()> {
        for field in [PayloadField::FirstWord, PayloadField::FirstWordPrefixes] {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(
                        &self.collection,
                        field.key(),
                        FieldType::Keyword,
                    )
                    .wait(true),
                )
                .await
                .with_context(|| format!("Qdrant payload index on '{}' failed", field.key()))?;
        }
        Ok(())
    }

    async fn upsert(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let structs = points.iter().map(point_struct).collect::<Result<Vec<_>>>()?;
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, structs).wait(true))
            .await
            .context("Qdrant upsert failed")?;
        Ok(())
    }
}

/// Keyword filter for one tier.
pub fn keyword_filter(filter: &FieldMatch) -> Filter {
    Filter::must([Condition::matches(filter.field.key(), filter.value.clone())])
}

/// Nearest-neighbour query with payloads, optionally restricted by `filter`.
pub fn query_request(
    collection: &str,
    vector: &[f32],
    filter: Option<&FieldMatch>,
    limit: usize,
) -> QueryPoints {
    let mut builder = QueryPointsBuilder::new(collection)
        .query(Query::new_nearest(vector.to_vec()))
        .limit(limit as u64)
        .with_payload(true);
    if let Some(f) = filter {
        builder = builder.filter(keyword_filter(f));
    }
    builder.build()
}

/// Decode a scored point's payload into a hit, keeping Qdrant's score.
pub fn hit_from_scored_point(point: ScoredPoint) -> Result<Hit> {
    if point.payload.is_empty() {
        anyhow::bail!("Invalid Qdrant response: point without payload");
    }
    let payload: serde_json::Map<String, serde_json::Value> = point
        .payload
        .into_iter()
        .map(|(key, value)| (key, value.into_json()))
        .collect();
    let document: Document = serde_json::from_value(serde_json::Value::Object(payload))
        .context("Invalid Qdrant response: malformed payload")?;
    Ok(Hit::new(document, point.score))
}

/// Convert an ingestion point into the gRPC point shape.
pub fn point_struct(point: &Point) -> Result<qdrant_client::qdrant::PointStruct> {
    let payload = Payload::try_from(serde_json::to_value(&point.payload)?)
        .context("Document does not serialize to a payload object")?;
    Ok(qdrant_client::qdrant::PointStruct::new(
        point.id.clone(),
        point.vector.clone(),
        payload,
    ))
}
