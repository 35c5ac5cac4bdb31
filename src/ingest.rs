//! Ingestion pipeline: source records → embeddings → Qdrant points.
//!
//! Reads product records (`ID`, `Name`, optional `Description`) from a CSV
//! file with a header row, a JSON array, or JSON Lines, derives the `first_word` / `first_word_prefixes`
//! keys with the same normalizer the query planner uses, embeds
//! `"{ID} {Name}"` for every record, and reloads the collection from scratch.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use product_search_core::embedding::EmbeddingProvider;
use product_search_core::models::Document;
use product_search_core::store::memory::InMemoryStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::qdrant::QdrantStore;

/// A point written during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Vector index point ID (UUID); distinct from the product `ID` in the payload.
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Document,
}

/// Write side of the vector index used by [`load_documents`].
#[async_trait]
pub trait CollectionWriter: Send + Sync {
    fn collection(&self) -> &str;

    /// Drop the collection if present and create it empty with cosine
    /// distance over `dims`-dimensional vectors.
    async fn recreate_collection(&self, dims: usize) -> Result<()>;

    /// Index the keyword payload fields the search filters target.
    async fn create_keyword_indexes(&self) -> Result<()>;

    async fn upsert(&self, points: &[Point]) -> Result<()>;
}

/// Layout of a records file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordFormat {
    /// Header row with `ID`, `Name` and optional `Description` columns.
    Csv,
    /// A single JSON array of records.
    Json,
    /// One JSON record per line.
    JsonLines,
}

impl RecordFormat {
    /// Guess the format from the file extension; unknown extensions read as JSON Lines.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => RecordFormat::Csv,
            Some("json") => RecordFormat::Json,
            _ => RecordFormat::JsonLines,
        }
    }
}

/// CSV row; every cell is read as text so IDs like `007` survive.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "ID", alias = "id")]
    id: String,
    #[serde(rename = "Name", alias = "name", default)]
    name: String,
    #[serde(rename = "Description", alias = "description", default)]
    description: Option<String>,
}

fn parse_csv(content: &str) -> Result<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());
    reader
        .deserialize::<CsvRecord>()
        .enumerate()
        .map(|(n, row)| {
            let row = row.with_context(|| format!("Failed to parse CSV record {}", n + 1))?;
            let description = row.description.filter(|d| !d.trim().is_empty());
            Ok(Document::new(row.id, row.name, description))
        })
        .collect()
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records: usize,
    pub skipped: usize,
    pub uploaded: usize,
}

/// Parse source records in `format`. JSON Lines input ignores blank lines.
///
/// Records with a blank `Name` are skipped and counted; malformed records
/// are errors.
pub fn parse_records(content: &str, format: RecordFormat) -> Result<(Vec<Document>, usize)> {
    let raw: Vec<Document> = match format {
        RecordFormat::Csv => parse_csv(content)?,
        RecordFormat::Json => {
            serde_json::from_str(content).context("Failed to parse JSON array of records")?
        }
        RecordFormat::JsonLines => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Failed to parse record on line {}", n + 1))
            })
            .collect::<Result<_>>()?,
    };

    let mut docs = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for record in raw {
        if record.name.trim().is_empty() {
            tracing::warn!(id = %record.id, "skipping record with empty Name");
            skipped += 1;
            continue;
        }
        // Keys are always re-derived so they follow the current normalizer.
        docs.push(Document::new(record.id, record.name, record.description));
    }
    Ok((docs, skipped))
}

/// Text embedded for a record.
pub fn embedding_text(doc: &Document) -> String {
    format!("{} {}", doc.id, doc.name)
}

/// Embed `docs` in batches of `batch_size` and pair each with a fresh point ID.
pub async fn build_points(
    embedder: &dyn EmbeddingProvider,
    docs: &[Document],
    batch_size: usize,
) -> Result<Vec<Point>> {
    let mut points = Vec::with_capacity(docs.len());
    for batch in docs.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(embedding_text).collect();
        let vectors = embedder.encode_batch(&texts).await?;
        if vectors.len() != batch.len() {
            bail!(
                "embedding provider returned {} vectors for {} records",
                vectors.len(),
                batch.len()
            );
        }
        for (doc, vector) in batch.iter().zip(vectors) {
            points.push(Point {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: doc.clone(),
            });
        }
    }
    Ok(points)
}

/// Recreate the collection and upload `docs` in chunks of `chunk_size`.
pub async fn load_documents(
    store: &dyn CollectionWriter,
    embedder: &dyn EmbeddingProvider,
    docs: &[Document],
    batch_size: usize,
    chunk_size: usize,
) -> Result<usize> {
    store
        .recreate_collection(embedder.dims())
        .await
        .with_context(|| format!("Failed to recreate collection '{}'", store.collection()))?;
    store.create_keyword_indexes().await?;

    let mut uploaded = 0;
    for chunk in docs.chunks(chunk_size.max(1)) {
        let points = build_points(embedder, chunk, batch_size).await?;
        store.upsert(&points).await?;
        uploaded += points.len();
        tracing::info!(uploaded, total = docs.len(), "uploaded points");
    }
    Ok(uploaded)
}

/// Embed `docs` into an in-process store. Returns the number inserted.
pub async fn seed_memory_store(
    store: &InMemoryStore,
    embedder: &dyn EmbeddingProvider,
    docs: &[Document],
    batch_size: usize,
) -> Result<usize> {
    let points = build_points(embedder, docs, batch_size).await?;
    let count = points.len();
    for point in points {
        store.insert(point.payload, point.vector)?;
    }
    Ok(count)
}

/// Read and parse a records file, taking the format from its extension
/// unless `format` is given.
pub fn read_records(path: &Path, format: Option<RecordFormat>) -> Result<(Vec<Document>, usize)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file: {}", path.display()))?;
    let format = format.unwrap_or_else(|| RecordFormat::from_path(path));
    parse_records(&content, format)
        .with_context(|| format!("Failed to parse records file: {}", path.display()))
}

/// Entry point for `psearch ingest`.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    format: Option<RecordFormat>,
    chunk_size: Option<usize>,
    dry_run: bool,
) -> Result<IngestStats> {
    let (docs, skipped) = read_records(path, format)?;

    let mut stats = IngestStats {
        records: docs.len(),
        skipped,
        uploaded: 0,
    };

    if dry_run {
        return Ok(stats);
    }

    if config.store.provider != "qdrant" {
        bail!(
            "Ingestion writes to Qdrant; store.provider is '{}'",
            config.store.provider
        );
    }
    if !config.embedding.is_enabled() {
        bail!("Ingestion needs an embedding provider; [embedding].provider is 'disabled'");
    }

    let embedder = create_provider(&config.embedding)?;
    let store = QdrantStore::new(&config.store)?;
    let chunk_size = chunk_size.unwrap_or(config.ingest.chunk_size);

    tracing::info!(
        records = docs.len(),
        collection = store.collection(),
        model = embedder.model_name(),
        dims = embedder.dims(),
        "starting ingestion"
    );

    stats.uploaded = load_documents(
        &store,
        embedder.as_ref(),
        &docs,
        config.embedding.batch_size,
        chunk_size,
    )
    .await?;

    Ok(stats)
}
