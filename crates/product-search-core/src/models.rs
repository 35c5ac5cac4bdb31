//! Product documents, retrieval hits, and the public result shape.

use serde::{Deserialize, Deserializer, Serialize};

/// A product stored in a candidate store.
///
/// Field names on the wire match the payload written by ingestion:
/// `ID`, `Name`, `Description`, `first_word`, `first_word_prefixes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "ID", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Description", alias = "description", default)]
    pub description: Option<String>,
    /// Normalized first token of `name`.
    #[serde(default)]
    pub first_word: String,
    /// Every non-empty prefix of `first_word`.
    #[serde(default)]
    pub first_word_prefixes: Vec<String>,
}

impl Document {
    /// Build a document, deriving the match keys from `name`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: Option<String>) -> Self {
        let name = name.into();
        let (first_word, first_word_prefixes) = crate::normalize::document_keys(&name);
        Self {
            id: id.into(),
            name,
            description,
            first_word,
            first_word_prefixes,
        }
    }
}

/// A document returned by one retrieval pass, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub document: Document,
    /// Similarity to the query vector; higher is closer.
    pub score: f32,
}

impl Hit {
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// One entry of the `results` array returned to search callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    pub score: f32,
}

impl From<Hit> for ResultItem {
    fn from(hit: Hit) -> Self {
        Self {
            id: hit.document.id,
            name: hit.document.name,
            description: hit.document.description,
            score: hit.score,
        }
    }
}

/// Product IDs come from tabular sources and may be stored as numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for ID, got {}",
            other
        ))),
    }
}
