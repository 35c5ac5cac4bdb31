//! # Product Search
//!
//! Tiered product search over a vector index. A query is answered by up to
//! three retrieval passes against the same index, each narrower than the
//! semantic fallback:
//!
//! ```text
//!            query ──▶ normalize ──▶ first word
//!                          │
//!                          ▼
//!   ┌────────────┐   ┌──────────────┐   ┌──────────────────┐
//!   │   exact    │──▶│    prefix    │──▶│     semantic     │
//!   │ first_word │   │ first_word_  │   │ substring │ rest │
//!   └────────────┘   │   prefixes   │   └──────────────────┘
//!                    └──────────────┘
//!                          │
//!                          ▼
//!              merge buckets, keep top 10
//! ```
//!
//! The planner, ranking and in-memory store live in `product_search_core`;
//! this crate adds configuration, embedding providers, the Qdrant client,
//! ingestion, the HTTP server, and the `psearch` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | Embedding providers (fastembed, Ollama, OpenAI) |
//! | [`qdrant`] | Qdrant gRPC candidate store and collection writer |
//! | [`ingest`] | CSV / JSON records → embeddings → Qdrant points |
//! | [`search`] | Collaborator assembly and CLI search |
//! | [`server`] | axum HTTP server (`/search`, `/health`) |

pub mod config;
pub mod embedding;
pub mod ingest;
pub mod qdrant;
pub mod search;
pub mod server;
