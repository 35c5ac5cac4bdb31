//! # Product Search Core
//!
//! Shared, runtime-free logic for Product Search: the text normalizer,
//! product data model, candidate store and embedding traits, and the
//! tiered retrieval planner that merges exact, prefix, and semantic hits
//! into a single ranked list.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. The
//! application crate supplies concrete embedding providers and store
//! backends and injects them into [`search::TieredSearcher`].

pub mod embedding;
pub mod error;
pub mod models;
pub mod normalize;
pub mod search;
pub mod store;
