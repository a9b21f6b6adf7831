//! # knowledge-search - Multi-strategy symbol search
//!
//! Retrieval core for a catalog of indexed symbols (classes, functions,
//! modules, ...). Each symbol carries a fully-qualified name, a curator
//! assigned rank and an optional docstring. Queries are answered by one of
//! several interchangeable strategies behind a single [`SearchProvider`]
//! contract.
//!
//! ## Strategies
//!
//! - **Keyword**: substring and suffix scoring over names and docstrings
//! - **BM25**: Okapi BM25 over a corpus built from repeated names plus
//!   docstrings (Tantivy, behind the `bm25` feature)
//! - **Vector**: cosine similarity against a precomputed embedding table,
//!   with the query embedded by a remote OpenAI-compatible service
//! - **Hybrid**: a primary strategy that cascades to keyword matching when it
//!   finds nothing
//!
//! Every strategy orders hits by score, then rank, then name, so results do
//! not depend on the order items were indexed in.
//!
//! ## Architecture
//!
//! ```text
//!              KnowledgeClient
//!         (config, index snapshot)
//!                    |
//!            ProviderSelector ---- Capabilities (bm25 built? API key?)
//!                    |
//!    +---------+-----+-----+----------+
//!    |         |           |          |
//! Keyword    BM25       Vector     Hybrid
//!                          |      (primary -> keyword)
//!               RemoteEmbeddingClient
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use knowledge_search::{Config, KnowledgeClient, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = KnowledgeClient::with_config(Config::new()?).await?;
//!
//!     let hits = client
//!         .search_with(ProviderKind::Bm25, "tool config", 1, Some(5))
//!         .await?;
//!     for hit in hits {
//!         println!("{:.3} {}", hit.score, hit.item.id);
//!     }
//!
//!     if let Some(item) = client.resolve("pkg.Mod.ClassA.method_x").await.item() {
//!         println!("defined on {}", item.id);
//!     }
//!     Ok(())
//! }
//! ```

/// Context object owning configuration, index snapshot and provider selector
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Remote embedding generation
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Knowledge index loading, FQN resolution and alias validation
pub mod knowledge;

/// Platform-specific default locations
pub mod paths;

/// Search providers and provider selection
pub mod search;

/// Canonical item, hit and provider types
pub mod types;

pub use client::KnowledgeClient;
pub use config::Config;
pub use error::SearchError;
pub use knowledge::{KnowledgeIndex, Resolution};
pub use search::{ProviderSelector, SearchProvider};
pub use types::{Item, ProviderKind, SearchHit, SymbolKind, SymbolRecord};
