//! Provider selection with capability probing and per-snapshot caching

use super::{
    Bm25SearchProvider, HybridSearchProvider, KeywordSearchProvider, SearchProvider,
    VectorSearchProvider,
};
use crate::config::{Config, EmbeddingConfig};
use crate::error::{EmbeddingError, SearchError};
use crate::knowledge::KnowledgeIndex;
use crate::types::ProviderKind;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Whether an optional capability can be used, and why not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => f.write_str("available"),
            Availability::Unavailable(reason) => write!(f, "unavailable ({reason})"),
        }
    }
}

/// Optional capabilities detected at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// BM25 ranking backend compiled in
    pub bm25: Availability,
    /// Embedding API key configured
    pub embedding: Availability,
}

impl Capabilities {
    /// Probe the build and the environment
    pub fn probe(embedding: &EmbeddingConfig) -> Self {
        let bm25 = if Bm25SearchProvider::backend_available() {
            Availability::Available
        } else {
            Availability::Unavailable("built without the `bm25` feature".to_string())
        };

        let embedding = match embedding.resolve_api_key() {
            Some(_) => Availability::Available,
            None => Availability::Unavailable(format!(
                "no API key in ${} or embedding.api_key",
                embedding.api_key_env
            )),
        };

        Self { bm25, embedding }
    }

    /// Everything available; used by tests and embedders that know better
    pub fn all() -> Self {
        Self {
            bm25: Availability::Available,
            embedding: Availability::Available,
        }
    }
}

type CachedProvider = (Arc<KnowledgeIndex>, Arc<dyn SearchProvider>);

/// Maps a requested [`ProviderKind`] to a ready provider
///
/// Built providers are cached per kind and reused while the index snapshot
/// they were built from is still the current one.
pub struct ProviderSelector {
    embedding: EmbeddingConfig,
    hybrid_primary: ProviderKind,
    capabilities: Capabilities,
    cache: Mutex<HashMap<ProviderKind, CachedProvider>>,
}

impl ProviderSelector {
    pub fn new(config: &Config, capabilities: Capabilities) -> Self {
        tracing::debug!(
            "Search capabilities: bm25 {}, embedding {}",
            capabilities.bm25,
            capabilities.embedding
        );
        Self {
            embedding: config.embedding.clone(),
            hybrid_primary: config.search.hybrid_primary,
            capabilities,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Return a provider for `kind` built over `index`
    ///
    /// Degrades with a warning when BM25 is unavailable. A vector provider
    /// without an API key is an error.
    pub fn select(
        &self,
        kind: ProviderKind,
        index: &Arc<KnowledgeIndex>,
    ) -> Result<Arc<dyn SearchProvider>, SearchError> {
        if let Some(provider) = self.cached(kind, index) {
            return Ok(provider);
        }

        let mut provider = self.create(kind)?;
        provider.build_index(index.items());
        tracing::info!(
            "Built {} provider for '{}' over {} items",
            provider.name(),
            kind,
            index.len()
        );

        let provider: Arc<dyn SearchProvider> = Arc::from(provider);
        self.lock_cache()
            .insert(kind, (Arc::clone(index), Arc::clone(&provider)));
        Ok(provider)
    }

    /// Drop every cached provider
    pub fn reset(&self) {
        self.lock_cache().clear();
    }

    fn cached(
        &self,
        kind: ProviderKind,
        index: &Arc<KnowledgeIndex>,
    ) -> Option<Arc<dyn SearchProvider>> {
        let cache = self.lock_cache();
        let (built_for, provider) = cache.get(&kind)?;
        Arc::ptr_eq(built_for, index).then(|| Arc::clone(provider))
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<ProviderKind, CachedProvider>> {
        // A panic while holding the lock leaves only a stale cache behind
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn create(&self, kind: ProviderKind) -> Result<Box<dyn SearchProvider>, SearchError> {
        match kind {
            ProviderKind::Keyword => Ok(Box::new(KeywordSearchProvider::new())),
            ProviderKind::Bm25 => Ok(self.bm25_or_keyword()),
            ProviderKind::Vector => self.vector(),
            ProviderKind::Hybrid => {
                let primary = match self.hybrid_primary {
                    ProviderKind::Vector => self.vector()?,
                    _ => {
                        if let Availability::Unavailable(reason) = &self.capabilities.bm25 {
                            tracing::warn!(
                                "BM25 unavailable ({}), hybrid search uses keyword matching only",
                                reason
                            );
                            return Ok(Box::new(KeywordSearchProvider::new()));
                        }
                        Box::new(Bm25SearchProvider::new())
                    }
                };
                Ok(Box::new(HybridSearchProvider::new(
                    primary,
                    Box::new(KeywordSearchProvider::new()),
                )))
            }
        }
    }

    /// Vector provider, refused up front when embeddings are unavailable
    fn vector(&self) -> Result<Box<dyn SearchProvider>, SearchError> {
        if let Availability::Unavailable(reason) = &self.capabilities.embedding {
            tracing::debug!("Embeddings unavailable: {}", reason);
            return Err(EmbeddingError::MissingApiKey(self.embedding.api_key_env.clone()).into());
        }
        Ok(Box::new(VectorSearchProvider::new(&self.embedding)?))
    }

    fn bm25_or_keyword(&self) -> Box<dyn SearchProvider> {
        match &self.capabilities.bm25 {
            Availability::Available => Box::new(Bm25SearchProvider::new()),
            Availability::Unavailable(reason) => {
                tracing::warn!("BM25 unavailable ({}), using keyword search", reason);
                Box::new(KeywordSearchProvider::new())
            }
        }
    }
}
