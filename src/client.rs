//! Core library client for knowledge-search
//!
//! [`KnowledgeClient`] is the context object a hosting process builds once at
//! startup and hands to its request handlers. It owns the configuration, the
//! current knowledge index snapshot and the provider selector.

use crate::config::Config;
use crate::error::{SearchError, ValidationError};
use crate::knowledge::{KnowledgeIndex, Resolution};
use crate::search::{Capabilities, ProviderSelector, SearchProvider};
use crate::types::{ProviderKind, SearchHit};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Main client for searching and resolving indexed symbols
///
/// # Example
///
/// ```no_run
/// use knowledge_search::KnowledgeClient;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = KnowledgeClient::new().await?;
///     for hit in client.search("ToolConfig", 1, None).await? {
///         println!("{:.3} {}", hit.score, hit.item.id);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct KnowledgeClient {
    config: Arc<Config>,
    index: Arc<RwLock<Arc<KnowledgeIndex>>>,
    selector: Arc<ProviderSelector>,
}

impl KnowledgeClient {
    /// Create a client from the default configuration file and environment
    pub async fn new() -> Result<Self, SearchError> {
        let config = Config::new()?;
        Self::with_config(config).await
    }

    /// Create a client with a custom configuration
    ///
    /// A missing or unreadable index file is logged and replaced by an empty
    /// index, so the client still starts.
    pub async fn with_config(config: Config) -> Result<Self, SearchError> {
        let index = match KnowledgeIndex::load(&config.index.path) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("Starting with an empty knowledge index: {}", e);
                KnowledgeIndex::empty()
            }
        };
        Self::with_index(config, index).await
    }

    /// Create a client around an already built index
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or when the configured
    /// provider needs an embedding API key that is not set.
    pub async fn with_index(config: Config, index: KnowledgeIndex) -> Result<Self, SearchError> {
        config.validate()?;

        let capabilities = Capabilities::probe(&config.embedding);
        let selector = ProviderSelector::new(&config, capabilities);
        let index = Arc::new(index);

        // Fail now rather than on the first query
        selector.select(config.search.provider, &index)?;

        tracing::info!(
            "Knowledge client ready: {} items, default provider {}",
            index.len(),
            config.search.provider
        );

        Ok(Self {
            config: Arc::new(config),
            index: Arc::new(RwLock::new(index)),
            selector: Arc::new(selector),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current index snapshot
    pub async fn index(&self) -> Arc<KnowledgeIndex> {
        self.index.read().await.clone()
    }

    /// Search with the configured default provider
    pub async fn search(
        &self,
        query: &str,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.search_with(self.config.search.provider, query, page, page_size)
            .await
    }

    /// Search with an explicit provider
    pub async fn search_with(
        &self,
        kind: ProviderKind,
        query: &str,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let page_size = page_size.unwrap_or(self.config.search.page_size);
        self.validate_paging(page, page_size)?;

        let start = Instant::now();
        let provider = self.provider(kind).await?;
        let hits = provider.search(query, page, page_size).await?;

        tracing::debug!(
            "{} search '{}' page {} returned {} hits in {:?}",
            provider.name(),
            query,
            page,
            hits.len(),
            start.elapsed()
        );
        Ok(hits)
    }

    /// Resolve a dotted name against the current index
    pub async fn resolve(&self, fqn: &str) -> Resolution {
        self.index().await.resolve_target(fqn)
    }

    /// Load a new index snapshot from `path` (or the configured path)
    ///
    /// On failure the error is returned and the previous snapshot stays in
    /// use. Returns the number of items now indexed.
    pub async fn reload(&self, path: Option<&Path>) -> Result<usize, SearchError> {
        let path = path.unwrap_or(self.config.index.path.as_path());
        let index = Arc::new(KnowledgeIndex::load(path)?);
        let count = index.len();

        let mut current = self.index.write().await;
        *current = index;
        self.selector.reset();
        drop(current);

        tracing::info!("Reloaded knowledge index from {} ({} items)", path.display(), count);
        Ok(count)
    }

    async fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn SearchProvider>, SearchError> {
        let index = self.index().await;
        self.selector.select(kind, &index)
    }

    fn validate_paging(&self, page: usize, page_size: usize) -> Result<(), SearchError> {
        if page == 0 {
            return Err(ValidationError::ConstraintViolation {
                field: "page".to_string(),
                constraint: "at least 1".to_string(),
                actual: page.to_string(),
            }
            .into());
        }

        let max = self.config.search.max_page_size;
        if page_size == 0 || page_size > max {
            return Err(ValidationError::ConstraintViolation {
                field: "page_size".to_string(),
                constraint: format!("between 1 and {}", max),
                actual: page_size.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
