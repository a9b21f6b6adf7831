//! Cascading search: a primary strategy with a guaranteed fallback
//!
//! Frequency-based ranking can miss genuine matches (a keyword that is only
//! a substring of a token, or a term whose corpus statistics cancel out), so
//! whenever the primary finds nothing the secondary is asked instead. A
//! primary error counts as finding nothing.

use super::SearchProvider;
use crate::error::SearchError;
use crate::types::{Item, SearchHit};
use std::sync::Arc;

pub struct HybridSearchProvider {
    primary: Box<dyn SearchProvider>,
    secondary: Box<dyn SearchProvider>,
}

impl HybridSearchProvider {
    pub fn new(primary: Box<dyn SearchProvider>, secondary: Box<dyn SearchProvider>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    pub fn secondary_name(&self) -> &'static str {
        self.secondary.name()
    }

    async fn primary_ranked(&self, query: &str) -> Vec<SearchHit> {
        match self.primary.ranked(query).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(
                    "{} search failed ({}), falling back to {}: {}",
                    self.primary.name(),
                    if e.is_retryable() { "transient" } else { "permanent" },
                    self.secondary.name(),
                    e
                );
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for HybridSearchProvider {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn build_index(&mut self, items: &[Arc<Item>]) {
        self.primary.build_index(items);
        self.secondary.build_index(items);
    }

    /// The primary's full ranking, or the secondary's when that is empty
    ///
    /// Paging slices whichever list won, so a page past the end of a
    /// non-empty primary ranking stays empty instead of cascading.
    async fn ranked(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let hits = self.primary_ranked(query).await;
        if !hits.is_empty() {
            return Ok(hits);
        }

        tracing::debug!(
            "{} found nothing for '{}', using {}",
            self.primary.name(),
            query,
            self.secondary.name()
        );
        self.secondary.ranked(query).await
    }
}
