//! Pluggable search strategies over the knowledge index
//!
//! Every strategy implements [`SearchProvider`]. Results are always ordered
//! by [`compare_hits`] and paged with [`paginate`], so two providers given the
//! same items in any order answer a query identically.

pub mod bm25;
pub mod hybrid;
pub mod keyword;
pub mod selector;
pub mod vector;

pub use bm25::Bm25SearchProvider;
pub use hybrid::HybridSearchProvider;
pub use keyword::KeywordSearchProvider;
pub use selector::{Availability, Capabilities, ProviderSelector};
pub use vector::VectorSearchProvider;

use crate::error::SearchError;
use crate::types::{Item, SearchHit};
use std::cmp::Ordering;
use std::sync::Arc;

/// Capability contract shared by all strategies
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short strategy name ("keyword", "bm25", ...)
    fn name(&self) -> &'static str;

    /// Replace all internal state with a structure built from `items`
    ///
    /// Never fails; empty or unusable input leaves a provider that returns
    /// empty results.
    fn build_index(&mut self, items: &[Arc<Item>]);

    /// Every hit for `query`, ordered by [`compare_hits`]
    ///
    /// Empty and no-match queries yield `Ok(vec![])`. Only providers that talk
    /// to a remote service return errors.
    async fn ranked(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;

    /// Page `page` (1-based) of [`SearchProvider::ranked`]
    ///
    /// An invalid page or page size returns empty without querying.
    async fn search(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if page == 0 || page_size == 0 {
            return Ok(Vec::new());
        }
        Ok(paginate(self.ranked(query).await?, page, page_size))
    }
}

/// Total order used by every provider: score descending, then rank
/// ascending, then id ascending
pub fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item.rank.cmp(&b.item.rank))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

/// Sort with [`compare_hits`]
pub fn rank(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.sort_by(compare_hits);
    hits
}

/// Slice `[(page-1)*page_size, page*page_size)`; page 0 or an out-of-range
/// page gives an empty vector
pub fn paginate(hits: Vec<SearchHit>, page: usize, page_size: usize) -> Vec<SearchHit> {
    if page == 0 || page_size == 0 {
        return Vec::new();
    }

    let start = (page - 1).saturating_mul(page_size);
    hits.into_iter().skip(start).take(page_size).collect()
}

/// Lower-case and split on whitespace
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
