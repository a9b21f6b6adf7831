//! Keyword scoring over FQNs and docstrings
//!
//! Per query keyword: +10 when it occurs in the FQN, +20 more when it is the
//! whole FQN or its trailing dotted component, otherwise +5 when it occurs in
//! the docstring. Items scoring 0 are dropped.

use super::{SearchProvider, rank, tokenize};
use crate::error::SearchError;
use crate::types::{Item, SearchHit};
use std::sync::Arc;

const FQN_MATCH: f32 = 10.0;
const EXACT_NAME_BONUS: f32 = 20.0;
const DOCSTRING_MATCH: f32 = 5.0;

/// Pre-lowercased view of one item
struct KeywordEntry {
    item: Arc<Item>,
    fqn: String,
    docstring: String,
}

/// Dependency-free substring search; the fallback for every other strategy
#[derive(Default)]
pub struct KeywordSearchProvider {
    entries: Vec<KeywordEntry>,
}

impl KeywordSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one entry against already-lowercased keywords
    fn score(entry: &KeywordEntry, keywords: &[String]) -> f32 {
        keywords
            .iter()
            .map(|kw| {
                if entry.fqn.contains(kw.as_str()) {
                    let trailing = entry.fqn == *kw
                        || (entry.fqn.ends_with(kw.as_str())
                            && entry.fqn[..entry.fqn.len() - kw.len()].ends_with('.'));
                    if trailing {
                        FQN_MATCH + EXACT_NAME_BONUS
                    } else {
                        FQN_MATCH
                    }
                } else if entry.docstring.contains(kw.as_str()) {
                    DOCSTRING_MATCH
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Every matching item, unpaged and unsorted
    pub(crate) fn matches(&self, query: &str) -> Vec<SearchHit> {
        let keywords = tokenize(query);
        if keywords.is_empty() {
            return Vec::new();
        }

        self.entries
            .iter()
            .filter_map(|entry| {
                let score = Self::score(entry, &keywords);
                (score > 0.0).then(|| SearchHit::new(score, entry.item.clone()))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SearchProvider for KeywordSearchProvider {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn build_index(&mut self, items: &[Arc<Item>]) {
        self.entries = items
            .iter()
            .map(|item| KeywordEntry {
                item: item.clone(),
                fqn: item.id.to_lowercase(),
                docstring: item.docstring_text().to_lowercase(),
            })
            .collect();

        tracing::debug!("Keyword provider holds {} items", self.entries.len());
    }

    async fn ranked(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let hits = self.matches(query);
        tracing::debug!("Keyword search '{}' matched {} items", query, hits.len());
        Ok(rank(hits))
    }
}
