//! Okapi BM25 ranking using Tantivy
//!
//! Each item becomes one document: its identifier three times followed by its
//! docstring, lower-cased and split on whitespace. Tantivy is an optional
//! dependency (`bm25` feature); without it the provider logs a warning on
//! `build_index` and answers every query with no results.

use super::{SearchProvider, rank, tokenize};
use crate::error::SearchError;
use crate::types::{Item, SearchHit};
use std::sync::Arc;

/// Times the identifier is repeated in its document, weighting names over prose
const IDENTIFIER_REPEAT: usize = 3;

/// Tokenized corpus plus the mapping from corpus position to item position
///
/// Items without an identifier are left out of the corpus, so positions in
/// the two lists diverge; `corpus_map[i]` is the item behind document `i`.
#[derive(Debug, Default, Clone)]
pub struct Bm25Corpus {
    pub documents: Vec<Vec<String>>,
    pub corpus_map: Vec<usize>,
}

impl Bm25Corpus {
    pub fn build(items: &[Arc<Item>]) -> Self {
        let mut corpus = Self::default();

        for (position, item) in items.iter().enumerate() {
            let identifier = item.id.trim();
            if identifier.is_empty() {
                continue;
            }

            let mut text = vec![identifier; IDENTIFIER_REPEAT].join(" ");
            text.push(' ');
            text.push_str(item.docstring_text());

            let tokens = tokenize(&text);
            if tokens.is_empty() {
                continue;
            }

            corpus.documents.push(tokens);
            corpus.corpus_map.push(position);
        }

        corpus
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// BM25 search provider
#[derive(Default)]
pub struct Bm25SearchProvider {
    #[cfg_attr(not(feature = "bm25"), allow(dead_code))]
    items: Vec<Arc<Item>>,
    #[cfg_attr(not(feature = "bm25"), allow(dead_code))]
    corpus_map: Vec<usize>,
    #[cfg(feature = "bm25")]
    engine: Option<engine::TantivyBm25>,
}

impl Bm25SearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the ranking backend was compiled in
    pub const fn backend_available() -> bool {
        cfg!(feature = "bm25")
    }

    /// Whether a usable index is currently held
    pub fn is_ready(&self) -> bool {
        #[cfg(feature = "bm25")]
        {
            self.engine.is_some()
        }
        #[cfg(not(feature = "bm25"))]
        {
            false
        }
    }

    /// Every positively scored item, unpaged and unsorted
    #[cfg(feature = "bm25")]
    fn matches(&self, query: &str) -> Vec<SearchHit> {
        let Some(engine) = &self.engine else {
            return Vec::new();
        };

        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let scored = match engine.score(&tokens) {
            Ok(scored) => scored,
            Err(e) => {
                tracing::warn!("BM25 query '{}' failed: {:#}", query, e);
                return Vec::new();
            }
        };

        scored
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .filter_map(|(doc, score)| {
                let position = *self.corpus_map.get(doc)?;
                Some(SearchHit::new(score, self.items.get(position)?.clone()))
            })
            .collect()
    }

    #[cfg(not(feature = "bm25"))]
    fn matches(&self, _query: &str) -> Vec<SearchHit> {
        Vec::new()
    }
}

#[async_trait::async_trait]
impl SearchProvider for Bm25SearchProvider {
    fn name(&self) -> &'static str {
        "bm25"
    }

    fn build_index(&mut self, items: &[Arc<Item>]) {
        let corpus = Bm25Corpus::build(items);
        self.items = items.to_vec();
        self.corpus_map = corpus.corpus_map.clone();

        #[cfg(feature = "bm25")]
        {
            self.engine = None;
            if corpus.is_empty() {
                tracing::debug!("BM25 corpus is empty, searches will return nothing");
                return;
            }

            match engine::TantivyBm25::build(&corpus.documents) {
                Ok(engine) => {
                    tracing::info!(
                        "Built BM25 index over {} of {} items",
                        corpus.len(),
                        items.len()
                    );
                    self.engine = Some(engine);
                }
                Err(e) => tracing::warn!("Failed to build BM25 index: {:#}", e),
            }
        }

        #[cfg(not(feature = "bm25"))]
        tracing::warn!(
            "BM25 ranking backend not compiled in (enable the `bm25` feature); \
             BM25 searches will return nothing"
        );
    }

    async fn ranked(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let hits = self.matches(query);
        tracing::debug!("BM25 search '{}' matched {} items", query, hits.len());
        Ok(rank(hits))
    }
}

#[cfg(feature = "bm25")]
mod engine {
    use anyhow::{Context, Result};
    use tantivy::collector::TopDocs;
    use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
    use tantivy::schema::{
        Field, INDEXED, IndexRecordOption, STORED, Schema, TextFieldIndexing, TextOptions, Value,
    };
    use tantivy::tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer};
    use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term, doc};

    const TOKENIZER_NAME: &str = "whitespace_lower";
    const WRITER_MEMORY_BYTES: usize = 50_000_000;

    /// In-memory Tantivy index scoring documents with Okapi BM25
    pub(super) struct TantivyBm25 {
        reader: IndexReader,
        position_field: Field,
        content_field: Field,
        num_docs: usize,
    }

    impl TantivyBm25 {
        /// Index pre-tokenized documents; document `i` is stored with position `i`
        pub(super) fn build(documents: &[Vec<String>]) -> Result<Self> {
            let mut schema_builder = Schema::builder();
            let position_field = schema_builder.add_u64_field("position", STORED | INDEXED);
            let content_options = TextOptions::default().set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(TOKENIZER_NAME)
                    .set_index_option(IndexRecordOption::WithFreqs),
            );
            let content_field = schema_builder.add_text_field("content", content_options);
            let schema = schema_builder.build();

            let index = Index::create_in_ram(schema);
            index.tokenizers().register(
                TOKENIZER_NAME,
                TextAnalyzer::builder(WhitespaceTokenizer::default())
                    .filter(LowerCaser)
                    .build(),
            );

            // A single indexing thread keeps every document in one segment
            let mut index_writer: IndexWriter<TantivyDocument> = index
                .writer_with_num_threads(1, WRITER_MEMORY_BYTES)
                .context("Failed to create index writer")?;

            for (position, tokens) in documents.iter().enumerate() {
                index_writer
                    .add_document(doc!(
                        position_field => position as u64,
                        content_field => tokens.join(" "),
                    ))
                    .context("Failed to add document")?;
            }

            index_writer
                .commit()
                .context("Failed to commit documents")?;

            let reader = index
                .reader_builder()
                .reload_policy(ReloadPolicy::Manual)
                .try_into()
                .context("Failed to create index reader")?;

            Ok(Self {
                reader,
                position_field,
                content_field,
                num_docs: documents.len(),
            })
        }

        /// BM25 score of every document matching at least one token
        pub(super) fn score(&self, tokens: &[String]) -> Result<Vec<(usize, f32)>> {
            if tokens.is_empty() || self.num_docs == 0 {
                return Ok(Vec::new());
            }

            let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
                .iter()
                .map(|token| {
                    let term = Term::from_field_text(self.content_field, token);
                    let query: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                    (Occur::Should, query)
                })
                .collect();
            let query = BooleanQuery::new(clauses);

            let searcher = self.reader.searcher();
            let top_docs = searcher
                .search(&query, &TopDocs::with_limit(self.num_docs))
                .context("Failed to execute search")?;

            let mut results = Vec::with_capacity(top_docs.len());
            for (score, doc_address) in top_docs {
                let retrieved: TantivyDocument = searcher
                    .doc(doc_address)
                    .context("Failed to retrieve document")?;

                if let Some(position) = retrieved
                    .get_first(self.position_field)
                    .and_then(|value| value.as_u64())
                {
                    results.push((position as usize, score));
                }
            }

            Ok(results)
        }
    }
}
