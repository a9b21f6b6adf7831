//! Embedding similarity search over a precomputed vector table
//!
//! The table lives in two sibling files inside the index directory:
//! `vectors.json` (row `i` is the embedding of metadata entry `i`) and
//! `metadata.json` (symbol rows with at least `id` and `rank`). Queries are
//! embedded remotely, once per search call, then compared by cosine
//! similarity against every row.

use super::{SearchProvider, rank};
use crate::config::EmbeddingConfig;
use crate::embedding::{EmbeddingProvider, RemoteEmbeddingClient};
use crate::error::{EmbeddingError, KnowledgeError, SearchError};
use crate::types::{Item, SearchHit, SymbolRecord};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const VECTORS_FILE: &str = "vectors.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Loaded embedding matrix with the item behind every row
struct VectorTable {
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    items: Vec<Arc<Item>>,
    dimension: usize,
}

impl VectorTable {
    fn similarities(&self, query: &[f32]) -> Vec<SearchHit> {
        let query_norm = norm(query);

        self.vectors
            .par_iter()
            .zip(self.norms.par_iter())
            .zip(self.items.par_iter())
            .map(|((row, row_norm), item)| {
                SearchHit::new(cosine(query, query_norm, row, *row_norm), item.clone())
            })
            .collect()
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with precomputed norms; zero vectors score 0
fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

/// Vector search provider
pub struct VectorSearchProvider {
    index_dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    table: Option<VectorTable>,
    timeout: Duration,
    cancel_token: CancellationToken,
}

impl VectorSearchProvider {
    /// Create a provider backed by the remote embedding service
    ///
    /// Fails immediately with [`EmbeddingError::MissingApiKey`] when no key
    /// is configured.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = RemoteEmbeddingClient::from_config(config)?;
        Ok(Self::with_embedder(
            &config.vector_index_dir,
            Arc::new(client),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    /// Create a provider with an explicit embedder
    pub fn with_embedder(
        index_dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            index_dir: index_dir.to_path_buf(),
            embedder,
            table: None,
            timeout,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Number of loaded vectors
    pub fn len(&self) -> usize {
        self.table.as_ref().map_or(0, |t| t.vectors.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token that aborts in-flight and future embedding requests of this provider
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn load_table(&self, items: &[Arc<Item>]) -> Result<Option<VectorTable>> {
        let vectors_path = self.index_dir.join(VECTORS_FILE);
        let metadata_path = self.index_dir.join(METADATA_FILE);

        if !vectors_path.exists() || !metadata_path.exists() {
            return Ok(None);
        }

        let vectors: Vec<Vec<f32>> = read_json(&vectors_path)?;
        let metadata: Vec<SymbolRecord> = read_json(&metadata_path)?;

        if vectors.len() != metadata.len() {
            bail!(
                "{} has {} rows but {} has {} entries",
                VECTORS_FILE,
                vectors.len(),
                METADATA_FILE,
                metadata.len()
            );
        }

        let Some(dimension) = vectors.first().map(Vec::len) else {
            return Ok(None);
        };
        if let Some(bad) = vectors.iter().position(|row| row.len() != dimension) {
            bail!(
                "row {} has {} dimensions, expected {}",
                bad,
                vectors[bad].len(),
                dimension
            );
        }

        let known: HashMap<&str, &Arc<Item>> =
            items.iter().map(|item| (item.id.as_str(), item)).collect();

        let mut table = VectorTable {
            vectors: Vec::with_capacity(vectors.len()),
            norms: Vec::with_capacity(vectors.len()),
            items: Vec::with_capacity(vectors.len()),
            dimension,
        };

        for (row, record) in vectors.into_iter().zip(metadata) {
            let known_item = record
                .identifier()
                .and_then(|id| known.get(id))
                .map(|item| Arc::clone(item));
            let item = match known_item {
                Some(item) => item,
                None => match record.normalize() {
                    Some(item) => Arc::new(item),
                    None => {
                        tracing::warn!("Skipping vector row without an identifier");
                        continue;
                    }
                },
            };
            table.norms.push(norm(&row));
            table.vectors.push(row);
            table.items.push(item);
        }

        Ok(Some(table))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(EmbeddingError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.embedder.embed(query)) => {
                result.map_err(|_| EmbeddingError::Timeout(self.timeout.as_secs()))?
            }
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[async_trait::async_trait]
impl SearchProvider for VectorSearchProvider {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn build_index(&mut self, items: &[Arc<Item>]) {
        self.table = match self.load_table(items) {
            Ok(Some(table)) => {
                tracing::info!(
                    "Loaded {} vectors ({} dimensions) from {}",
                    table.vectors.len(),
                    table.dimension,
                    self.index_dir.display()
                );
                Some(table)
            }
            Ok(None) => {
                tracing::warn!(
                    "No vector index in {}, vector searches will return nothing",
                    self.index_dir.display()
                );
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unusable vector index: {:#}", e);
                None
            }
        };
    }

    async fn ranked(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let Some(table) = &self.table else {
            return Ok(Vec::new());
        };
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embed_query(query).await?;
        if embedding.len() != table.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: table.dimension,
                actual: embedding.len(),
            }
            .into());
        }

        let hits = table.similarities(&embedding);
        tracing::debug!("Vector search '{}' scored {} rows", query, hits.len());
        Ok(rank(hits))
    }
}

/// Write `vectors.json` and `metadata.json` for `items` into `dir`
pub fn write_vector_index(
    dir: &Path,
    items: &[Arc<Item>],
    vectors: &[Vec<f32>],
) -> Result<(), KnowledgeError> {
    let write_failed = |reason: String| KnowledgeError::WriteFailed {
        path: dir.display().to_string(),
        reason,
    };

    if items.len() != vectors.len() {
        return Err(write_failed(format!(
            "{} items but {} vectors",
            items.len(),
            vectors.len()
        )));
    }

    std::fs::create_dir_all(dir).map_err(|e| write_failed(e.to_string()))?;

    let metadata: Vec<SymbolRecord> = items
        .iter()
        .map(|item| SymbolRecord::from(item.as_ref()))
        .collect();
    let metadata_json =
        serde_json::to_string_pretty(&metadata).map_err(|e| write_failed(e.to_string()))?;
    let vectors_json = serde_json::to_string(vectors).map_err(|e| write_failed(e.to_string()))?;

    std::fs::write(dir.join(METADATA_FILE), metadata_json)
        .map_err(|e| write_failed(e.to_string()))?;
    std::fs::write(dir.join(VECTORS_FILE), vectors_json)
        .map_err(|e| write_failed(e.to_string()))?;

    tracing::info!("Wrote {} vectors to {}", vectors.len(), dir.display());
    Ok(())
}

/// Text embedded for an item when building the vector table
pub fn embedding_text(item: &Item) -> String {
    match item.docstring.as_deref() {
        Some(doc) => format!("{}\n{}", item.id, doc),
        None => item.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Embeds by looking the text up in a fixed table; unknown text is an error
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Arc<Self> {
            Arc::new(Self {
                table: entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::RequestFailed(format!("unknown text {text}")))
        }

        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(&text).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "table"
        }
    }

    /// Never answers
    struct StalledEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            std::future::pending().await
        }

        async fn embed_batch(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            std::future::pending().await
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    fn items() -> Vec<Arc<Item>> {
        vec![
            Arc::new(Item::new("pkg.north", 2).with_docstring("points up")),
            Arc::new(Item::new("pkg.east", 1)),
            Arc::new(Item::new("pkg.northeast", 0)),
        ]
    }

    fn write_fixture(dir: &Path) {
        write_vector_index(
            dir,
            &items(),
            &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        )
        .unwrap();
    }

    fn provider(dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> VectorSearchProvider {
        let mut provider =
            VectorSearchProvider::with_embedder(dir, embedder, Duration::from_secs(5));
        provider.build_index(&items());
        provider
    }

    #[tokio::test]
    async fn test_cosine_ranking() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let embedder = TableEmbedder::new(&[("up", vec![0.0, 2.0])]);
        let provider = provider(dir.path(), embedder.clone());
        assert_eq!(provider.len(), 3);

        let hits = provider.search("up", 1, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.item.id.as_str()).collect();
        assert_eq!(ids, vec!["pkg.north", "pkg.northeast", "pkg.east"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(hits[2].score, 0.0);

        // Metadata rows resolve to the built items
        assert_eq!(hits[0].item.docstring.as_deref(), Some("points up"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_each_search_embeds_once() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let embedder = TableEmbedder::new(&[("up", vec![0.0, 1.0])]);
        let provider = provider(dir.path(), embedder.clone());

        provider.search("up", 1, 1).await.unwrap();
        provider.search("up", 2, 1).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ties_break_on_rank() {
        let dir = TempDir::new().unwrap();
        write_vector_index(
            dir.path(),
            &items(),
            &[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .unwrap();
        let provider = provider(dir.path(), TableEmbedder::new(&[("q", vec![1.0, 0.0])]));

        let hits = provider.search("q", 1, 10).await.unwrap();
        let ranks: Vec<i64> = hits.iter().map(|h| h.item.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_missing_files_no_crash_no_network() {
        let dir = TempDir::new().unwrap();
        let embedder = TableEmbedder::new(&[]);
        let provider = provider(dir.path(), embedder.clone());

        assert!(provider.is_empty());
        assert!(provider.search("anything", 1, 10).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_or_mismatched_files() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        std::fs::write(dir.path().join(VECTORS_FILE), "[[1.0, 0.0]]").unwrap();
        let provider = provider(dir.path(), TableEmbedder::new(&[]));
        assert!(provider.is_empty());

        std::fs::write(dir.path().join(VECTORS_FILE), "not json").unwrap();
        let provider = provider_from(dir.path());
        assert!(provider.is_empty());

        std::fs::write(
            dir.path().join(VECTORS_FILE),
            "[[1.0, 0.0], [1.0], [0.0, 1.0]]",
        )
        .unwrap();
        let provider = provider_from(dir.path());
        assert!(provider.is_empty());
    }

    fn provider_from(dir: &Path) -> VectorSearchProvider {
        provider(dir, TableEmbedder::new(&[]))
    }

    #[test]
    fn test_load_error_keeps_file_context() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        std::fs::write(dir.path().join(VECTORS_FILE), "not json").unwrap();
        let provider = VectorSearchProvider::with_embedder(
            dir.path(),
            TableEmbedder::new(&[]),
            Duration::from_secs(5),
        );

        let message = format!("{:#}", provider.load_table(&items()).err().unwrap());
        assert!(message.starts_with("Failed to parse"), "{message}");
        assert!(message.contains(VECTORS_FILE), "{message}");
        // The serde_json cause stays in the chain
        assert!(message.contains(": expected"), "{message}");
    }

    #[tokio::test]
    async fn test_hybrid_deep_page_embeds_once() {
        use crate::search::{HybridSearchProvider, KeywordSearchProvider};

        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let embedder = TableEmbedder::new(&[("up", vec![0.0, 1.0])]);
        let vector = VectorSearchProvider::with_embedder(
            dir.path(),
            embedder.clone(),
            Duration::from_secs(5),
        );
        let mut hybrid =
            HybridSearchProvider::new(Box::new(vector), Box::new(KeywordSearchProvider::new()));
        hybrid.build_index(&items());

        assert!(hybrid.search("up", 5, 10).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        assert_eq!(hybrid.search("up", 2, 2).await.unwrap().len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_query_skips_embedding() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let embedder = TableEmbedder::new(&[]);
        let provider = provider(dir.path(), embedder.clone());

        assert!(provider.search("  ", 1, 10).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let provider = provider(dir.path(), TableEmbedder::new(&[]));

        let err = provider.search("unknown", 1, 10).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Embedding(EmbeddingError::RequestFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let provider = provider(dir.path(), TableEmbedder::new(&[("q", vec![1.0, 0.0, 0.0])]));

        let err = provider.search("q", 1, 10).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Embedding(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let mut provider = VectorSearchProvider::with_embedder(
            dir.path(),
            Arc::new(StalledEmbedder),
            Duration::from_secs(2),
        );
        provider.build_index(&items());

        let err = provider.search("q", 1, 10).await.unwrap_err();
        assert!(matches!(err, SearchError::Embedding(EmbeddingError::Timeout(2))));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let provider = provider(dir.path(), Arc::new(StalledEmbedder));
        provider.cancellation_token().cancel();

        let err = provider.search("q", 1, 10).await.unwrap_err();
        assert!(matches!(err, SearchError::Embedding(EmbeddingError::Cancelled)));
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = EmbeddingConfig {
            api_key: None,
            api_key_env: "KNOWLEDGE_SEARCH_TEST_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            VectorSearchProvider::new(&config),
            Err(EmbeddingError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_write_vector_index_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let result = write_vector_index(dir.path(), &items(), &[vec![1.0]]);
        assert!(matches!(result, Err(KnowledgeError::WriteFailed { .. })));
    }

    #[test]
    fn test_embedding_text() {
        assert_eq!(embedding_text(&Item::new("a.B", 0)), "a.B");
        assert_eq!(
            embedding_text(&Item::new("a.B", 0).with_docstring("Doc")),
            "a.B\nDoc"
        );
    }
}
