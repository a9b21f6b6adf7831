/// Centralized error types for knowledge-search using thiserror
///
/// Only a few conditions are surfaced as errors at all: most degradations
/// (missing ranking backend, absent vector files, unknown symbols) are
/// recovered locally and logged instead.
use thiserror::Error;

/// Main error type for the search system
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Knowledge index error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to the remote embedding service
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding API key is not set (expected in ${0} or embedding.api_key)")]
    MissingApiKey(String),

    #[error("Failed to initialize embedding client: {0}")]
    InitializationFailed(String),

    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Embedding API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Embedding API returned no vectors")]
    EmptyResponse,

    #[error("Embedding request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Embedding request was cancelled")]
    Cancelled,

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to loading the knowledge index
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Index file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read index '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Failed to parse index '{path}': {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Duplicate symbol id: {0}")]
    DuplicateId(String),

    #[error("Failed to write vector index to '{path}': {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{field} must be {constraint}, got {actual}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        actual: String,
    },

    #[error("Unknown search provider: {0}")]
    UnknownProvider(String),
}

// Conversion from anyhow::Error to SearchError
impl From<anyhow::Error> for SearchError {
    fn from(err: anyhow::Error) -> Self {
        SearchError::Other(format!("{:#}", err))
    }
}

impl SearchError {
    /// Check if this is a user error (bad input or config) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SearchError::Validation(_)
                | SearchError::Config(ConfigError::InvalidValue { .. })
                | SearchError::Embedding(EmbeddingError::MissingApiKey(_))
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Embedding(
                EmbeddingError::RequestFailed(_) | EmbeddingError::Timeout(_)
            ) | SearchError::Io(_)
        )
    }
}
