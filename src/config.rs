/// Configuration system for knowledge-search
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, SearchError};
use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "KNOWLEDGE_SEARCH_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Knowledge index source
    #[serde(default)]
    pub index: IndexConfig,

    /// Provider selection and paging
    #[serde(default)]
    pub search: SearchConfig,

    /// Remote embedding service and vector index location
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Knowledge index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// YAML or JSON file listing the indexed symbols
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Strategy used when a caller does not name one
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Primary strategy of the hybrid cascade: "bm25" or "vector"
    #[serde(default = "default_hybrid_primary")]
    pub hybrid_primary: ProviderKind,

    /// Default page size
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Largest page size a caller may request
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key; when unset it is read from `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible embeddings API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Requested output dimensions (model default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    /// Timeout in seconds for a single embedding request
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Texts per request when building a vector index
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Directory holding `vectors.json` and `metadata.json`
    #[serde(default = "default_vector_index_dir")]
    pub vector_index_dir: PathBuf,
}

// Default value functions
fn default_index_path() -> PathBuf {
    crate::paths::PlatformPaths::default_index_path()
}

fn default_provider() -> ProviderKind {
    ProviderKind::Hybrid
}

fn default_hybrid_primary() -> ProviderKind {
    ProviderKind::Bm25
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    64
}

fn default_vector_index_dir() -> PathBuf {
    crate::paths::PlatformPaths::default_vector_index_dir()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            hybrid_primary: default_hybrid_primary(),
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            dimensions: None,
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
            vector_index_dir: default_vector_index_dir(),
        }
    }
}

impl EmbeddingConfig {
    /// API key from the config file, else from the configured environment variable
    ///
    /// A blank config value does not shadow the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    fn resolve_api_key_with<F: Fn(&str) -> Option<String>>(&self, lookup: F) -> Option<String> {
        let non_blank = |key: &str| {
            let key = key.trim();
            (!key.is_empty()).then(|| key.to_string())
        };

        self.api_key
            .as_deref()
            .and_then(non_blank)
            .or_else(|| lookup(&self.api_key_env).as_deref().and_then(non_blank))
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, SearchError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, SearchError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), SearchError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), SearchError> {
        if !matches!(
            self.search.hybrid_primary,
            ProviderKind::Bm25 | ProviderKind::Vector
        ) {
            return Err(ConfigError::InvalidValue {
                key: "search.hybrid_primary".to_string(),
                reason: format!(
                    "must be 'bm25' or 'vector', got '{}'",
                    self.search.hybrid_primary
                ),
            }
            .into());
        }

        if self.search.max_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.max_page_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.search.page_size == 0 || self.search.page_size > self.search.max_page_size {
            return Err(ConfigError::InvalidValue {
                key: "search.page_size".to_string(),
                reason: format!(
                    "must be between 1 and {}, got {}",
                    self.search.max_page_size, self.search.page_size
                ),
            }
            .into());
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.embedding.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "embedding.api_key_env".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok());
    }

    /// Apply overrides from an arbitrary key lookup (keys without prefix)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("PROVIDER") {
            match provider.parse() {
                Ok(kind) => self.search.provider = kind,
                Err(e) => tracing::warn!("Ignoring {}PROVIDER override: {}", ENV_PREFIX, e),
            }
        }

        if let Some(path) = lookup("INDEX_PATH") {
            self.index.path = PathBuf::from(path);
        }

        if let Some(dir) = lookup("VECTOR_INDEX_DIR") {
            self.embedding.vector_index_dir = PathBuf::from(dir);
        }

        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Some(url) = lookup("EMBEDDING_BASE_URL") {
            self.embedding.base_url = url;
        }

        if let Some(page_size) = lookup("PAGE_SIZE")
            && let Ok(size) = page_size.parse()
        {
            self.search.page_size = size;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, SearchError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.provider, ProviderKind::Hybrid);
        assert_eq!(config.search.hybrid_primary, ProviderKind::Bm25);
        assert_eq!(config.search.page_size, 10);
    }

    #[test]
    fn test_from_file_partial_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[index]
path = "/data/knowledge_index.json"

[search]
provider = "keyword"
page_size = 25
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.index.path, PathBuf::from("/data/knowledge_index.json"));
        assert_eq!(config.search.provider, ProviderKind::Keyword);
        assert_eq!(config.search.page_size, 25);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(
            result,
            Err(SearchError::Config(ConfigError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_from_file_unknown_provider() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search]\nprovider = \"fuzzy\"\n").unwrap();

        let result = Config::from_file(&path);
        assert!(matches!(
            result,
            Err(SearchError::Config(ConfigError::ParseFailed(_)))
        ));
    }

    #[test]
    fn test_validate_page_size() {
        let mut config = Config::default();
        config.search.page_size = 0;
        assert!(config.validate().is_err());

        config.search.page_size = config.search.max_page_size + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_hybrid_primary() {
        let mut config = Config::default();
        config.search.hybrid_primary = ProviderKind::Keyword;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search.hybrid_primary"));

        config.search.hybrid_primary = ProviderKind::Vector;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_embedding_values() {
        let mut config = Config::default();
        config.embedding.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.embedding.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let overrides: HashMap<&str, &str> = [
            ("PROVIDER", "bm25"),
            ("INDEX_PATH", "/tmp/index.yaml"),
            ("VECTOR_INDEX_DIR", "/tmp/vectors"),
            ("EMBEDDING_MODEL", "text-embedding-3-large"),
            ("PAGE_SIZE", "20"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| overrides.get(key).map(|v| v.to_string()));

        assert_eq!(config.search.provider, ProviderKind::Bm25);
        assert_eq!(config.index.path, PathBuf::from("/tmp/index.yaml"));
        assert_eq!(config.embedding.vector_index_dir, PathBuf::from("/tmp/vectors"));
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.search.page_size, 20);
    }

    #[test]
    fn test_apply_overrides_ignores_garbage() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "PROVIDER" => Some("nonsense".to_string()),
            "PAGE_SIZE" => Some("many".to_string()),
            _ => None,
        });
        assert_eq!(config.search.provider, ProviderKind::Hybrid);
        assert_eq!(config.search.page_size, 10);
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let config = EmbeddingConfig {
            api_key: Some("  sk-config  ".to_string()),
            api_key_env: "KNOWLEDGE_SEARCH_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-config"));

        let blank = EmbeddingConfig {
            api_key: Some(" ".to_string()),
            api_key_env: "KNOWLEDGE_SEARCH_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(blank.resolve_api_key(), None);
    }

    #[test]
    fn test_blank_config_key_falls_back_to_env() {
        let config = EmbeddingConfig {
            api_key: Some("   ".to_string()),
            api_key_env: "EMBED_KEY".to_string(),
            ..Default::default()
        };
        let env = |name: &str| (name == "EMBED_KEY").then(|| " sk-env\n".to_string());
        assert_eq!(config.resolve_api_key_with(env).as_deref(), Some("sk-env"));

        let blank_env = |_: &str| Some("  ".to_string());
        assert_eq!(config.resolve_api_key_with(blank_env), None);

        let configured = EmbeddingConfig {
            api_key: Some("sk-config".to_string()),
            ..config
        };
        assert_eq!(configured.resolve_api_key_with(env).as_deref(), Some("sk-config"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.search.provider = ProviderKind::Vector;
        config.embedding.dimensions = Some(512);
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.search.provider, ProviderKind::Vector);
        assert_eq!(loaded.embedding.dimensions, Some(512));
    }
}
