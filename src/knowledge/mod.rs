//! Knowledge index: the catalog of indexed symbols
//!
//! Loads symbol rows from a YAML or JSON source, normalizes them into
//! [`Item`]s and keeps an FQN map for exact and nested-member lookups.

pub mod aliases;

use crate::error::KnowledgeError;
use crate::types::{Item, SymbolRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of [`KnowledgeIndex::resolve_target`]
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// `item` is the longest indexed prefix; `member_path` is the stripped
    /// suffix (e.g. a method name) when the lookup was not exact
    Found {
        item: Arc<Item>,
        member_path: Option<String>,
    },
    NotFound,
}

impl Resolution {
    pub fn item(&self) -> Option<&Arc<Item>> {
        match self {
            Resolution::Found { item, .. } => Some(item),
            Resolution::NotFound => None,
        }
    }

    pub fn member_path(&self) -> Option<&str> {
        match self {
            Resolution::Found { member_path, .. } => member_path.as_deref(),
            Resolution::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

/// Either a bare list of rows or a document with an `items` list
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceDocument {
    List(Vec<SymbolRecord>),
    Wrapped { items: Vec<SymbolRecord> },
}

impl From<SourceDocument> for Vec<SymbolRecord> {
    fn from(doc: SourceDocument) -> Self {
        match doc {
            SourceDocument::List(records) => records,
            SourceDocument::Wrapped { items } => items,
        }
    }
}

/// Ordered, immutable symbol catalog
///
/// A loaded index is never patched; reloading builds a new instance that
/// replaces the old one wholesale.
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    items: Vec<Arc<Item>>,
    by_id: HashMap<String, Arc<Item>>,
    source: Option<PathBuf>,
}

impl KnowledgeIndex {
    /// An index with no symbols; every search against it is empty
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from canonical items, rejecting duplicate ids
    pub fn new(items: Vec<Item>) -> Result<Self, KnowledgeError> {
        let mut by_id = HashMap::with_capacity(items.len());
        let mut ordered = Vec::with_capacity(items.len());

        for item in items {
            let item = Arc::new(item);
            if by_id.insert(item.id.clone(), item.clone()).is_some() {
                return Err(KnowledgeError::DuplicateId(item.id.clone()));
            }
            ordered.push(item);
        }

        Ok(Self {
            items: ordered,
            by_id,
            source: None,
        })
    }

    /// Normalize raw rows; rows without any identifier are skipped
    pub fn from_records(records: Vec<SymbolRecord>) -> Result<Self, KnowledgeError> {
        let total = records.len();
        let items: Vec<Item> = records
            .into_iter()
            .filter_map(SymbolRecord::normalize)
            .collect();

        let skipped = total - items.len();
        if skipped > 0 {
            tracing::warn!("Skipped {} index rows without an id/fqn/name", skipped);
        }

        Self::new(items)
    }

    /// Load and normalize an index source file
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let records = load_records(path)?;
        let mut index = Self::from_records(records)?;
        index.source = Some(path.to_path_buf());

        tracing::info!(
            "Loaded knowledge index with {} symbols from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Item>> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// File this index was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Resolve a dotted name to the indexed symbol that contains it
    ///
    /// Tries an exact match first, then strips trailing components one at a
    /// time (`a.b.c.d` -> `a.b.c` -> `a.b` -> `a`) until a prefix is indexed.
    /// Trailing dots are ignored.
    pub fn resolve_target(&self, fqn: &str) -> Resolution {
        let fqn = fqn.trim().trim_end_matches('.');
        if fqn.is_empty() {
            return Resolution::NotFound;
        }

        if let Some(item) = self.by_id.get(fqn) {
            return Resolution::Found {
                item: item.clone(),
                member_path: None,
            };
        }

        let mut prefix = fqn;
        while let Some((head, _)) = prefix.rsplit_once('.') {
            prefix = head;
            if let Some(item) = self.by_id.get(prefix) {
                let member = &fqn[prefix.len() + 1..];
                return Resolution::Found {
                    item: item.clone(),
                    member_path: Some(member.to_string()),
                };
            }
        }

        Resolution::NotFound
    }
}

/// Read raw rows from a YAML or JSON source without normalizing them
pub fn load_records(path: &Path) -> Result<Vec<SymbolRecord>, KnowledgeError> {
    if !path.exists() {
        return Err(KnowledgeError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    parse_records(&content, SourceFormat::from_path(path)).map_err(|reason| {
        KnowledgeError::ParseFailed {
            path: path.display().to_string(),
            reason,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Yaml,
    Json,
    Unknown,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml" | "yml") => SourceFormat::Yaml,
            Some("json") => SourceFormat::Json,
            _ => SourceFormat::Unknown,
        }
    }
}

fn parse_records(content: &str, format: SourceFormat) -> Result<Vec<SymbolRecord>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: SourceDocument = match format {
        SourceFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string())?,
        SourceFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string())?,
        // JSON is a subset of YAML, but the JSON parser gives better errors
        SourceFormat::Unknown => match serde_json::from_str(content) {
            Ok(doc) => doc,
            Err(_) => serde_yaml::from_str(content).map_err(|e| e.to_string())?,
        },
    };

    Ok(document.into())
}
