use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ValidationError;

/// Rank given to symbols whose source row carries none; sorts after every ranked symbol
pub const UNRANKED: i64 = i64::MAX;

/// Kind of an indexed symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Module,
    Attribute,
    Constant,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Module => "module",
            SymbolKind::Attribute => "attribute",
            SymbolKind::Constant => "constant",
            SymbolKind::Unknown => "unknown",
        }
    }

    /// Lenient parse used when normalizing source rows; never fails
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "class" | "type" | "dataclass" | "enum" => SymbolKind::Class,
            "function" | "func" | "fn" => SymbolKind::Function,
            "method" | "classmethod" | "staticmethod" => SymbolKind::Method,
            "module" | "package" => SymbolKind::Module,
            "attribute" | "property" | "field" => SymbolKind::Attribute,
            "constant" | "const" | "variable" => SymbolKind::Constant,
            _ => SymbolKind::Unknown,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One indexed symbol in canonical form
///
/// Every heterogeneous source schema is mapped onto this record once, at load
/// time (see [`SymbolRecord::normalize`]); search providers only ever see `Item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Fully-qualified name, unique across the index
    pub id: String,
    /// Short display name
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Curated priority, lower is more important
    pub rank: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, rank: i64) -> Self {
        let id = id.into();
        let name = last_component(&id).to_string();
        Self {
            id,
            name,
            kind: SymbolKind::Unknown,
            docstring: None,
            rank,
            file_path: None,
        }
    }

    pub fn with_kind(mut self, kind: SymbolKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// Docstring or the empty string
    pub fn docstring_text(&self) -> &str {
        self.docstring.as_deref().unwrap_or("")
    }

    /// First non-blank docstring line, for listings
    pub fn summary(&self) -> Option<&str> {
        self.docstring
            .as_deref()
            .and_then(|doc| doc.lines().map(str::trim).find(|line| !line.is_empty()))
    }
}

/// Raw row of an index source file, before normalization
///
/// Sources disagree on where the identifier lives, so `id`, `fqn` and `name`
/// are all accepted; the first non-empty one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl SymbolRecord {
    /// Resolved identifier: `id`, then `fqn`, then `name`
    pub fn identifier(&self) -> Option<&str> {
        [&self.id, &self.fqn, &self.name]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// Map onto the canonical [`Item`]; `None` when the row has no identifier
    pub fn normalize(self) -> Option<Item> {
        let id = self.identifier()?.to_string();
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(last_component)
            .unwrap_or_else(|| last_component(&id))
            .to_string();

        Some(Item {
            name,
            kind: self
                .kind
                .as_deref()
                .map(SymbolKind::parse_lenient)
                .unwrap_or_default(),
            docstring: self.docstring.filter(|doc| !doc.trim().is_empty()),
            rank: self.rank.unwrap_or(UNRANKED),
            file_path: self.file_path.filter(|path| !path.trim().is_empty()),
            id,
        })
    }
}

impl From<&Item> for SymbolRecord {
    fn from(item: &Item) -> Self {
        Self {
            id: Some(item.id.clone()),
            fqn: None,
            name: Some(item.name.clone()),
            kind: Some(item.kind.as_str().to_string()),
            docstring: item.docstring.clone(),
            rank: Some(item.rank),
            file_path: item.file_path.clone(),
            aliases: Vec::new(),
        }
    }
}

/// A scored search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub item: Arc<Item>,
}

impl SearchHit {
    pub fn new(score: f32, item: Arc<Item>) -> Self {
        Self { score, item }
    }
}

/// Search strategy named by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Keyword,
    Bm25,
    Vector,
    Hybrid,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Keyword,
        ProviderKind::Bm25,
        ProviderKind::Vector,
        ProviderKind::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Keyword => "keyword",
            ProviderKind::Bm25 => "bm25",
            ProviderKind::Vector => "vector",
            ProviderKind::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownProvider(s.to_string()))
    }
}

/// Last dotted component of a fully-qualified name
pub fn last_component(fqn: &str) -> &str {
    fqn.rsplit('.').next().unwrap_or(fqn)
}
