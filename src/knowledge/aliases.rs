//! Offline alias integrity checks
//!
//! Aliases are alternative FQNs under which a symbol must be reachable as the
//! very same object. That is a property of the index data, checked here as a
//! separate pass over raw rows (CI / authoring time) and never consulted by
//! search or resolution.

use crate::types::SymbolRecord;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A single alias integrity violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasIssue {
    /// Alias repeats the symbol's own id
    SelfAlias { id: String },
    /// Alias is the id of a different indexed symbol, so it names another object
    ShadowsSymbol { id: String, alias: String },
    /// The same alias is declared by several symbols
    Ambiguous { alias: String, owners: Vec<String> },
    /// Alias is not a well-formed dotted name
    Malformed { id: String, alias: String },
}

impl fmt::Display for AliasIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasIssue::SelfAlias { id } => write!(f, "{id}: alias repeats its own id"),
            AliasIssue::ShadowsSymbol { id, alias } => {
                write!(f, "{id}: alias '{alias}' is the id of another symbol")
            }
            AliasIssue::Ambiguous { alias, owners } => write!(
                f,
                "alias '{alias}' is declared by {} symbols: {}",
                owners.len(),
                owners.join(", ")
            ),
            AliasIssue::Malformed { id, alias } => {
                write!(f, "{id}: malformed alias '{alias}'")
            }
        }
    }
}

fn is_well_formed(alias: &str) -> bool {
    !alias.is_empty()
        && alias
            .split('.')
            .all(|segment| !segment.is_empty() && !segment.chars().any(char::is_whitespace))
}

/// Check every declared alias; an empty result means the data is consistent
///
/// Issues are reported in source order, with ambiguity reports (which span
/// several rows) last and sorted by alias.
pub fn validate_aliases(records: &[SymbolRecord]) -> Vec<AliasIssue> {
    let ids: HashSet<&str> = records.iter().filter_map(|r| r.identifier()).collect();
    let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut issues = Vec::new();

    for record in records {
        let Some(id) = record.identifier() else {
            if !record.aliases.is_empty() {
                tracing::debug!("Skipping aliases of a row without identifier");
            }
            continue;
        };

        for alias in &record.aliases {
            let alias = alias.trim();
            if !is_well_formed(alias) {
                issues.push(AliasIssue::Malformed {
                    id: id.to_string(),
                    alias: alias.to_string(),
                });
                continue;
            }

            if alias == id {
                issues.push(AliasIssue::SelfAlias { id: id.to_string() });
                continue;
            }

            if ids.contains(alias) {
                issues.push(AliasIssue::ShadowsSymbol {
                    id: id.to_string(),
                    alias: alias.to_string(),
                });
            }

            let entry = owners.entry(alias).or_default();
            if !entry.contains(&id) {
                entry.push(id);
            }
        }
    }

    issues.extend(
        owners
            .into_iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(alias, owners)| AliasIssue::Ambiguous {
                alias: alias.to_string(),
                owners: owners.into_iter().map(str::to_string).collect(),
            }),
    );

    issues
}
