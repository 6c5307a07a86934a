//! Relationship candidate matching.
//!
//! Scans scoped column occurrences and proposes relationship candidates
//! between table pairs that share a column name (or a declared alias),
//! filtered by column classification and scored into confidence tiers.

mod filter;

pub use filter::TableFilter;

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::{ClassificationIndex, ColumnOccurrence, Scope};
use crate::error::SchemaGraphError;

/// Both endpoints key-like (PK/FK/IDENTIFIER).
pub const CONFIDENCE_FK_SEMANTIC: f64 = 0.95;
/// Endpoints share the same non-excluded classification.
pub const CONFIDENCE_SEMANTIC_MATCH: f64 = 0.75;
/// Name collision only.
pub const CONFIDENCE_NAME_MATCH: f64 = 0.6;

/// Policy controlling which name-similarity signals qualify a column pair.
///
/// `Alias` mode deliberately ignores plain name equality: only pairs the
/// alias map links are accepted, even when the names are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingMode {
    Exact,
    Alias,
    Combined,
}

impl FromStr for MatchingMode {
    type Err = SchemaGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(MatchingMode::Exact),
            "alias" => Ok(MatchingMode::Alias),
            "combined" => Ok(MatchingMode::Combined),
            other => Err(SchemaGraphError::InvalidInput(format!(
                "unknown matching mode: {other} (expected exact, alias or combined)"
            ))),
        }
    }
}

/// How a candidate was qualified, in decreasing order of confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    FkSemantic,
    SemanticMatch,
    NameMatch,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::FkSemantic => "fk_semantic",
            RelationshipType::SemanticMatch => "semantic_match",
            RelationshipType::NameMatch => "name_match",
        }
    }
}

impl FromStr for RelationshipType {
    type Err = SchemaGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fk_semantic" => Ok(RelationshipType::FkSemantic),
            "semantic_match" => Ok(RelationshipType::SemanticMatch),
            "name_match" => Ok(RelationshipType::NameMatch),
            other => Err(SchemaGraphError::InvalidInput(format!(
                "unknown relationship type: {other}"
            ))),
        }
    }
}

/// Symmetric column-name alias declarations.
///
/// `is_alias(a, b)` holds when either side's alias list names the other.
/// Lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    aliases: HashMap<String, Vec<String>>,
}

impl AliasMap {
    pub fn new(aliases: HashMap<String, Vec<String>>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(name, list)| {
                (
                    name.to_lowercase(),
                    list.into_iter().map(|a| a.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { aliases }
    }

    pub fn is_alias(&self, a: &str, b: &str) -> bool {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        self.declares(&a, &b) || self.declares(&b, &a)
    }

    fn declares(&self, name: &str, alias: &str) -> bool {
        self.aliases
            .get(name)
            .map(|list| list.iter().any(|candidate| candidate == alias))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// An inferred, not-yet-persisted relationship between two tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipCandidate {
    pub source_table_id: i64,
    pub target_table_id: i64,
    pub source_column_id: i64,
    pub target_column_id: i64,
    pub column_name: String,
    pub relationship_type: RelationshipType,
    pub confidence_score: f64,
    pub description: String,
    pub schema_name: String,
    pub database_name: String,
    pub server_name: String,
    pub source_tag: String,
}

/// Propose relationship candidates for one scope.
///
/// Pure function of its inputs: groups occurrences by column name, applies
/// the allow-list and matching-mode gates over every ordered pair within a
/// group, drops pairs with a Timestamp/Attribute endpoint, and assigns a
/// confidence tier. Each matched table pair yields two mirrored candidates
/// (source and target swapped); persistence and the directed graph both key
/// on the ordered pair.
pub fn match_candidates(
    scope: &Scope,
    occurrences: &[ColumnOccurrence],
    classifications: &ClassificationIndex,
    filter: &TableFilter,
    aliases: &AliasMap,
    mode: MatchingMode,
) -> Vec<RelationshipCandidate> {
    // BTreeMap keeps group iteration deterministic across runs.
    let mut groups: BTreeMap<&str, Vec<&ColumnOccurrence>> = BTreeMap::new();
    for occurrence in occurrences {
        groups
            .entry(occurrence.column_name.as_str())
            .or_default()
            .push(occurrence);
    }

    let source_tag = format!("column_match:{}", mode_tag(mode));
    let mut candidates = Vec::new();

    for (column_name, group) in groups {
        if group.len() <= 1 {
            continue;
        }

        let allowed: Vec<&ColumnOccurrence> = group
            .into_iter()
            .filter(|occ| filter.allows(&occ.schema_name, &occ.table_name))
            .collect();
        if allowed.len() <= 1 {
            continue;
        }

        for (i, source) in allowed.iter().enumerate() {
            for (j, target) in allowed.iter().enumerate() {
                if i == j || source.table_id == target.table_id {
                    continue;
                }
                if !pair_matches(source, target, aliases, mode) {
                    continue;
                }

                let source_class = classifications.get(source.column_id);
                let target_class = classifications.get(target.column_id);
                if source_class.map(|c| c.is_excluded()).unwrap_or(false)
                    || target_class.map(|c| c.is_excluded()).unwrap_or(false)
                {
                    continue;
                }

                let (confidence_score, relationship_type) =
                    score_pair(source_class, target_class);

                candidates.push(RelationshipCandidate {
                    source_table_id: source.table_id,
                    target_table_id: target.table_id,
                    source_column_id: source.column_id,
                    target_column_id: target.column_id,
                    column_name: column_name.to_string(),
                    relationship_type,
                    confidence_score,
                    description: format!(
                        "Tables {} and {} share column {}",
                        source.table_name, target.table_name, column_name
                    ),
                    schema_name: scope.schema_name.clone(),
                    database_name: scope.database_name.clone(),
                    server_name: scope.server_name.clone(),
                    source_tag: source_tag.clone(),
                });
            }
        }
    }

    candidates
}

fn mode_tag(mode: MatchingMode) -> &'static str {
    match mode {
        MatchingMode::Exact => "exact",
        MatchingMode::Alias => "alias",
        MatchingMode::Combined => "combined",
    }
}

fn pair_matches(
    source: &ColumnOccurrence,
    target: &ColumnOccurrence,
    aliases: &AliasMap,
    mode: MatchingMode,
) -> bool {
    // Grouping is by column name, so the exact predicate holds by
    // construction; alias mode still requires an explicit declaration.
    let exact = source.column_name == target.column_name;
    match mode {
        MatchingMode::Exact => exact,
        MatchingMode::Alias => aliases.is_alias(&source.column_name, &target.column_name),
        MatchingMode::Combined => {
            exact || aliases.is_alias(&source.column_name, &target.column_name)
        }
    }
}

/// Confidence tiers, checked in priority order; first match wins.
fn score_pair(
    source: Option<&crate::catalog::Classification>,
    target: Option<&crate::catalog::Classification>,
) -> (f64, RelationshipType) {
    if let (Some(s), Some(t)) = (source, target) {
        if s.is_key_like() && t.is_key_like() {
            return (CONFIDENCE_FK_SEMANTIC, RelationshipType::FkSemantic);
        }
        if s == t {
            return (CONFIDENCE_SEMANTIC_MATCH, RelationshipType::SemanticMatch);
        }
    }
    (CONFIDENCE_NAME_MATCH, RelationshipType::NameMatch)
}
