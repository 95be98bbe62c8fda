use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::extraction::EntityCategory;

/// A deduplicated entity: one canonical name standing for a group of raw
/// mentions, with every surface form kept as an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub canonical_name: String,
    pub category: EntityCategory,
    /// All surface forms seen for this entity, canonical name included.
    /// BTreeSet keeps report output deterministic.
    pub aliases: BTreeSet<String>,
    /// Highest confidence among the merged mentions
    pub confidence: f32,
    /// Up to five supporting quotes, best-confidence first
    pub evidence_quotes: Vec<String>,
    /// How many raw mentions merged into this entity
    pub mention_count: usize,
}

/// A relationship whose endpoints have been re-pointed to canonical names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    #[serde(default)]
    pub evidence_quote: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_serialize_sorted() {
        let mut aliases = BTreeSet::new();
        aliases.insert("United Nations".to_string());
        aliases.insert("UN".to_string());
        let entity = CanonicalEntity {
            canonical_name: "United Nations".to_string(),
            category: EntityCategory::Organization,
            aliases,
            confidence: 0.9,
            evidence_quotes: vec![],
            mention_count: 2,
        };

        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["aliases"], serde_json::json!(["UN", "United Nations"]));
    }
}
