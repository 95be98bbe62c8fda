use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use crate::models::{CanonicalEntity, EntityCategory, RawEntity, RawRelationship, Relationship};

/// Disjoint-set forest with path halving. Merge closure is strictly
/// transitive: once two members share a root they stay together, whether or
/// not every pair inside the group matches directly.
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            // later root attaches under the earlier one, so a group's root is
            // always its first-seen member
            if root_a < root_b {
                self.parent[root_b] = root_a;
            } else {
                self.parent[root_a] = root_b;
            }
        }
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

/// Configuration for entity deduplication
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Minimum string similarity for two names to merge
    pub similarity_threshold: f64,
    /// Raw mentions below this confidence are discarded before matching
    pub confidence_floor: f32,
    /// Evidence quotes kept per canonical entity
    pub max_evidence_quotes: usize,
    /// Prefix tokens stripped from person names before comparison
    pub honorifics: Vec<String>,
    /// Known short form -> long form expansions, both lowercase
    pub alias_table: HashMap<String, String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let honorifics = [
            "mr", "mrs", "ms", "miss", "dr", "prof", "professor", "sen", "senator", "rep",
            "representative", "gov", "governor", "pres", "president", "sec", "secretary", "gen",
            "general", "adm", "admiral", "capt", "captain", "col", "colonel", "lt", "lieutenant",
            "maj", "major", "sgt", "sergeant", "judge", "justice", "chief", "sir", "dame", "lord",
            "lady", "amb", "ambassador", "rev", "reverend", "chancellor", "minister", "mayor",
            "deputy", "vice",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let alias_table = [
            ("un", "united nations"),
            ("u.n.", "united nations"),
            ("us", "united states"),
            ("u.s.", "united states"),
            ("usa", "united states"),
            ("uk", "united kingdom"),
            ("u.k.", "united kingdom"),
            ("eu", "european union"),
            ("nato", "north atlantic treaty organization"),
            ("who", "world health organization"),
            ("imf", "international monetary fund"),
            ("wto", "world trade organization"),
            ("fbi", "federal bureau of investigation"),
            ("cia", "central intelligence agency"),
            ("doj", "department of justice"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            similarity_threshold: 0.82,
            confidence_floor: 0.0,
            max_evidence_quotes: 5,
            honorifics,
            alias_table,
        }
    }
}

/// Result of entity deduplication and relationship re-pointing
#[derive(Debug)]
pub struct NormalizeResult {
    pub entities: Vec<CanonicalEntity>,
    pub relationships: Vec<Relationship>,
    /// Raw mentions absorbed into another entity
    pub merges_performed: usize,
    pub low_confidence_dropped: usize,
    /// Identical (subject, predicate, object) triples collapsed
    pub duplicate_relationships_merged: usize,
    /// Relationships whose endpoints matched no known entity name
    pub unresolved_relationships_dropped: usize,
    /// (entity, predicate) pairs whose endpoints collapsed into one entity
    pub self_relationships_dropped: Vec<(String, String)>,
}

/// Deduplicate raw entity mentions and re-point relationships onto the
/// surviving canonical names.
///
/// Matching runs on comparison keys (lowercased, honorific-stripped,
/// alias-expanded); two mentions merge when their categories are compatible
/// and their keys are equal, one key's tokens appear as a contiguous run in
/// the other's ("Smith" inside "John Smith"), or string similarity reaches
/// the threshold. Groups are the transitive closure of those pairs.
pub fn normalize_entities(
    entities: Vec<RawEntity>,
    relationships: Vec<RawRelationship>,
    config: &NormalizerConfig,
) -> NormalizeResult {
    let raw_count = entities.len();
    let entities: Vec<RawEntity> = entities
        .into_iter()
        .filter(|e| e.confidence >= config.confidence_floor)
        .collect();
    let low_confidence_dropped = raw_count - entities.len();

    let keys: Vec<EntityKey> = entities
        .iter()
        .map(|e| EntityKey::build(&e.name, e.category, config))
        .collect();

    let mut sets = UnionFind::new(entities.len());
    for i in 0..entities.len() {
        for j in (i + 1)..entities.len() {
            if mergeable(&keys[i], &keys[j], config.similarity_threshold) {
                sets.union(i, j);
            }
        }
    }

    // groups in first-occurrence order; union() keeps the first member as root
    let mut group_order: Vec<usize> = Vec::new();
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..entities.len() {
        let root = sets.find(i);
        groups
            .entry(root)
            .or_insert_with(|| {
                group_order.push(root);
                Vec::new()
            })
            .push(i);
    }

    let mut canonical_entities = Vec::new();
    let mut name_to_canonical: HashMap<String, String> = HashMap::new();
    let mut merges_performed = 0;

    for root in group_order {
        let members = &groups[&root];
        merges_performed += members.len().saturating_sub(1);
        let Some(rep) = pick_representative(&entities, members) else {
            continue;
        };

        let mut aliases = BTreeSet::new();
        let mut confidence = 0.0f32;
        let mut quotes: Vec<(f32, usize, &str)> = Vec::new();
        for &m in members {
            aliases.insert(entities[m].name.clone());
            confidence = confidence.max(entities[m].confidence);
            if let Some(quote) = &entities[m].evidence_quote {
                quotes.push((entities[m].confidence, m, quote));
            }
        }

        // best-supported quotes first, stable by occurrence, exact dedup
        quotes.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        let mut evidence_quotes: Vec<String> = Vec::new();
        for (_, _, quote) in quotes {
            if evidence_quotes.len() >= config.max_evidence_quotes {
                break;
            }
            if !evidence_quotes.iter().any(|q| q == quote) {
                evidence_quotes.push(quote.to_string());
            }
        }

        let canonical_name = entities[rep].name.clone();
        for alias in &aliases {
            // a surface form claimed by an earlier group keeps its first owner
            name_to_canonical
                .entry(alias.clone())
                .or_insert_with(|| canonical_name.clone());
        }

        canonical_entities.push(CanonicalEntity {
            canonical_name,
            category: entities[rep].category,
            aliases,
            confidence,
            evidence_quotes,
            mention_count: members.len(),
        });
    }

    // re-point relationship endpoints onto canonical names
    let mut out_relationships: Vec<Relationship> = Vec::new();
    let mut seen_triples: HashMap<(String, String, String), usize> = HashMap::new();
    let mut self_relationships_dropped = Vec::new();
    let mut duplicate_relationships_merged = 0;
    let mut unresolved_relationships_dropped = 0;

    for rel in relationships {
        let (Some(subject), Some(object)) = (
            name_to_canonical.get(rel.subject.as_str()),
            name_to_canonical.get(rel.object.as_str()),
        ) else {
            unresolved_relationships_dropped += 1;
            continue;
        };
        if subject == object {
            self_relationships_dropped.push((subject.clone(), rel.predicate));
            continue;
        }

        let triple = (subject.clone(), rel.predicate.clone(), object.clone());
        match seen_triples.get(&triple) {
            Some(&idx) => {
                duplicate_relationships_merged += 1;
                let existing = &mut out_relationships[idx];
                existing.confidence = existing.confidence.max(rel.confidence);
                if existing.evidence_quote.is_none() {
                    existing.evidence_quote = rel.evidence_quote;
                }
            }
            None => {
                seen_triples.insert(triple, out_relationships.len());
                out_relationships.push(Relationship {
                    subject: subject.clone(),
                    predicate: rel.predicate,
                    object: object.clone(),
                    confidence: rel.confidence,
                    evidence_quote: rel.evidence_quote,
                });
            }
        }
    }

    if unresolved_relationships_dropped > 0 {
        warn!(
            "dropped {} relationships referencing unknown entity names",
            unresolved_relationships_dropped
        );
    }
    info!(
        "Deduplicated {} raw mentions into {} entities ({} merges)",
        raw_count,
        canonical_entities.len(),
        merges_performed
    );

    NormalizeResult {
        entities: canonical_entities,
        relationships: out_relationships,
        merges_performed,
        low_confidence_dropped,
        duplicate_relationships_merged,
        unresolved_relationships_dropped,
        self_relationships_dropped,
    }
}

/// Highest confidence wins; ties go to the longer name, then the earlier
/// mention. The winner's original form becomes the canonical name.
fn pick_representative(entities: &[RawEntity], members: &[usize]) -> Option<usize> {
    members.iter().copied().max_by(|&a, &b| {
        entities[a]
            .confidence
            .partial_cmp(&entities[b].confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                entities[a]
                    .name
                    .chars()
                    .count()
                    .cmp(&entities[b].name.chars().count())
            })
            .then_with(|| b.cmp(&a))
    })
}

#[derive(Debug, Clone)]
struct EntityKey {
    key: String,
    tokens: Vec<String>,
    category: EntityCategory,
}

impl EntityKey {
    fn build(name: &str, category: EntityCategory, config: &NormalizerConfig) -> Self {
        let key = comparison_key(name, category, config);
        let tokens = key.split_whitespace().map(str::to_string).collect();
        Self {
            key,
            tokens,
            category,
        }
    }
}

/// Lowercased, honorific-stripped, alias-expanded matching form. Display
/// names keep their original spelling; only comparison uses this.
fn comparison_key(name: &str, category: EntityCategory, config: &NormalizerConfig) -> String {
    let lowered = name.trim().to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

    // honorifics only ever prefix people; stripping them from organizations
    // would mangle names like "General Motors"
    if matches!(category, EntityCategory::Person | EntityCategory::Title) {
        while tokens.len() > 1 {
            let head = tokens[0].trim_end_matches('.');
            if config.honorifics.iter().any(|h| h == head) {
                tokens.remove(0);
            } else {
                break;
            }
        }
    }

    let joined = tokens.join(" ");
    match config.alias_table.get(joined.as_str()) {
        Some(expansion) => expansion.clone(),
        None => joined,
    }
}

fn mergeable(a: &EntityKey, b: &EntityKey, threshold: f64) -> bool {
    if !a.category.is_compatible_with(&b.category) {
        return false;
    }
    if a.key == b.key {
        return true;
    }
    if token_run_contained(&a.tokens, &b.tokens) || token_run_contained(&b.tokens, &a.tokens) {
        return true;
    }
    name_similarity(&a.key, &b.key) >= threshold
}

/// Whether `inner` appears as a contiguous token run inside `outer`
/// ("smith" inside "john smith", "new york" inside "new york city").
fn token_run_contained(inner: &[String], outer: &[String]) -> bool {
    !inner.is_empty()
        && inner.len() < outer.len()
        && outer.windows(inner.len()).any(|run| run == inner)
}

fn name_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b).max(strsim::jaro_winkler(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, confidence: f32) -> RawEntity {
        raw(name, EntityCategory::Person, confidence)
    }

    fn raw(name: &str, category: EntityCategory, confidence: f32) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            category,
            confidence,
            evidence_quote: None,
            timestamp_ms: None,
            source_chunk: 0,
        }
    }

    fn rel(subject: &str, predicate: &str, object: &str) -> RawRelationship {
        RawRelationship {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            confidence: 0.7,
            evidence_quote: None,
        }
    }

    #[test]
    fn test_union_find_transitive_chain() {
        let mut sets = UnionFind::new(4);
        sets.union(0, 1);
        sets.union(1, 2);
        assert!(sets.same(0, 2));
        assert!(!sets.same(0, 3));
        // root is the first-seen member
        assert_eq!(sets.find(2), 0);
    }

    #[test]
    fn test_honorific_and_surname_forms_merge() {
        let entities = vec![
            person("Senator John Smith", 0.8),
            person("John Smith", 0.85),
            person("Smith", 0.6),
        ];
        let result = normalize_entities(entities, Vec::new(), &NormalizerConfig::default());

        assert_eq!(result.entities.len(), 1);
        let entity = &result.entities[0];
        assert_eq!(entity.canonical_name, "John Smith");
        assert_eq!(entity.mention_count, 3);
        assert!((entity.confidence - 0.85).abs() < 1e-6);
        assert!(entity.aliases.contains("Senator John Smith"));
        assert!(entity.aliases.contains("John Smith"));
        assert!(entity.aliases.contains("Smith"));
        assert_eq!(result.merges_performed, 2);
    }

    #[test]
    fn test_alias_table_expansion() {
        let entities = vec![
            raw("UN", EntityCategory::Organization, 0.7),
            raw("United Nations", EntityCategory::Organization, 0.9),
        ];
        let result = normalize_entities(entities, Vec::new(), &NormalizerConfig::default());

        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].canonical_name, "United Nations");
        assert!((result.entities[0].confidence - 0.9).abs() < 1e-6);
        assert!(result.entities[0].aliases.contains("UN"));
    }

    #[test]
    fn test_chain_merges_transitively() {
        // "Smith" bridges two names that do not match each other directly
        let entities = vec![
            person("Senator John Smith", 0.8),
            person("Smith", 0.6),
            person("Smith Robertson", 0.7),
        ];
        let result = normalize_entities(entities, Vec::new(), &NormalizerConfig::default());

        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].mention_count, 3);
    }

    #[test]
    fn test_incompatible_categories_never_merge() {
        let entities = vec![
            raw("Jordan", EntityCategory::Person, 0.9),
            raw("Jordan", EntityCategory::Location, 0.9),
        ];
        let result = normalize_entities(entities, Vec::new(), &NormalizerConfig::default());
        assert_eq!(result.entities.len(), 2);
    }

    #[test]
    fn test_supertype_pair_merges() {
        let entities = vec![
            raw("Chancellor Weber", EntityCategory::Title, 0.7),
            raw("Chancellor Weber", EntityCategory::Person, 0.9),
        ];
        let result = normalize_entities(entities, Vec::new(), &NormalizerConfig::default());
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].category, EntityCategory::Person);
    }

    #[test]
    fn test_relationships_repointed_and_self_loops_dropped() {
        let entities = vec![
            raw("UN", EntityCategory::Organization, 0.7),
            raw("United Nations", EntityCategory::Organization, 0.9),
            person("John Smith", 0.85),
            person("Senator John Smith", 0.8),
        ];
        let relationships = vec![
            rel("UN", "criticized", "John Smith"),
            rel("John Smith", "met with", "Senator John Smith"),
            rel("Ghost Corp", "acquired", "UN"),
        ];
        let result =
            normalize_entities(entities, relationships, &NormalizerConfig::default());

        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].subject, "United Nations");
        assert_eq!(result.relationships[0].object, "John Smith");

        assert_eq!(result.self_relationships_dropped.len(), 1);
        assert_eq!(result.self_relationships_dropped[0].1, "met with");
        assert_eq!(result.unresolved_relationships_dropped, 1);

        // every surviving endpoint is a canonical entity name
        let names: Vec<&str> = result
            .entities
            .iter()
            .map(|e| e.canonical_name.as_str())
            .collect();
        for r in &result.relationships {
            assert!(names.contains(&r.subject.as_str()));
            assert!(names.contains(&r.object.as_str()));
        }
    }

    #[test]
    fn test_duplicate_triples_collapse() {
        let entities = vec![
            person("Amara Okafor", 0.9),
            raw("Meridian Labs", EntityCategory::Organization, 0.8),
        ];
        let mut first = rel("Amara Okafor", "founded", "Meridian Labs");
        first.confidence = 0.6;
        let mut second = rel("Amara Okafor", "founded", "Meridian Labs");
        second.confidence = 0.9;
        second.evidence_quote = Some("she founded the lab in 2019".to_string());

        let result =
            normalize_entities(entities, vec![first, second], &NormalizerConfig::default());

        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.duplicate_relationships_merged, 1);
        assert!((result.relationships[0].confidence - 0.9).abs() < 1e-6);
        assert!(result.relationships[0].evidence_quote.is_some());
    }

    #[test]
    fn test_idempotent_fixed_point() {
        let entities = vec![
            person("Senator John Smith", 0.8),
            person("John Smith", 0.85),
            person("Smith", 0.6),
            raw("UN", EntityCategory::Organization, 0.7),
            raw("United Nations", EntityCategory::Organization, 0.9),
        ];
        let config = NormalizerConfig::default();
        let first = normalize_entities(entities, Vec::new(), &config);

        let refeed: Vec<RawEntity> = first
            .entities
            .iter()
            .map(|e| RawEntity {
                name: e.canonical_name.clone(),
                category: e.category,
                confidence: e.confidence,
                evidence_quote: None,
                timestamp_ms: None,
                source_chunk: 0,
            })
            .collect();
        let second = normalize_entities(refeed, Vec::new(), &config);

        let first_names: Vec<&str> = first
            .entities
            .iter()
            .map(|e| e.canonical_name.as_str())
            .collect();
        let second_names: Vec<&str> = second
            .entities
            .iter()
            .map(|e| e.canonical_name.as_str())
            .collect();
        assert_eq!(first_names, second_names);
        assert_eq!(second.merges_performed, 0);
    }

    #[test]
    fn test_confidence_floor_drops_mentions() {
        let mut config = NormalizerConfig::default();
        config.confidence_floor = 0.5;
        let entities = vec![person("Amara Okafor", 0.9), person("mumbled name", 0.2)];
        let result = normalize_entities(entities, Vec::new(), &config);

        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.low_confidence_dropped, 1);
    }

    #[test]
    fn test_evidence_quotes_capped_ordered_deduped() {
        let mut entities = Vec::new();
        for (i, confidence) in [0.5, 0.9, 0.7, 0.8, 0.6, 0.4, 0.3].iter().enumerate() {
            let mut entity = person("Amara Okafor", *confidence);
            // two mentions share the same quote text
            let quote = if i == 2 {
                "quote 1".to_string()
            } else {
                format!("quote {i}")
            };
            entity.evidence_quote = Some(quote);
            entities.push(entity);
        }

        let result = normalize_entities(entities, Vec::new(), &NormalizerConfig::default());
        let quotes = &result.entities[0].evidence_quotes;

        assert_eq!(quotes.len(), 5);
        assert_eq!(quotes[0], "quote 1");
        assert_eq!(quotes.iter().filter(|q| *q == "quote 1").count(), 1);
    }

    #[test]
    fn test_comparison_key_building() {
        let config = NormalizerConfig::default();
        assert_eq!(
            comparison_key("Dr. Amara Okafor", EntityCategory::Person, &config),
            "amara okafor"
        );
        assert_eq!(
            comparison_key("Senator", EntityCategory::Title, &config),
            "senator"
        );
        assert_eq!(
            comparison_key("General Motors", EntityCategory::Organization, &config),
            "general motors"
        );
        assert_eq!(
            comparison_key("  U.N. ", EntityCategory::Organization, &config),
            "united nations"
        );
    }
}
