use serde::{Deserialize, Serialize};

/// Entity taxonomy used by the extraction schema.
///
/// Unknown category strings from the service deserialize as `Other` rather
/// than failing the whole chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Person,
    Organization,
    Location,
    Event,
    Product,
    Date,
    Money,
    Law,
    Work,
    Technology,
    Medical,
    Sport,
    Food,
    Language,
    Nationality,
    Religion,
    Title,
    #[serde(other)]
    Other,
}

impl EntityCategory {
    /// Whether two categories may describe the same entity.
    ///
    /// Same category is always compatible; a few supertype pairs also are
    /// (a "Senator" title and the person holding it, a nationality and its
    /// place, a creative work sold as a product).
    pub fn is_compatible_with(&self, other: &EntityCategory) -> bool {
        use EntityCategory::*;
        if self == other {
            return true;
        }
        matches!(
            (self, other),
            (Title, Person)
                | (Person, Title)
                | (Nationality, Location)
                | (Location, Nationality)
                | (Work, Product)
                | (Product, Work)
        )
    }
}

/// One entity mention as the extraction service reported it, before
/// normalization. Name is verbatim from the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub name: String,
    pub category: EntityCategory,
    /// Service confidence in this mention (0-1)
    pub confidence: f32,
    #[serde(default)]
    pub evidence_quote: Option<String>,
    /// When in the recording the mention occurred, if the service located it
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    /// Which chunk produced this mention (stamped by the adapter)
    #[serde(default)]
    pub source_chunk: usize,
}

/// A directed relationship between two entity names, pre-canonicalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRelationship {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    #[serde(default)]
    pub evidence_quote: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

/// Sentiment with the service's confidence in the call (0-1)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sentiment {
    pub overall: SentimentLabel,
    pub confidence: f32,
}

/// A discussion topic within one chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    /// How central the topic is to the conversation (0-1)
    pub relevance: f32,
    #[serde(default)]
    pub start_ms: Option<u64>,
    #[serde(default)]
    pub end_ms: Option<u64>,
    #[serde(default)]
    pub sentiment: Option<SentimentLabel>,
}

/// A notable moment worth surfacing in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMoment {
    pub timestamp_ms: u64,
    pub description: String,
    /// How notable the moment is (0-1)
    pub significance: f32,
    /// Merged speaker id, attributed during orchestration
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Everything extracted from one chunk.
///
/// A degraded result stands in for a chunk whose extraction failed after
/// retry: all lists empty, `degraded` set, sentiment absent. It still
/// occupies its slot so downstream stages see every chunk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_chunk_index: usize,
    /// Character count of the source chunk, used to weight sentiment
    pub chunk_char_count: usize,
    pub entities: Vec<RawEntity>,
    pub relationships: Vec<RawRelationship>,
    pub topics: Vec<Topic>,
    pub key_moments: Vec<KeyMoment>,
    pub sentiment: Option<Sentiment>,
    pub degraded: bool,
}

impl ExtractionResult {
    /// Empty placeholder for a chunk whose extraction failed after retry
    pub fn degraded(source_chunk_index: usize, chunk_char_count: usize) -> Self {
        Self {
            source_chunk_index,
            chunk_char_count,
            entities: Vec::new(),
            relationships: Vec::new(),
            topics: Vec::new(),
            key_moments: Vec::new(),
            sentiment: None,
            degraded: true,
        }
    }
}
