use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::cost::CostReport;
use crate::models::entity::{CanonicalEntity, Relationship};
use crate::models::extraction::{KeyMoment, Sentiment, Topic};
use crate::models::speaker::SpeakerMap;
use crate::models::transcript::TranscriptMetadata;

/// Something that went wrong but was recovered during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// A chunk's extraction failed after retry; its slot is empty
    DegradedChunk { index: usize, reason: String },
    /// Dedup collapsed a relationship's endpoints into the same entity
    DroppedSelfRelationship { entity: String, predicate: String },
    /// A speaker cluster was verified from an overlapped speech sample
    LowConfidenceSpeaker { label: String },
}

/// Itemized recoverable failures for one run. Empty on a fully clean run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub events: Vec<DiagnosticEvent>,
}

impl Diagnostics {
    pub fn push(&mut self, event: DiagnosticEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn degraded_chunk_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DiagnosticEvent::DegradedChunk { .. }))
            .count()
    }
}

/// The engine's output: everything extracted, deduplicated and attributed,
/// plus what it cost and what went wrong along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceReport {
    /// Run-scoped identifier (uuid v4)
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub metadata: TranscriptMetadata,
    pub entities: Vec<CanonicalEntity>,
    pub relationships: Vec<Relationship>,
    pub topics: Vec<Topic>,
    pub key_moments: Vec<KeyMoment>,
    pub sentiment: Option<Sentiment>,
    pub speaker_map: SpeakerMap,
    pub cost_report: CostReport,
    pub diagnostics: Diagnostics,
    /// True when any chunk degraded or the run was cancelled mid-flight
    pub incomplete: bool,
}
