use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Per-raw-label view of a transcript, built before any merging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerProfile {
    /// Raw diarizer label
    pub label: String,
    /// Embedding centroid from the diarizer; empty when none was supplied
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub total_speech_ms: u64,
    pub segment_count: usize,
}

/// A representative stretch of speech for one cluster, submitted to the
/// verification pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSample {
    pub label: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    /// True when no clean sample existed and an overlapped span was used
    pub overlapped: bool,
}

impl SpeakerSample {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// How the final grouping for a merged speaker was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeConfidence {
    High,
    /// The cluster's verification sample fell back to overlapped speech
    Low,
}

/// One corrected speaker: a merged id covering one or more raw labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedSpeaker {
    /// Run-scoped id: "S0", "S1", ... in order of first appearance
    pub merged_id: String,
    /// Raw labels merged into this speaker
    pub members: BTreeSet<String>,
    pub total_speech_ms: u64,
    pub segment_count: usize,
    pub confidence: MergeConfidence,
}

/// The corrected speaker partition: every raw label belongs to exactly one
/// merged speaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeakerMap {
    pub merged: Vec<MergedSpeaker>,
    /// Raw label -> merged id
    pub index: BTreeMap<String, String>,
}

impl SpeakerMap {
    /// Merged id for a raw diarizer label
    pub fn resolve(&self, raw_label: &str) -> Option<&str> {
        self.index.get(raw_label).map(|s| s.as_str())
    }

    pub fn merged_count(&self) -> usize {
        self.merged.len()
    }

    /// True when `labels` is covered exactly: each appears in one merged
    /// speaker and no merged speaker holds an unknown label.
    pub fn is_partition_of(&self, labels: &[String]) -> bool {
        let mut seen = BTreeSet::new();
        for speaker in &self.merged {
            for member in &speaker.members {
                if !seen.insert(member.clone()) {
                    return false;
                }
            }
        }
        let expected: BTreeSet<String> = labels.iter().cloned().collect();
        seen == expected
    }
}
