use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One diarized segment of speech: a contiguous span of text attributed to a
/// single speaker label. Immutable input to the chunker; the pipeline never
/// rewrites segment text or timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start timestamp in milliseconds
    pub start_ms: u64,
    /// End timestamp in milliseconds
    pub end_ms: u64,
    /// Raw speaker label assigned by the diarizer (e.g., "SPEAKER_00")
    pub speaker: String,
    /// The spoken text of this segment
    pub text: String,
    /// Whether the diarizer flagged this span as overlapping another speaker
    #[serde(default)]
    pub overlapped: bool,
}

impl TranscriptSegment {
    /// Duration of this segment in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Character count of the segment text
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A complete diarized transcript as handed over by the transcription
/// collaborator: ordered segments plus the per-label voice embeddings the
/// diarizer computed (when available).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiarizedTranscript {
    /// All segments in chronological order
    pub segments: Vec<TranscriptSegment>,
    /// Distinct raw speaker labels, in order of first appearance
    pub speakers: Vec<String>,
    /// Embedding centroid per raw speaker label, when the diarizer supplied one
    #[serde(default)]
    pub speaker_embeddings: HashMap<String, Vec<f32>>,
    /// Detected language code, if reported
    #[serde(default)]
    pub detected_language: Option<String>,
}

impl DiarizedTranscript {
    /// Build a transcript from ordered segments, deriving the speaker list.
    pub fn from_segments(segments: Vec<TranscriptSegment>) -> Self {
        let mut speakers = Vec::new();
        for seg in &segments {
            if !speakers.contains(&seg.speaker) {
                speakers.push(seg.speaker.clone());
            }
        }
        Self {
            segments,
            speakers,
            speaker_embeddings: HashMap::new(),
            detected_language: None,
        }
    }

    /// Total duration in milliseconds (first segment start to last segment end)
    pub fn duration_ms(&self) -> u64 {
        let start = self.segments.first().map(|s| s.start_ms).unwrap_or(0);
        let end = self.segments.last().map(|s| s.end_ms).unwrap_or(0);
        end.saturating_sub(start)
    }

    /// Total character count across all segments
    pub fn char_count(&self) -> usize {
        self.segments.iter().map(|s| s.char_count()).sum()
    }

    /// Total speech time in milliseconds for one raw speaker label
    pub fn speech_ms_for(&self, speaker: &str) -> u64 {
        self.segments
            .iter()
            .filter(|s| s.speaker == speaker)
            .map(|s| s.duration_ms())
            .sum()
    }

    /// The raw speaker label active at a given timestamp, if any segment
    /// covers it.
    pub fn speaker_at(&self, timestamp_ms: u64) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.start_ms <= timestamp_ms && timestamp_ms < s.end_ms.max(s.start_ms + 1))
            .map(|s| s.speaker.as_str())
    }
}

/// Transcript-level context handed to the extraction collaborator so it can
/// disambiguate entities (a guest name in a show title, a place in the
/// source field, and so on).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    /// Human title of the recording, if known
    pub title: Option<String>,
    /// Origin of the recording (feed name, channel, publication)
    pub source: Option<String>,
    /// Total recording duration in milliseconds
    pub duration_ms: u64,
}
