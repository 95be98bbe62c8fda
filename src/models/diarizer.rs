use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::transcript::{DiarizedTranscript, TranscriptSegment};

/// Root document produced by the upstream diarization pipeline.
///
/// Timestamps on the wire are floating-point seconds; they are converted to
/// millisecond integers on ingest and stay integers from then on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiarizerDocument {
    pub segments: Vec<DiarizerSegment>,
    /// Voice embedding centroid per speaker label, when computed
    #[serde(default)]
    pub speaker_embeddings: HashMap<String, Vec<f32>>,
    /// Detected language code (e.g. "en")
    #[serde(default)]
    pub language: Option<String>,
}

/// A single diarized utterance on the wire
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiarizerSegment {
    /// Start timestamp in seconds
    pub start: f64,
    /// End timestamp in seconds
    pub end: f64,
    /// Cluster label assigned by the diarizer
    pub speaker: String,
    pub text: String,
    /// Whether this span overlaps another speaker's speech
    #[serde(default)]
    pub overlapped: bool,
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}

impl DiarizerDocument {
    /// Convert the wire document into the internal transcript model.
    ///
    /// Empty-text segments are dropped and segments are ordered by start time
    /// so downstream stages can rely on chronological order.
    pub fn into_transcript(self) -> DiarizedTranscript {
        let mut segments: Vec<TranscriptSegment> = self
            .segments
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .map(|s| TranscriptSegment {
                start_ms: seconds_to_ms(s.start),
                end_ms: seconds_to_ms(s.end),
                speaker: s.speaker,
                text: s.text,
                overlapped: s.overlapped,
            })
            .collect();
        segments.sort_by_key(|s| (s.start_ms, s.end_ms));

        let mut transcript = DiarizedTranscript::from_segments(segments);
        transcript.speaker_embeddings = self.speaker_embeddings;
        transcript.detected_language = self.language;
        transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diarizer_document() {
        let json = r#"{
            "segments": [
                {"start": 0.5, "end": 3.25, "speaker": "SPEAKER_00", "text": "Welcome back to the show."},
                {"start": 3.25, "end": 6.0, "speaker": "SPEAKER_01", "text": "Thanks for having me.", "overlapped": true}
            ],
            "speaker_embeddings": {
                "SPEAKER_00": [0.1, 0.2, 0.3]
            },
            "language": "en"
        }"#;

        let doc: DiarizerDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.segments.len(), 2);
        assert_eq!(doc.segments[0].speaker, "SPEAKER_00");
        assert!(doc.segments[1].overlapped);

        let transcript = doc.into_transcript();
        assert_eq!(transcript.segments[0].start_ms, 500);
        assert_eq!(transcript.segments[0].end_ms, 3250);
        assert_eq!(transcript.speakers, vec!["SPEAKER_00", "SPEAKER_01"]);
        assert_eq!(transcript.detected_language.as_deref(), Some("en"));
        assert_eq!(
            transcript.speaker_embeddings["SPEAKER_00"],
            vec![0.1, 0.2, 0.3]
        );
    }

    #[test]
    fn test_into_transcript_drops_empty_and_sorts() {
        let json = r#"{
            "segments": [
                {"start": 4.0, "end": 5.0, "speaker": "SPEAKER_01", "text": "later"},
                {"start": 1.0, "end": 2.0, "speaker": "SPEAKER_00", "text": "   "},
                {"start": 0.0, "end": 1.0, "speaker": "SPEAKER_00", "text": "first"}
            ]
        }"#;

        let doc: DiarizerDocument = serde_json::from_str(json).unwrap();
        let transcript = doc.into_transcript();

        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "first");
        assert_eq!(transcript.segments[1].text, "later");
    }
}
