use serde::{Deserialize, Serialize};

use crate::models::transcript::TranscriptSegment;

/// A contiguous run of transcript segments sized for one extraction call.
///
/// Chunks own their segments so each one can be moved into an independent
/// in-flight request. Segment boundaries are never split: a chunk always
/// contains whole segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk in the transcript (0-based)
    pub index: usize,
    pub segments: Vec<TranscriptSegment>,
    /// Total characters of segment text in this chunk
    pub char_count: usize,
}

impl Chunk {
    pub fn new(index: usize, segments: Vec<TranscriptSegment>) -> Self {
        let char_count = segments.iter().map(|s| s.char_count()).sum();
        Self {
            index,
            segments,
            char_count,
        }
    }

    /// Rough token estimate for budgeting (4 chars per token)
    pub fn token_estimate(&self) -> usize {
        self.char_count / 4
    }

    pub fn start_ms(&self) -> u64 {
        self.segments.first().map(|s| s.start_ms).unwrap_or(0)
    }

    pub fn end_ms(&self) -> u64 {
        self.segments.last().map(|s| s.end_ms).unwrap_or(0)
    }

    /// Render the chunk as speaker-attributed lines for the extraction prompt:
    /// one `[MM:SS] LABEL: text` line per segment.
    pub fn transcript_text(&self) -> String {
        let mut out = String::with_capacity(self.char_count + self.segments.len() * 24);
        for seg in &self.segments {
            out.push('[');
            out.push_str(&format_timestamp(seg.start_ms));
            out.push_str("] ");
            out.push_str(&seg.speaker);
            out.push_str(": ");
            out.push_str(&seg.text);
            out.push('\n');
        }
        out
    }
}

/// Format a millisecond timestamp as `MM:SS`, or `HH:MM:SS` past the hour
pub fn format_timestamp(ms: u64) -> String {
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start_ms: u64, end_ms: u64, speaker: &str, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_ms,
            end_ms,
            speaker: speaker.to_string(),
            text: text.to_string(),
            overlapped: false,
        }
    }

    #[test]
    fn test_chunk_counts_chars() {
        let chunk = Chunk::new(
            0,
            vec![seg(0, 1000, "SPEAKER_00", "hello"), seg(1000, 2000, "SPEAKER_01", "world!")],
        );
        assert_eq!(chunk.char_count, 11);
        assert_eq!(chunk.token_estimate(), 2);
        assert_eq!(chunk.start_ms(), 0);
        assert_eq!(chunk.end_ms(), 2000);
    }

    #[test]
    fn test_transcript_text_format() {
        let chunk = Chunk::new(
            3,
            vec![
                seg(65_000, 70_000, "SPEAKER_00", "one minute in"),
                seg(3_600_000, 3_605_000, "SPEAKER_01", "one hour in"),
            ],
        );
        let text = chunk.transcript_text();
        assert_eq!(
            text,
            "[1:05] SPEAKER_00: one minute in\n[1:00:00] SPEAKER_01: one hour in\n"
        );
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(59_999), "0:59");
        assert_eq!(format_timestamp(61_000), "1:01");
        assert_eq!(format_timestamp(3_661_000), "1:01:01");
    }
}
