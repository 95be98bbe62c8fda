use tracing::warn;

use crate::models::{Chunk, TranscriptSegment};

/// Configuration for transcript chunking
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum characters of segment text per chunk
    pub max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_chars: 45_000 }
    }
}

/// Split a transcript into extraction-sized chunks.
///
/// Greedy accumulation: segments are never split, order is preserved, and
/// every segment lands in exactly one chunk. A single segment larger than
/// the whole budget becomes its own over-budget chunk; that is warned, not
/// an error, and the run stays complete.
pub fn chunk_segments(segments: &[TranscriptSegment], config: &ChunkerConfig) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<TranscriptSegment> = Vec::new();
    let mut current_chars = 0usize;

    for segment in segments {
        let segment_chars = segment.char_count();
        if !current.is_empty() && current_chars + segment_chars > config.max_chars {
            chunks.push(Chunk::new(chunks.len(), std::mem::take(&mut current)));
            current_chars = 0;
        }
        current_chars += segment_chars;
        current.push(segment.clone());
    }
    if !current.is_empty() {
        chunks.push(Chunk::new(chunks.len(), current));
    }

    for chunk in &chunks {
        if chunk.char_count > config.max_chars {
            warn!(
                "chunk {} exceeds budget: {} chars in a single segment (budget {})",
                chunk.index, chunk.char_count, config.max_chars
            );
        }
    }

    chunks
}
