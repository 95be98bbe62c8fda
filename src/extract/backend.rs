#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::Mutex;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::error::EngineError;
use crate::models::{Chunk, SpeakerSample, TokenUsage, TranscriptMetadata};

/// Transcript-level context shared by every chunk request
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    pub metadata: TranscriptMetadata,
    pub language: Option<String>,
}

/// Raw result of one extraction call: the tool-input payload as the service
/// returned it, plus the usage block. Typed conversion happens later so every
/// backend goes through the same validation.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub payload: Value,
    pub usage: TokenUsage,
}

/// One chunk in, one raw extraction out. Implemented by the HTTP client and
/// by scripted test backends.
pub trait ExtractionBackend {
    async fn extract_chunk(
        &self,
        chunk: &Chunk,
        context: &ExtractionContext,
    ) -> Result<ExtractionOutcome, EngineError>;
}

/// Optional second-pass speaker verification: given one sample per cluster,
/// return groups of labels judged to be the same person.
pub trait SpeakerVerifier {
    async fn group_samples(&self, samples: &[SpeakerSample])
    -> Result<Vec<Vec<String>>, EngineError>;
}

/// Test backend replaying queued responses per chunk index.
///
/// Each call pops the next queued outcome for that chunk, so retry behavior
/// can be scripted (fail once then succeed, fail twice, and so on). A chunk
/// with an empty queue fails with a transient error.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<HashMap<usize, VecDeque<Result<ExtractionOutcome, EngineError>>>>,
    calls: AtomicUsize,
}

#[cfg(test)]
impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful payload with nominal usage
    pub fn with_payload(self, chunk_index: usize, payload: Value) -> Self {
        let usage = TokenUsage {
            input_tokens: 1_000,
            output_tokens: 200,
            cached_tokens: 0,
        };
        self.with_outcome(chunk_index, Ok(ExtractionOutcome { payload, usage }))
    }

    /// Queue a successful payload with explicit usage
    pub fn with_usage(self, chunk_index: usize, payload: Value, usage: TokenUsage) -> Self {
        self.with_outcome(chunk_index, Ok(ExtractionOutcome { payload, usage }))
    }

    /// Queue a failure for the next call on this chunk
    pub fn with_failure(self, chunk_index: usize, error: EngineError) -> Self {
        self.with_outcome(chunk_index, Err(error))
    }

    fn with_outcome(
        self,
        chunk_index: usize,
        outcome: Result<ExtractionOutcome, EngineError>,
    ) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(chunk_index)
            .or_default()
            .push_back(outcome);
        self
    }

    /// Total extraction calls made, retries included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl ExtractionBackend for ScriptedBackend {
    async fn extract_chunk(
        &self,
        chunk: &Chunk,
        _context: &ExtractionContext,
    ) -> Result<ExtractionOutcome, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&chunk.index)
            .and_then(|queue| queue.pop_front());
        next.unwrap_or_else(|| {
            Err(EngineError::TransientService(format!(
                "no scripted response for chunk {}",
                chunk.index
            )))
        })
    }
}

/// Test verifier returning a fixed grouping (or a scripted failure)
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedVerifier {
    groups: Vec<Vec<String>>,
    fail: bool,
    calls: AtomicUsize,
}

#[cfg(test)]
impl ScriptedVerifier {
    pub fn with_groups(groups: Vec<Vec<String>>) -> Self {
        Self {
            groups,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A verifier whose single call fails transiently
    pub fn failing() -> Self {
        Self {
            groups: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SpeakerVerifier for ScriptedVerifier {
    async fn group_samples(
        &self,
        _samples: &[SpeakerSample],
    ) -> Result<Vec<Vec<String>>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::TransientService(
                "scripted verifier failure".to_string(),
            ));
        }
        Ok(self.groups.clone())
    }
}
