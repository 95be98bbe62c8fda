use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::extract::backend::{ExtractionBackend, ExtractionContext};
use crate::extract::validation::parse_extraction;
use crate::models::{Chunk, CostRecord, ExtractionResult, PricingSchedule, TokenUsage};

/// Configuration for the extraction fan-out
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Chunk extractions in flight at once
    pub concurrency: usize,
    /// Additional attempts after the first for retryable failures
    pub max_retries: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 1,
        }
    }
}

/// Everything the fan-out produced, in chunk order
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub results: Vec<ExtractionResult>,
    pub cost_records: Vec<CostRecord>,
    /// Chunks that exhausted retries, with the final failure
    pub degraded: Vec<(usize, String)>,
    pub cancelled_chunks: usize,
}

enum ChunkStatus {
    Extracted(ExtractionResult),
    Failed(String),
    Cancelled,
}

/// Extract every chunk concurrently against `backend`.
///
/// A retryable failure gets one more attempt; a chunk that still fails
/// becomes an empty degraded result so the rest of the run can finish.
/// Tokens burned by failed attempts are billed like any others. Flipping
/// `cancel` stops chunks that have not started yet; in-flight ones finish.
pub async fn dispatch_chunks<B: ExtractionBackend>(
    chunks: &[Chunk],
    backend: &B,
    context: &ExtractionContext,
    schedule: &PricingSchedule,
    config: &DispatchConfig,
    cancel: &watch::Receiver<bool>,
) -> DispatchOutcome {
    let mut collected: Vec<(usize, ChunkStatus, Option<CostRecord>)> =
        stream::iter(chunks.iter())
            .map(|chunk| {
                let cancel = cancel.clone();
                async move {
                    if *cancel.borrow() {
                        return (chunk.index, ChunkStatus::Cancelled, None);
                    }
                    let (status, usage, first_input) =
                        extract_with_retry(chunk, backend, context, config.max_retries).await;
                    let record = (!usage.is_zero()).then(|| {
                        let tier =
                            schedule.tier_for(first_input.unwrap_or(usage.input_tokens));
                        CostRecord::new(chunk.index, usage, tier, schedule)
                    });
                    (chunk.index, status, record)
                }
            })
            .buffer_unordered(config.concurrency.max(1))
            .collect()
            .await;
    collected.sort_by_key(|(index, _, _)| *index);

    let mut outcome = DispatchOutcome::default();
    for (index, status, record) in collected {
        if let Some(record) = record {
            outcome.cost_records.push(record);
        }
        match status {
            ChunkStatus::Extracted(result) => outcome.results.push(result),
            ChunkStatus::Failed(reason) => {
                warn!("chunk {index} degraded after retries: {reason}");
                let chars = chunks
                    .iter()
                    .find(|c| c.index == index)
                    .map(|c| c.char_count)
                    .unwrap_or(0);
                outcome.results.push(ExtractionResult::degraded(index, chars));
                outcome.degraded.push((index, reason));
            }
            ChunkStatus::Cancelled => outcome.cancelled_chunks += 1,
        }
    }

    info!(
        "Extraction: {} chunks dispatched, {} degraded, {} cancelled",
        chunks.len(),
        outcome.degraded.len(),
        outcome.cancelled_chunks
    );
    outcome
}

/// One chunk through the backend, with a single retry for retryable
/// failures. Returns the accumulated usage across attempts and the input
/// size of the first attempt that reported usage, which fixes the pricing
/// tier.
async fn extract_with_retry<B: ExtractionBackend>(
    chunk: &Chunk,
    backend: &B,
    context: &ExtractionContext,
    max_retries: usize,
) -> (ChunkStatus, TokenUsage, Option<u64>) {
    let mut usage = TokenUsage::default();
    let mut first_input = None;
    let mut attempt = 0;

    loop {
        let error = match backend.extract_chunk(chunk, context).await {
            Ok(outcome) => {
                if first_input.is_none() && !outcome.usage.is_zero() {
                    first_input = Some(outcome.usage.input_tokens);
                }
                usage.merge(&outcome.usage);
                match parse_extraction(&outcome.payload, chunk) {
                    Ok(result) => return (ChunkStatus::Extracted(result), usage, first_input),
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        if error.is_retryable() && attempt < max_retries {
            attempt += 1;
            warn!(
                "chunk {} attempt {} failed ({error}); retrying",
                chunk.index, attempt
            );
            continue;
        }
        return (ChunkStatus::Failed(error.to_string()), usage, first_input);
    }
}
