use std::collections::HashMap;

use tracing::info;

use crate::models::{
    ExtractionResult, KeyMoment, RawEntity, RawRelationship, Sentiment, SentimentLabel, Topic,
};

/// Merged per-chunk extractions, pre-deduplication.
///
/// Entities and relationships are concatenated as-is; deduplication belongs
/// to the normalizer, not here.
#[derive(Debug, Default)]
pub struct Aggregated {
    pub entities: Vec<RawEntity>,
    pub relationships: Vec<RawRelationship>,
    pub topics: Vec<Topic>,
    pub key_moments: Vec<KeyMoment>,
    pub sentiment: Option<Sentiment>,
}

/// Combine per-chunk results into one transcript-level view.
///
/// Results are re-ordered by chunk index first, so callers may hand them
/// over in completion order. Topics and key moments are re-sorted into
/// chronological order; overall sentiment is the char-length-weighted mode
/// of the chunk labels (a one-sided chunk should not outvote a longer
/// balanced one).
pub fn aggregate(mut results: Vec<ExtractionResult>) -> Aggregated {
    results.sort_by_key(|r| r.source_chunk_index);

    let sentiment = weighted_sentiment(&results);

    let mut aggregated = Aggregated {
        sentiment,
        ..Aggregated::default()
    };
    for result in results {
        aggregated.entities.extend(result.entities);
        aggregated.relationships.extend(result.relationships);
        aggregated.topics.extend(result.topics);
        aggregated.key_moments.extend(result.key_moments);
    }

    // chunk order already approximates time order; the stable sort fixes
    // items the service timestamped out of band
    aggregated
        .topics
        .sort_by_key(|t| t.start_ms.unwrap_or(u64::MAX));
    aggregated.key_moments.sort_by_key(|m| m.timestamp_ms);

    info!(
        "Aggregated {} entities, {} relationships, {} topics, {} key moments",
        aggregated.entities.len(),
        aggregated.relationships.len(),
        aggregated.topics.len(),
        aggregated.key_moments.len()
    );

    aggregated
}

/// Char-length-weighted mode over chunk sentiment labels. Ties go to the
/// label that appeared in the earlier chunk. Confidence is the weighted
/// average among chunks carrying the winning label.
fn weighted_sentiment(results: &[ExtractionResult]) -> Option<Sentiment> {
    let mut weights: HashMap<SentimentLabel, (u64, usize)> = HashMap::new();

    for (order, result) in results.iter().enumerate() {
        let Some(sentiment) = result.sentiment else {
            continue;
        };
        let weight = result.chunk_char_count.max(1) as u64;
        let entry = weights.entry(sentiment.overall).or_insert((0, order));
        entry.0 += weight;
    }

    let (&winner, &(winner_weight, _)) = weights
        .iter()
        .max_by(|(_, (wa, fa)), (_, (wb, fb))| wa.cmp(wb).then(fb.cmp(fa)))?;

    let mut confidence_sum = 0.0f64;
    for result in results {
        let Some(sentiment) = result.sentiment else {
            continue;
        };
        if sentiment.overall == winner {
            let weight = result.chunk_char_count.max(1) as f64;
            confidence_sum += sentiment.confidence as f64 * weight;
        }
    }

    Some(Sentiment {
        overall: winner,
        confidence: (confidence_sum / winner_weight as f64) as f32,
    })
}
