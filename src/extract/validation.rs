use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::EngineError;
use crate::models::{
    Chunk, ExtractionResult, KeyMoment, RawEntity, RawRelationship, Sentiment, Topic,
};

/// Wire shape of the record_intelligence tool input.
///
/// The `entities` key must be present (a conforming response always has it);
/// everything else defaults. Elements are parsed one at a time so a single
/// bad item drops that item, not the chunk.
#[derive(Deserialize)]
struct RawPayload {
    entities: Vec<Value>,
    #[serde(default)]
    relationships: Vec<Value>,
    #[serde(default)]
    topics: Vec<Value>,
    #[serde(default)]
    key_moments: Vec<Value>,
    #[serde(default)]
    sentiment: Option<Value>,
}

/// Convert a raw tool payload into a typed, sanitized ExtractionResult.
///
/// Confidence-class scores are clamped to [0, 1], names are trimmed, and the
/// chunk index is stamped on every entity. A payload that does not match the
/// schema at the top level is a MalformedResponse (retryable).
pub fn parse_extraction(payload: &Value, chunk: &Chunk) -> Result<ExtractionResult, EngineError> {
    let raw: RawPayload = serde_json::from_value(payload.clone()).map_err(|e| {
        EngineError::MalformedResponse(format!("tool input does not match schema: {e}"))
    })?;

    let mut dropped = 0usize;

    let mut entities = Vec::new();
    for value in raw.entities {
        match serde_json::from_value::<RawEntity>(value) {
            Ok(mut entity) if !entity.name.trim().is_empty() => {
                entity.name = entity.name.trim().to_string();
                entity.confidence = entity.confidence.clamp(0.0, 1.0);
                entity.source_chunk = chunk.index;
                entities.push(entity);
            }
            _ => dropped += 1,
        }
    }

    let mut relationships = Vec::new();
    for value in raw.relationships {
        match serde_json::from_value::<RawRelationship>(value) {
            Ok(mut rel)
                if !rel.subject.trim().is_empty()
                    && !rel.predicate.trim().is_empty()
                    && !rel.object.trim().is_empty() =>
            {
                rel.subject = rel.subject.trim().to_string();
                rel.predicate = rel.predicate.trim().to_string();
                rel.object = rel.object.trim().to_string();
                rel.confidence = rel.confidence.clamp(0.0, 1.0);
                relationships.push(rel);
            }
            _ => dropped += 1,
        }
    }

    let mut topics = Vec::new();
    for value in raw.topics {
        match serde_json::from_value::<Topic>(value) {
            Ok(mut topic) if !topic.name.trim().is_empty() => {
                topic.name = topic.name.trim().to_string();
                topic.relevance = topic.relevance.clamp(0.0, 1.0);
                if topic.start_ms.is_none() {
                    topic.start_ms = Some(chunk.start_ms());
                }
                topics.push(topic);
            }
            _ => dropped += 1,
        }
    }

    let mut key_moments = Vec::new();
    for value in raw.key_moments {
        match serde_json::from_value::<KeyMoment>(value) {
            Ok(mut moment) if !moment.description.trim().is_empty() => {
                moment.description = moment.description.trim().to_string();
                moment.significance = moment.significance.clamp(0.0, 1.0);
                key_moments.push(moment);
            }
            _ => dropped += 1,
        }
    }

    let sentiment = match raw.sentiment {
        Some(value) => match serde_json::from_value::<Sentiment>(value) {
            Ok(mut sentiment) => {
                sentiment.confidence = sentiment.confidence.clamp(0.0, 1.0);
                Some(sentiment)
            }
            Err(_) => {
                dropped += 1;
                None
            }
        },
        None => None,
    };

    if dropped > 0 {
        warn!(
            "chunk {}: dropped {} malformed extraction items",
            chunk.index, dropped
        );
    }

    Ok(ExtractionResult {
        source_chunk_index: chunk.index,
        chunk_char_count: chunk.char_count,
        entities,
        relationships,
        topics,
        key_moments,
        sentiment,
        degraded: false,
    })
}

#[derive(Deserialize)]
struct RawGroups {
    groups: Vec<Vec<String>>,
}

/// Parse the record_speaker_groups tool payload
pub fn parse_speaker_groups(payload: &Value) -> Result<Vec<Vec<String>>, EngineError> {
    let raw: RawGroups = serde_json::from_value(payload.clone()).map_err(|e| {
        EngineError::MalformedResponse(format!("speaker groups do not match schema: {e}"))
    })?;
    Ok(raw.groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityCategory, SentimentLabel, TranscriptSegment};

    fn chunk() -> Chunk {
        Chunk::new(
            2,
            vec![TranscriptSegment {
                start_ms: 10_000,
                end_ms: 20_000,
                speaker: "SPEAKER_00".to_string(),
                text: "We spoke with Dr. Amara Okafor about the treaty.".to_string(),
                overlapped: false,
            }],
        )
    }

    #[test]
    fn test_parse_full_payload() {
        let payload = serde_json::json!({
            "entities": [
                {"name": "  Amara Okafor ", "category": "person", "confidence": 0.92, "timestamp_ms": 12_000},
                {"name": "the treaty", "category": "some_new_thing", "confidence": 0.6}
            ],
            "relationships": [
                {"subject": "Amara Okafor", "predicate": "negotiated", "object": "the treaty", "confidence": 0.8}
            ],
            "topics": [
                {"name": "treaty negotiations", "relevance": 0.9}
            ],
            "key_moments": [
                {"timestamp_ms": 15_000, "description": "signing announced", "significance": 0.85}
            ],
            "sentiment": {"overall": "positive", "confidence": 0.7}
        });

        let result = parse_extraction(&payload, &chunk()).unwrap();
        assert!(!result.degraded);
        assert_eq!(result.source_chunk_index, 2);

        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.entities[0].name, "Amara Okafor");
        assert_eq!(result.entities[0].source_chunk, 2);
        assert_eq!(result.entities[1].category, EntityCategory::Other);

        assert_eq!(result.relationships.len(), 1);
        // topic without start_ms inherits the chunk's start
        assert_eq!(result.topics[0].start_ms, Some(10_000));
        assert_eq!(result.key_moments.len(), 1);
        assert_eq!(result.sentiment.unwrap().overall, SentimentLabel::Positive);
    }

    #[test]
    fn test_missing_entities_is_malformed() {
        let payload = serde_json::json!({"topics": []});
        let result = parse_extraction(&payload, &chunk());
        assert!(matches!(result, Err(EngineError::MalformedResponse(_))));

        let not_an_object = serde_json::json!("just a string");
        assert!(parse_extraction(&not_an_object, &chunk()).is_err());
    }

    #[test]
    fn test_bad_elements_dropped_not_fatal() {
        let payload = serde_json::json!({
            "entities": [
                42,
                {"name": "   ", "category": "person", "confidence": 0.9},
                {"name": "Kemi", "category": "person", "confidence": 0.9}
            ],
            "relationships": [
                {"subject": "Kemi", "predicate": "", "object": "x", "confidence": 0.5}
            ]
        });

        let result = parse_extraction(&payload, &chunk()).unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "Kemi");
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn test_confidence_clamped() {
        let payload = serde_json::json!({
            "entities": [
                {"name": "a", "category": "other", "confidence": 1.7},
                {"name": "b", "category": "other", "confidence": -0.2}
            ]
        });

        let result = parse_extraction(&payload, &chunk()).unwrap();
        assert_eq!(result.entities[0].confidence, 1.0);
        assert_eq!(result.entities[1].confidence, 0.0);
    }

    #[test]
    fn test_unparseable_sentiment_becomes_none() {
        let payload = serde_json::json!({
            "entities": [],
            "sentiment": {"overall": "furious", "confidence": 0.9}
        });
        let result = parse_extraction(&payload, &chunk()).unwrap();
        assert!(result.sentiment.is_none());
        assert!(!result.degraded);
    }

    #[test]
    fn test_parse_speaker_groups() {
        let payload = serde_json::json!({
            "groups": [["SPEAKER_00", "SPEAKER_04"], ["SPEAKER_02"]]
        });
        let groups = parse_speaker_groups(&payload).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec!["SPEAKER_00", "SPEAKER_04"]);

        let bad = serde_json::json!({"groups": "SPEAKER_00"});
        assert!(matches!(
            parse_speaker_groups(&bad),
            Err(EngineError::MalformedResponse(_))
        ));
    }
}
