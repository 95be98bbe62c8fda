use chrono::Utc;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::error::EngineError;
use crate::extract::backend::{ExtractionBackend, ExtractionContext, SpeakerVerifier};
use crate::models::{
    CostReport, DiagnosticEvent, Diagnostics, DiarizedTranscript, IntelligenceReport,
    PricingSchedule, TranscriptMetadata,
};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::chunker::{chunk_segments, ChunkerConfig};
use crate::pipeline::dispatch::{dispatch_chunks, DispatchConfig};
use crate::pipeline::normalize::{normalize_entities, NormalizerConfig};
use crate::pipeline::speakers::{correct_speakers, SpeakerConfig};

/// Top-level configuration for one run
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub chunker: ChunkerConfig,
    pub dispatch: DispatchConfig,
    pub normalizer: NormalizerConfig,
    pub speakers: SpeakerConfig,
    pub pricing: PricingSchedule,
}

/// Run the full pipeline over one transcript: chunk, extract concurrently,
/// aggregate, deduplicate entities, correct speaker clusters and price the
/// run.
///
/// Chunk-level failures degrade rather than abort; the report's
/// `incomplete` flag and diagnostics say what was lost. Flipping `cancel`
/// stops chunks that have not been dispatched yet and the report covers
/// whatever finished.
pub async fn process<B, V>(
    transcript: &DiarizedTranscript,
    metadata: TranscriptMetadata,
    backend: &B,
    verifier: Option<&V>,
    config: &EngineConfig,
    cancel: &watch::Receiver<bool>,
) -> Result<IntelligenceReport, EngineError>
where
    B: ExtractionBackend,
    V: SpeakerVerifier,
{
    if transcript.segments.is_empty() {
        return Err(EngineError::InvalidTranscript(
            "transcript has no segments".to_string(),
        ));
    }

    let mut metadata = metadata;
    if metadata.duration_ms == 0 {
        metadata.duration_ms = transcript.duration_ms();
    }

    let chunks = chunk_segments(&transcript.segments, &config.chunker);
    info!(
        "Chunked {} segments ({} chars) into {} chunks",
        transcript.segments.len(),
        transcript.char_count(),
        chunks.len()
    );

    let speaker_result = correct_speakers(transcript, verifier, &config.speakers).await;

    let context = ExtractionContext {
        metadata: metadata.clone(),
        language: transcript.detected_language.clone(),
    };
    let dispatched = dispatch_chunks(
        &chunks,
        backend,
        &context,
        &config.pricing,
        &config.dispatch,
        cancel,
    )
    .await;

    let aggregated = aggregate(dispatched.results);
    let normalized = normalize_entities(
        aggregated.entities,
        aggregated.relationships,
        &config.normalizer,
    );

    let mut key_moments = aggregated.key_moments;
    for moment in &mut key_moments {
        moment.speaker = transcript
            .speaker_at(moment.timestamp_ms)
            .and_then(|raw| speaker_result.map.resolve(raw))
            .map(String::from);
    }

    let cost_report = CostReport::from_records(&dispatched.cost_records);

    let mut diagnostics = Diagnostics::default();
    for (index, reason) in dispatched.degraded {
        diagnostics.push(DiagnosticEvent::DegradedChunk { index, reason });
    }
    for (entity, predicate) in normalized.self_relationships_dropped {
        diagnostics.push(DiagnosticEvent::DroppedSelfRelationship { entity, predicate });
    }
    for label in speaker_result.low_confidence {
        diagnostics.push(DiagnosticEvent::LowConfidenceSpeaker { label });
    }

    let incomplete =
        diagnostics.degraded_chunk_count() > 0 || dispatched.cancelled_chunks > 0;

    let report = IntelligenceReport {
        run_id: Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        metadata,
        entities: normalized.entities,
        relationships: normalized.relationships,
        topics: aggregated.topics,
        key_moments,
        sentiment: aggregated.sentiment,
        speaker_map: speaker_result.map,
        cost_report,
        diagnostics,
        incomplete,
    };

    info!(
        "Run {}: {} entities ({} merged), {} relationships, {} topics, {} key moments, ${:.4}",
        report.run_id,
        report.entities.len(),
        normalized.merges_performed,
        report.relationships.len(),
        report.topics.len(),
        report.key_moments.len(),
        report.cost_report.total_cost_usd
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::backend::{ScriptedBackend, ScriptedVerifier};
    use crate::models::{TokenUsage, TranscriptSegment};
    use serde_json::json;

    fn transcript() -> DiarizedTranscript {
        DiarizedTranscript::from_segments(vec![
            TranscriptSegment {
                start_ms: 0,
                end_ms: 30_000,
                speaker: "SPEAKER_00".to_string(),
                text: "The committee approved the measure this morning.".to_string(),
                overlapped: false,
            },
            TranscriptSegment {
                start_ms: 30_000,
                end_ms: 60_000,
                speaker: "SPEAKER_01".to_string(),
                text: "That cannot be the whole story.".to_string(),
                overlapped: false,
            },
        ])
    }

    fn payload() -> serde_json::Value {
        json!({
            "entities": [{
                "name": "the committee",
                "category": "organization",
                "confidence": 0.8,
                "evidence_quote": "The committee approved the measure"
            }],
            "relationships": [],
            "topics": [{"name": "procedure", "relevance": 0.6}],
            "key_moments": [{
                "timestamp_ms": 31_000,
                "description": "Pushback on the announcement",
                "significance": 0.7
            }],
            "sentiment": {"overall": "neutral", "confidence": 0.9}
        })
    }

    fn idle_cancel() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn test_process_empty_transcript_rejected() {
        let backend = ScriptedBackend::new();
        let result = process(
            &DiarizedTranscript::default(),
            TranscriptMetadata::default(),
            &backend,
            None::<&ScriptedVerifier>,
            &EngineConfig::default(),
            &idle_cancel(),
        )
        .await;

        assert!(matches!(result, Err(EngineError::InvalidTranscript(_))));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_process_end_to_end() {
        let backend = ScriptedBackend::new().with_payload(0, payload());

        let report = process(
            &transcript(),
            TranscriptMetadata::default(),
            &backend,
            None::<&ScriptedVerifier>,
            &EngineConfig::default(),
            &idle_cancel(),
        )
        .await
        .unwrap();

        assert!(!report.incomplete);
        assert!(!report.run_id.is_empty());
        assert_eq!(report.metadata.duration_ms, 60_000);
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].canonical_name, "the committee");
        assert_eq!(report.topics.len(), 1);
        // a topic without timestamps inherits its chunk's start
        assert_eq!(report.topics[0].start_ms, Some(0));
        assert_eq!(report.cost_report.standard_chunks, 1);
        assert!(report.diagnostics.is_empty());
        assert!(report.speaker_map.is_partition_of(&["SPEAKER_00".to_string(), "SPEAKER_01".to_string()]));
    }

    #[tokio::test]
    async fn test_process_attributes_key_moments_to_merged_speakers() {
        let backend = ScriptedBackend::new().with_payload(0, payload());

        let report = process(
            &transcript(),
            TranscriptMetadata::default(),
            &backend,
            None::<&ScriptedVerifier>,
            &EngineConfig::default(),
            &idle_cancel(),
        )
        .await
        .unwrap();

        // 31s falls inside SPEAKER_01's segment, which maps to S1
        assert_eq!(report.key_moments.len(), 1);
        assert_eq!(report.key_moments[0].speaker.as_deref(), Some("S1"));
    }

    #[tokio::test]
    async fn test_process_cancelled_before_start() {
        let backend = ScriptedBackend::new();
        let (_tx, rx) = watch::channel(true);

        let report = process(
            &transcript(),
            TranscriptMetadata::default(),
            &backend,
            None::<&ScriptedVerifier>,
            &EngineConfig::default(),
            &rx,
        )
        .await
        .unwrap();

        assert!(report.incomplete);
        assert_eq!(backend.call_count(), 0);
        assert!(report.entities.is_empty());
        // speaker correction is local and still runs
        assert_eq!(report.speaker_map.merged_count(), 2);
    }

    fn entity_payload(name: &str) -> serde_json::Value {
        json!({
            "entities": [{
                "name": name,
                "category": "person",
                "confidence": 0.9,
                "evidence_quote": format!("{name} was mentioned")
            }],
            "relationships": [],
            "topics": [],
            "key_moments": []
        })
    }

    fn long_transcript(chunks: usize) -> DiarizedTranscript {
        let segments: Vec<TranscriptSegment> = (0..chunks)
            .map(|i| TranscriptSegment {
                start_ms: i as u64 * 60_000,
                end_ms: i as u64 * 60_000 + 50_000,
                speaker: "SPEAKER_00".to_string(),
                text: "x".repeat(400),
                overlapped: false,
            })
            .collect();
        DiarizedTranscript::from_segments(segments)
    }

    // per-chunk segments are 400 chars, so this forces one segment per chunk
    fn small_chunk_config() -> EngineConfig {
        EngineConfig {
            chunker: ChunkerConfig { max_chars: 450 },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_degraded_chunk_keeps_rest_of_run() {
        let transcript = long_transcript(5);
        let attempt_usage = TokenUsage {
            input_tokens: 700,
            output_tokens: 50,
            cached_tokens: 0,
        };
        // chunk 2 returns unusable payloads on both attempts
        let backend = ScriptedBackend::new()
            .with_payload(0, entity_payload("Alice Martin"))
            .with_payload(1, entity_payload("Beatrice Chen"))
            .with_usage(2, json!({"nonsense": 1}), attempt_usage)
            .with_usage(2, json!({"nonsense": 1}), attempt_usage)
            .with_payload(3, entity_payload("Alice Martin"))
            .with_payload(4, entity_payload("Dmitri Petrov"));

        let report = process(
            &transcript,
            TranscriptMetadata::default(),
            &backend,
            None::<&ScriptedVerifier>,
            &small_chunk_config(),
            &idle_cancel(),
        )
        .await
        .unwrap();

        assert_eq!(backend.call_count(), 6);
        assert!(report.incomplete);
        assert_eq!(report.diagnostics.degraded_chunk_count(), 1);
        assert!(report
            .diagnostics
            .events
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::DegradedChunk { index: 2, .. })));
        // the four healthy chunks still contribute, deduplicated
        assert_eq!(report.entities.len(), 3);
        let alice = report
            .entities
            .iter()
            .find(|e| e.canonical_name == "Alice Martin")
            .unwrap();
        assert_eq!(alice.mention_count, 2);
        // both failed attempts are billed alongside the healthy chunks
        assert_eq!(report.cost_report.total_input_tokens, 4 * 1000 + 2 * 700);
    }

    #[tokio::test]
    async fn test_alias_merge_across_chunks() {
        let transcript = long_transcript(2);
        let backend = ScriptedBackend::new()
            .with_payload(
                0,
                json!({
                    "entities": [{
                        "name": "UN",
                        "category": "organization",
                        "confidence": 0.7,
                        "evidence_quote": "the UN convened an emergency session"
                    }],
                    "relationships": [],
                    "topics": [],
                    "key_moments": []
                }),
            )
            .with_payload(
                1,
                json!({
                    "entities": [{
                        "name": "United Nations",
                        "category": "organization",
                        "confidence": 0.9,
                        "evidence_quote": "United Nations observers confirmed"
                    }],
                    "relationships": [],
                    "topics": [],
                    "key_moments": []
                }),
            );

        let report = process(
            &transcript,
            TranscriptMetadata::default(),
            &backend,
            None::<&ScriptedVerifier>,
            &small_chunk_config(),
            &idle_cancel(),
        )
        .await
        .unwrap();

        assert!(!report.incomplete);
        assert_eq!(report.entities.len(), 1);
        let entity = &report.entities[0];
        assert_eq!(entity.canonical_name, "United Nations");
        assert!((entity.confidence - 0.9).abs() < 1e-6);
        assert!(entity.aliases.contains("UN"));
        assert_eq!(entity.mention_count, 2);
    }

    #[tokio::test]
    async fn test_speaker_correction_end_to_end() {
        let labels = [
            "SPEAKER_00",
            "SPEAKER_01",
            "SPEAKER_02",
            "SPEAKER_03",
            "SPEAKER_04",
            "SPEAKER_05",
        ];
        let segments: Vec<TranscriptSegment> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| TranscriptSegment {
                start_ms: i as u64 * 20_000,
                end_ms: i as u64 * 20_000 + 15_000,
                speaker: label.to_string(),
                text: format!("extended remarks from position {i} in the discussion"),
                overlapped: false,
            })
            .collect();
        let mut transcript = DiarizedTranscript::from_segments(segments);
        for (label, embedding) in [
            ("SPEAKER_00", vec![1.0, 0.0]),
            ("SPEAKER_01", vec![0.0, 1.0]),
            ("SPEAKER_02", vec![-1.0, 0.0]),
            ("SPEAKER_03", vec![0.99, 0.05]),
            ("SPEAKER_04", vec![0.0, -1.0]),
            ("SPEAKER_05", vec![0.7, -0.7]),
        ] {
            transcript
                .speaker_embeddings
                .insert(label.to_string(), embedding);
        }

        let backend = ScriptedBackend::new().with_payload(0, entity_payload("Moderator"));
        // embeddings merged 00+03; the verifier recognizes 01+04 as one voice
        let verifier = ScriptedVerifier::with_groups(vec![vec![
            "SPEAKER_01".to_string(),
            "SPEAKER_04".to_string(),
        ]]);

        let report = process(
            &transcript,
            TranscriptMetadata::default(),
            &backend,
            Some(&verifier),
            &EngineConfig::default(),
            &idle_cancel(),
        )
        .await
        .unwrap();

        assert_eq!(verifier.call_count(), 1);
        let map = &report.speaker_map;
        assert_eq!(map.merged_count(), 4);
        assert_eq!(map.resolve("SPEAKER_00"), map.resolve("SPEAKER_03"));
        assert_eq!(map.resolve("SPEAKER_01"), map.resolve("SPEAKER_04"));
        assert_eq!(map.resolve("SPEAKER_00"), Some("S0"));
        assert_eq!(map.resolve("SPEAKER_02"), Some("S2"));
        assert_eq!(map.resolve("SPEAKER_05"), Some("S3"));
        let all: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        assert!(map.is_partition_of(&all));
    }
}
