use crate::models::{Chunk, SpeakerSample, TranscriptMetadata};
use crate::models::chunk::format_timestamp;

/// Tool the extraction service must call with its findings
pub const TOOL_NAME: &str = "record_intelligence";

/// Tool the verification service must call with speaker groupings
pub const SPEAKER_TOOL_NAME: &str = "record_speaker_groups";

/// System prompt for chunk extraction (non-negotiable constraints)
pub const SYSTEM_PROMPT: &str = r#"You are an intelligence analyst processing one chunk of a diarized conversation transcript. You MUST follow these rules:

1. Extract only what the transcript supports. Never invent entities, relationships, or events.
2. Evidence quotes MUST be verbatim substrings of the transcript text.
3. Timestamps are in milliseconds and MUST fall inside this chunk's time range.
4. Use only the listed entity categories. If none fits, use "other".
5. Confidence scores are in [0, 1] and reflect how clearly the transcript supports the item.
6. Speaker labels are machine-assigned cluster names, not identities. Do not treat two labels as different people or the same person.
7. Respond by calling the record_intelligence tool. Output MUST match its schema.

ENTITY CATEGORIES:
person, organization, location, event, product, date, money, law, work, technology, medical, sport, food, language, nationality, religion, title, other

GUIDANCE:
- Report each distinct entity once per chunk with its clearest mention.
- Relationships connect entity names exactly as you reported them.
- Topics cover stretches of discussion; key moments are single notable points.
- Sentiment describes the overall tone of this chunk only."#;

/// Build the user prompt for one chunk
pub fn build_chunk_prompt(
    chunk: &Chunk,
    metadata: &TranscriptMetadata,
    language: Option<&str>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("# Transcript chunk {}\n", chunk.index));
    prompt.push_str(&format!(
        "Time range: {} - {}\n",
        format_timestamp(chunk.start_ms()),
        format_timestamp(chunk.end_ms())
    ));
    if let Some(title) = &metadata.title {
        prompt.push_str(&format!("Recording: {title}\n"));
    }
    if let Some(source) = &metadata.source {
        prompt.push_str(&format!("Source: {source}\n"));
    }
    if let Some(language) = language {
        prompt.push_str(&format!("Language: {language}\n"));
    }
    prompt.push('\n');

    prompt.push_str("## Transcript\n");
    prompt.push_str(&chunk.transcript_text());
    prompt.push('\n');

    prompt.push_str("## Instructions\n");
    prompt.push_str("Extract entities, relationships, topics, key moments, and overall sentiment from this chunk.\n");
    prompt.push_str("Report entity names verbatim as spoken; do not normalize or expand them.\n");
    prompt.push_str("Submit your findings with the record_intelligence tool.\n");

    prompt
}

/// Input schema for the record_intelligence tool (the fixed extraction shape)
pub fn intelligence_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "category": {
                            "type": "string",
                            "enum": ["person", "organization", "location", "event", "product", "date", "money", "law", "work", "technology", "medical", "sport", "food", "language", "nationality", "religion", "title", "other"]
                        },
                        "confidence": {"type": "number"},
                        "evidence_quote": {"type": "string"},
                        "timestamp_ms": {"type": "integer"}
                    },
                    "required": ["name", "category", "confidence"]
                }
            },
            "relationships": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "subject": {"type": "string"},
                        "predicate": {"type": "string"},
                        "object": {"type": "string"},
                        "confidence": {"type": "number"},
                        "evidence_quote": {"type": "string"}
                    },
                    "required": ["subject", "predicate", "object", "confidence"]
                }
            },
            "topics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "relevance": {"type": "number"},
                        "start_ms": {"type": "integer"},
                        "end_ms": {"type": "integer"},
                        "sentiment": {
                            "type": "string",
                            "enum": ["positive", "negative", "neutral", "mixed"]
                        }
                    },
                    "required": ["name", "relevance"]
                }
            },
            "key_moments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "timestamp_ms": {"type": "integer"},
                        "description": {"type": "string"},
                        "significance": {"type": "number"}
                    },
                    "required": ["timestamp_ms", "description", "significance"]
                }
            },
            "sentiment": {
                "type": "object",
                "properties": {
                    "overall": {
                        "type": "string",
                        "enum": ["positive", "negative", "neutral", "mixed"]
                    },
                    "confidence": {"type": "number"}
                },
                "required": ["overall", "confidence"]
            }
        },
        "required": ["entities", "relationships", "topics", "key_moments", "sentiment"]
    })
}

/// System prompt for the speaker verification pass
pub const SPEAKER_SYSTEM_PROMPT: &str = r#"You are comparing speech samples from a diarized recording. Each sample comes from one speaker cluster the diarizer kept separate. You MUST follow these rules:

1. Group two clusters together ONLY if their samples clearly come from the same person (vocabulary, phrasing, role in the conversation, self-references).
2. When uncertain, keep clusters separate. A missed merge is recoverable; a wrong merge is not.
3. A cluster may appear in at most one group. Clusters you do not mention stay separate.
4. Respond by calling the record_speaker_groups tool."#;

/// Build the user prompt listing one sample per remaining cluster
pub fn build_speaker_prompt(samples: &[SpeakerSample]) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "# Speaker samples ({} clusters)\n\n",
        samples.len()
    ));
    for sample in samples {
        prompt.push_str(&format!(
            "## {} ({}s{})\n",
            sample.label,
            sample.duration_ms() / 1000,
            if sample.overlapped {
                ", overlapped speech"
            } else {
                ""
            }
        ));
        prompt.push_str(&sample.text);
        prompt.push_str("\n\n");
    }

    prompt.push_str("## Instructions\n");
    prompt.push_str("Decide which clusters are the same person. ");
    prompt.push_str("Submit groups of cluster labels with the record_speaker_groups tool.\n");

    prompt
}

/// Input schema for the record_speaker_groups tool
pub fn speaker_groups_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "groups": {
                "type": "array",
                "items": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Cluster labels that belong to the same person"
                }
            }
        },
        "required": ["groups"]
    })
}
