use std::path::Path;

use anyhow::{Context, Result};

use crate::models::{DiarizedTranscript, DiarizerDocument};

/// Parse a diarizer JSON file into a DiarizedTranscript
pub fn parse_diarizer_file(path: &Path) -> Result<DiarizedTranscript> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_diarizer_json(&content)
}

/// Parse a diarizer JSON string into a DiarizedTranscript
pub fn parse_diarizer_json(json: &str) -> Result<DiarizedTranscript> {
    let document: DiarizerDocument =
        serde_json::from_str(json).context("Failed to parse diarizer JSON")?;
    Ok(document.into_transcript())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diarizer_json() {
        let json = r#"{
            "segments": [
                {"start": 0.0, "end": 4.5, "speaker": "SPEAKER_00", "text": "Good evening and welcome."},
                {"start": 4.5, "end": 9.0, "speaker": "SPEAKER_01", "text": "Glad to be here."},
                {"start": 9.0, "end": 12.0, "speaker": "SPEAKER_00", "text": "Let's get started."}
            ],
            "speaker_embeddings": {
                "SPEAKER_00": [0.5, 0.5],
                "SPEAKER_01": [-0.5, 0.5]
            },
            "language": "en"
        }"#;

        let transcript = parse_diarizer_json(json).unwrap();

        assert_eq!(transcript.segments.len(), 3);
        assert_eq!(transcript.speakers, vec!["SPEAKER_00", "SPEAKER_01"]);
        assert_eq!(transcript.segments[1].start_ms, 4500);
        assert_eq!(transcript.detected_language.as_deref(), Some("en"));
        assert_eq!(transcript.speaker_embeddings.len(), 2);
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(parse_diarizer_json("not json").is_err());
        assert!(parse_diarizer_json("{}").is_err());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diarized.json");
        std::fs::write(
            &path,
            r#"{"segments": [{"start": 1.0, "end": 2.0, "speaker": "SPEAKER_00", "text": "hello"}]}"#,
        )
        .unwrap();

        let transcript = parse_diarizer_file(&path).unwrap();
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].text, "hello");

        assert!(parse_diarizer_file(&dir.path().join("missing.json")).is_err());
    }
}
