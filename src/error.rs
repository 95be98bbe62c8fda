use thiserror::Error;

/// Errors surfaced by the intelligence aggregation engine.
///
/// Per-chunk and per-speaker failures are recovered locally (the chunk or
/// speaker is degraded and processing continues); only `FatalConfig` aborts
/// a run. The transient/malformed variants exist so the dispatcher can
/// decide what is worth retrying.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Timeout or 5xx from the extraction collaborator. Retried once.
    #[error("transient service error: {0}")]
    TransientService(String),

    /// Response did not match the requested schema. Retried once with the
    /// identical request.
    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    /// Non-retryable rejection from the collaborator (4xx other than 429).
    #[error("extraction request rejected: {status} - {body}")]
    Rejected { status: u16, body: String },

    /// Missing credentials or otherwise unusable configuration. Surfaced
    /// immediately; no partial processing is attempted.
    #[error("configuration error: {0}")]
    FatalConfig(String),

    /// Input transcript could not be used (empty, unordered, etc.).
    #[error("invalid transcript: {0}")]
    InvalidTranscript(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the dispatcher should retry the same request once more.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::TransientService(_) | EngineError::MalformedResponse(_)
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            EngineError::TransientService(e.to_string())
        } else {
            EngineError::MalformedResponse(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retryable() {
        let err = EngineError::TransientService("504 gateway timeout".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_malformed_is_retryable() {
        let err = EngineError::MalformedResponse("missing entities field".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_fatal_config_is_not_retryable() {
        let err = EngineError::FatalConfig("COLLOQUY_API_KEY not set".to_string());
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "configuration error: COLLOQUY_API_KEY not set"
        );
    }

    #[test]
    fn test_rejected_display() {
        let err = EngineError::Rejected {
            status: 400,
            body: "invalid model".to_string(),
        };
        assert!(err.to_string().contains("400"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: EngineError = parse_err.into();
        assert!(matches!(err, EngineError::Serialization(_)));
    }
}
