pub mod error;
pub mod extract;
pub mod io;
pub mod models;
pub mod pipeline;

pub use error::EngineError;
pub use extract::{ExtractionBackend, ExtractionConfig, HttpExtractionClient, SpeakerVerifier};
pub use io::{parse_diarizer_file, parse_diarizer_json, write_report_json, ReportDigest};
pub use models::{DiarizedTranscript, IntelligenceReport, PricingSchedule, TranscriptMetadata};
pub use pipeline::{
    process, ChunkerConfig, DispatchConfig, EngineConfig, NormalizerConfig, SpeakerConfig,
};
