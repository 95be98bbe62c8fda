use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::extract::backend::{
    ExtractionBackend, ExtractionContext, ExtractionOutcome, SpeakerVerifier,
};
use crate::extract::{prompts, validation};
use crate::models::{Chunk, SpeakerSample, TokenUsage};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Configuration for the extraction service client
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// API key (from COLLOQUY_API_KEY env var)
    pub api_key: String,
    /// Model to use
    pub model: String,
    /// Service base URL (override for proxies and test servers)
    pub base_url: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ExtractionConfig {
    /// Create config from environment variables.
    ///
    /// COLLOQUY_API_KEY is required; COLLOQUY_MODEL and COLLOQUY_BASE_URL
    /// override the defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        let api_key = std::env::var("COLLOQUY_API_KEY").map_err(|_| {
            EngineError::FatalConfig("COLLOQUY_API_KEY environment variable not set".to_string())
        })?;
        let model =
            std::env::var("COLLOQUY_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("COLLOQUY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key,
            model,
            base_url,
            max_tokens: 8192,
            temperature: 0.0,
            timeout_secs: 120,
        })
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 8192,
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

/// HTTP client for an Anthropic-style messages API with forced tool use.
///
/// Implements both service seams: chunk extraction and the speaker
/// verification pass.
pub struct HttpExtractionClient {
    http: Client,
    config: ExtractionConfig,
}

impl HttpExtractionClient {
    pub fn new(config: ExtractionConfig) -> Result<Self, EngineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::FatalConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Send one message with a forced tool choice and return the tool input
    /// payload plus usage.
    async fn send_tool_request(
        &self,
        system: &str,
        user: &str,
        tool_name: &str,
        tool_description: &str,
        schema: Value,
    ) -> Result<ExtractionOutcome, EngineError> {
        let request = ToolRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            tools: vec![Tool {
                name: tool_name.to_string(),
                description: tool_description.to_string(),
                input_schema: schema,
            }],
            tool_choice: Some(ToolChoice {
                choice_type: "tool".to_string(),
                name: tool_name.to_string(),
            }),
        };

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), body));
        }

        let api: ApiResponse = response.json().await?;
        let usage = map_usage(&api.usage);

        for content in &api.content {
            if content.content_type == "tool_use" && content.name.as_deref() == Some(tool_name) {
                if let Some(input) = &content.input {
                    return Ok(ExtractionOutcome {
                        payload: input.clone(),
                        usage,
                    });
                }
            }
        }

        Err(EngineError::MalformedResponse(format!(
            "no {tool_name} tool_use block in response"
        )))
    }
}

impl ExtractionBackend for HttpExtractionClient {
    async fn extract_chunk(
        &self,
        chunk: &Chunk,
        context: &ExtractionContext,
    ) -> Result<ExtractionOutcome, EngineError> {
        let user =
            prompts::build_chunk_prompt(chunk, &context.metadata, context.language.as_deref());
        self.send_tool_request(
            prompts::SYSTEM_PROMPT,
            &user,
            prompts::TOOL_NAME,
            "Record the intelligence extracted from this transcript chunk",
            prompts::intelligence_schema(),
        )
        .await
    }
}

impl SpeakerVerifier for HttpExtractionClient {
    async fn group_samples(
        &self,
        samples: &[SpeakerSample],
    ) -> Result<Vec<Vec<String>>, EngineError> {
        let user = prompts::build_speaker_prompt(samples);
        let outcome = self
            .send_tool_request(
                prompts::SPEAKER_SYSTEM_PROMPT,
                &user,
                prompts::SPEAKER_TOOL_NAME,
                "Record which speaker clusters belong to the same person",
                prompts::speaker_groups_schema(),
            )
            .await?;
        validation::parse_speaker_groups(&outcome.payload)
    }
}

/// 429 and 5xx are transient and worth retrying; other 4xx are
/// configuration-class rejections and are not.
fn error_for_status(status: u16, body: String) -> EngineError {
    if status == 429 || status >= 500 {
        EngineError::TransientService(format!("service returned {status}: {body}"))
    } else {
        EngineError::Rejected { status, body }
    }
}

/// The wire usage block reports cache reads separately from billed input;
/// internally input_tokens is the total prompt size.
fn map_usage(usage: &ApiUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.input_tokens + usage.cache_read_input_tokens,
        output_tokens: usage.output_tokens,
        cached_tokens: usage.cache_read_input_tokens,
    }
}

#[derive(Debug, Serialize)]
struct ToolRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}
