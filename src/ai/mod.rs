//! Gemini generateContent client
//!
//! Thin typed client for the Google Generative Language REST API. The
//! request carries a bounded output size, JSON response MIME type, and
//! content-safety settings at a fixed threshold; the response handling
//! surfaces blocked prompts as a typed error carrying the block reason.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;

const GENERATION_TEMPERATURE: f64 = 0.7;
const GENERATION_TOP_P: f64 = 0.95;
const GENERATION_TOP_K: u32 = 40;
const GENERATION_MAX_OUTPUT_TOKENS: u32 = 1024;
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Errors from the generative model boundary
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI API key is not configured")]
    MissingApiKey,

    #[error("network error calling AI provider: {0}")]
    Network(#[from] reqwest::Error),

    #[error("AI provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("AI model response empty/blocked: {reason}")]
    Blocked { reason: String },

    #[error("malformed AI provider response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

/// Text reply from the model, together with the raw payload for auditing.
#[derive(Debug, Clone)]
pub struct AiReply {
    pub text: String,
    pub raw: JsonValue,
}

/// Client for the Gemini generateContent endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client from application configuration. Returns an error if
    /// no API key is configured.
    pub fn new(config: &AppConfig) -> Result<Self, AiError> {
        let api_key = config
            .gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AiError::MissingApiKey)?;

        Ok(Self::with_api_base(
            &config.gemini_api_base,
            api_key,
            &config.gemini_model,
        ))
    }

    /// Create a client against an explicit API base (used by tests to point
    /// at a mock server).
    pub fn with_api_base(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Name of the configured model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a prompt and return the model's text reply.
    ///
    /// Fails with [`AiError::Blocked`] when no candidate content came back,
    /// carrying the block reason when the provider reported one.
    pub async fn generate(&self, prompt: &str) -> Result<AiReply, AiError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: GENERATION_TEMPERATURE,
                top_p: GENERATION_TOP_P,
                top_k: GENERATION_TOP_K,
                max_output_tokens: GENERATION_MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json",
            },
            safety_settings: SAFETY_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: SAFETY_THRESHOLD,
                })
                .collect(),
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );
        debug!(model = %self.model, "Calling generative model");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let raw: JsonValue = serde_json::from_str(&body)?;
        let parsed: GenerateContentResponse = serde_json::from_value(raw.clone())?;

        let text = extract_text(&parsed);
        match text {
            Some(text) => Ok(AiReply { text, raw }),
            None => Err(AiError::Blocked {
                reason: block_reason(&parsed),
            }),
        }
    }
}

fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();

    if text.is_empty() { None } else { Some(text) }
}

fn block_reason(response: &GenerateContentResponse) -> String {
    response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| {
            feedback
                .block_reason_message
                .clone()
                .or_else(|| feedback.block_reason.clone())
        })
        .unwrap_or_else(|| "Unknown reason".to_string())
}
