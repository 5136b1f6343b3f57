//! Google Gemini provider implementation for the taborg-providers crate.
//!
//! Only the non-streaming `generateContent` endpoint is used: the organizer
//! sends one prompt per run and needs the whole JSON answer before it can
//! touch any tab.
//!
//! # Usage
//!
//! ```rust,no_run
//! use taborg_providers::{CompletionRequest, GeminiProvider, LLMProvider};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = GeminiProvider::new(
//!         "your-api-key".to_string(),
//!         Some("gemini-2.0-flash".to_string()),
//!         None,
//!         None,
//!     )?;
//!
//!     let response = provider
//!         .complete(CompletionRequest::user_prompt("Hello!"))
//!         .await?;
//!     println!("Response: {}", response.content);
//!
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{CompletionRequest, CompletionResponse, LLMProvider, Message, MessageRole, Usage};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

// ============================================================================
// Provider Struct
// ============================================================================

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    name: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens,
            temperature,
            name: "gemini".to_string(),
        })
    }

    /// Point the provider at a different host (proxies, local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn get_api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// Same as `get_api_url` with the key masked, for logs.
    fn redacted_api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key=***",
            self.base_url, self.model
        )
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

/// Gemini API request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Gemini API response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

// ============================================================================
// Message Conversion
// ============================================================================

/// Convert messages to Gemini format.
///
/// A lone user turn is sent without a role so the body stays the minimal
/// `{"contents":[{"parts":[{"text":...}]}]}` shape.
fn convert_messages(messages: &[Message]) -> (Vec<GeminiContent>, Option<GeminiContent>) {
    let mut contents = Vec::new();
    let mut system_instruction = None;
    let single_turn = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .count()
        == 1;

    for msg in messages {
        let part = GeminiPart {
            text: Some(msg.content.clone()),
        };
        match msg.role {
            MessageRole::System => {
                system_instruction = Some(GeminiContent {
                    role: None,
                    parts: vec![part],
                });
            }
            MessageRole::User => {
                contents.push(GeminiContent {
                    role: if single_turn { None } else { Some("user".to_string()) },
                    parts: vec![part],
                });
            }
            MessageRole::Assistant => {
                // Gemini uses "model" instead of "assistant"
                contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts: vec![part],
                });
            }
        }
    }

    (contents, system_instruction)
}

/// Text of `candidates[0].content.parts[0]`, empty when any step is missing.
fn extract_first_text(response: &GeminiResponse) -> String {
    response
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.first())
        .and_then(|p| p.text.clone())
        .unwrap_or_default()
}

/// A 2xx body that is not a Gemini response reads as one without candidates.
fn parse_response(body: &str) -> GeminiResponse {
    serde_json::from_str(body).unwrap_or_else(|e| {
        warn!("Unreadable Gemini response body ({}): {}", e, body);
        GeminiResponse::default()
    })
}

fn convert_usage(metadata: Option<&GeminiUsageMetadata>) -> Usage {
    match metadata {
        Some(m) => Usage {
            prompt_tokens: m.prompt_token_count.unwrap_or(0),
            completion_tokens: m.candidates_token_count.unwrap_or(0),
            total_tokens: m.total_token_count.unwrap_or(0),
        },
        None => Usage::default(),
    }
}

impl GeminiProvider {
    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let (contents, system_instruction) = convert_messages(&request.messages);
        let max_output_tokens = request.max_tokens.or(self.max_tokens);
        let temperature = request.temperature.or(self.temperature);
        let generation_config = if max_output_tokens.is_some() || temperature.is_some() {
            Some(GeminiGenerationConfig {
                max_output_tokens,
                temperature,
            })
        } else {
            None
        };

        GeminiRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let gemini_request = self.build_request(&request);

        debug!("Gemini request URL: {}", self.redacted_api_url());
        debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&gemini_request).unwrap_or_default()
        );

        let response = self
            .client
            .post(self.get_api_url())
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error ({}): {}", status, error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let body = response.text().await.map_err(|e| e.without_url())?;
        let gemini_response = parse_response(&body);
        debug!("Gemini response: {:?}", gemini_response);

        Ok(CompletionResponse {
            content: extract_first_text(&gemini_response),
            usage: convert_usage(gemini_response.usage_metadata.as_ref()),
            model: self.model.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(8192)
    }

    fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(1.0)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
