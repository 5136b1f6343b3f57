#![allow(dead_code)]
//! Mock LLM Provider for Testing
//!
//! A scripted provider that returns queued responses in order and records
//! every request it receives. Clones share the same queue and request log,
//! so a test can hand one clone to the organizer and inspect the other.
//!
//! # Example
//!
//! ```rust,ignore
//! use taborg_providers::mock::{MockProvider, MockResponse};
//!
//! let provider = MockProvider::new()
//!     .with_response(MockResponse::text(r#"[{"group":"News","tabIds":[1]}]"#));
//! ```

use crate::{CompletionRequest, CompletionResponse, LLMProvider, Usage};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock response that can be configured for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub outcome: MockOutcome,
    /// Sleep before answering (for timeout tests)
    pub delay: Option<Duration>,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub enum MockOutcome {
    Text(String),
    Error(String),
}

impl MockResponse {
    /// A successful response with the given text
    pub fn text(content: &str) -> Self {
        Self {
            outcome: MockOutcome::Text(content.to_string()),
            delay: None,
            usage: Usage {
                prompt_tokens: 100,
                completion_tokens: content.len() as u32 / 4,
                total_tokens: 100 + content.len() as u32 / 4,
            },
        }
    }

    /// A provider-level failure (network error, non-2xx status)
    pub fn error(message: &str) -> Self {
        Self {
            outcome: MockOutcome::Error(message.to_string()),
            delay: None,
            usage: Usage::default(),
        }
    }

    /// Builder: answer only after `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    model: String,
    /// Queue of responses to return (FIFO)
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// All requests received (for verification)
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    default_response: Option<MockResponse>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_response: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Add a response to the queue
    pub fn with_response(self, response: MockResponse) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    /// Add multiple responses to the queue
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        self.responses.lock().unwrap().extend(responses);
        self
    }

    /// Set a default response when queue is empty
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = Some(response);
        self
    }

    /// Get all requests that were made to this provider
    pub fn get_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the number of requests made
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.default_response
                .clone()
                .unwrap_or_else(|| MockResponse::text("[]"))
        } else {
            responses.remove(0)
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LLMProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);

        let response = self.next_response();
        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        match response.outcome {
            MockOutcome::Text(content) => Ok(CompletionResponse {
                content,
                usage: response.usage,
                model: self.model.clone(),
            }),
            MockOutcome::Error(message) => Err(anyhow::anyhow!(message)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        4096
    }

    fn temperature(&self) -> f32 {
        0.7
    }
}
