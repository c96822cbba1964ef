//! Text generation providers and the gateway that retries them.
//!
//! | Provider | Endpoint | Key env (default) |
//! |----------|----------|-------------------|
//! | `huggingface` | `{url}/v1/chat/completions` (default `https://router.huggingface.co`) | `HF_API_KEY` |
//! | `openai` | `{url}/v1/chat/completions` (default `https://api.openai.com`) | `OPENAI_API_KEY` |
//! | `ollama` | `{url}/api/chat` (default `http://localhost:11434`) | none |
//! | `disabled` | none | none |
//!
//! [`GenerationGateway`] runs each completion under the shared
//! [`RetryPolicy`] (two attempts by default) and reports a failed call as
//! [`RagError::AnswerUnavailable`]. Nothing is cached and nothing is made up
//! when the service is down.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};
use crate::retry::{CallError, RetryPolicy};

const DEFAULT_HF_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A chat model. One attempt per call; retrying is the gateway's job.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, CallError>;
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _request: &CompletionRequest) -> std::result::Result<String, CallError> {
        Err(CallError::Permanent(
            "generation provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI-compatible chat completions ============

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// Generator for any OpenAI-compatible `/v1/chat/completions` endpoint.
/// Serves both the `huggingface` and `openai` providers.
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    service: &'static str,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsGenerator {
    pub fn huggingface(config: &GenerationConfig) -> Result<Self> {
        Self::new(
            config,
            "Hugging Face",
            "https://router.huggingface.co",
            "HF_API_KEY",
            Some(DEFAULT_HF_MODEL),
        )
    }

    pub fn openai(config: &GenerationConfig) -> Result<Self> {
        Self::new(config, "OpenAI", "https://api.openai.com", "OPENAI_API_KEY", None)
    }

    fn new(
        config: &GenerationConfig,
        service: &'static str,
        default_url: &str,
        default_key_env: &str,
        default_model: Option<&str>,
    ) -> Result<Self> {
        let model = config
            .model
            .clone()
            .or_else(|| default_model.map(str::to_string))
            .ok_or_else(|| {
                RagError::config(format!("generation.model required for {} provider", service))
            })?;
        let key_env = config.api_key_env.as_deref().unwrap_or(default_key_env);
        let api_key = std::env::var(key_env)
            .map_err(|_| RagError::config(format!("{} environment variable not set", key_env)))?;
        let url = config.url.as_deref().unwrap_or(default_url);

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            service,
            endpoint: format!("{}/v1/chat/completions", url.trim_end_matches('/')),
            model,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, CallError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::from_reqwest(self.service, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CallError::from_status(self.service, status, &body_text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            CallError::Permanent(format!("Invalid {} response: {}", self.service, e))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                CallError::Permanent(format!("Invalid {} response: no message content", self.service))
            })
    }
}

// ============ Ollama ============

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatCompletionMessage,
}

/// Generator backed by a local Ollama instance's `/api/chat`.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::config("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, CallError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CallError::Transient(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CallError::from_status("Ollama", status, &body_text));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| CallError::Permanent(format!("Invalid Ollama response: {}", e)))?;
        parsed
            .message
            .content
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CallError::Permanent("Invalid Ollama response: no message content".into()))
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::config(format!("failed to build HTTP client: {}", e)))
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "huggingface" => Ok(Arc::new(ChatCompletionsGenerator::huggingface(config)?)),
        "openai" => Ok(Arc::new(ChatCompletionsGenerator::openai(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => Err(RagError::config(format!(
            "Unknown generation provider: {}",
            other
        ))),
    }
}

// ============ Gateway ============

#[derive(Clone)]
pub struct GenerationGateway {
    generator: Arc<dyn Generator>,
    policy: RetryPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl GenerationGateway {
    pub fn new(
        generator: Arc<dyn Generator>,
        policy: RetryPolicy,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            generator,
            policy,
            max_tokens,
            temperature,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let policy = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_secs(config.timeout_secs),
        );
        Ok(Self::new(
            create_generator(config)?,
            policy,
            config.max_tokens,
            config.temperature,
        ))
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Complete `messages` with the configured token limit.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.complete_with_limit(messages, self.max_tokens).await
    }

    pub async fn complete_with_limit(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> Result<String> {
        let request = CompletionRequest {
            messages,
            max_tokens,
            temperature: self.temperature,
        };
        let generator = &self.generator;
        let request = &request;

        self.policy
            .run("generation", move || async move {
                generator.complete(request).await
            })
            .await
            .map_err(|e| RagError::AnswerUnavailable {
                attempts: e.attempts,
                message: e.last_error,
            })
    }
}
