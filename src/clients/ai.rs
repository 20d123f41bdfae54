//! # AI Provider Client
//!
//! ## Purpose
//! Chat and embedding provider contracts with an OpenAI-compatible HTTP
//! implementation, plus the tolerant parser that turns free-text model
//! replies into structured JSON.
//!
//! ## Input/Output Specification
//! - **Input**: System prompt + user message (chat), raw text (embeddings)
//! - **Output**: Free-text completion, embedding vector
//! - **Parse Tolerance**: Model replies may wrap JSON in markdown fences or
//!   surround it with prose; parsing degrades to an empty result instead of
//!   raising

use crate::config::AiConfig;
use crate::errors::{IntelError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Contract for the AI chat provider
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a system prompt and user message, returning the raw completion
    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String>;
}

/// Contract for the AI embedding provider
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a fixed-dimensionality vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// =============================================================================
// Tolerant JSON parsing
// =============================================================================

/// Outcome of parsing a model reply expected to contain a JSON object
#[derive(Debug, Clone)]
pub enum ModelJson {
    /// A JSON object was recovered
    Parsed(Map<String, Value>),
    /// Nothing parseable; callers treat this as "no fields present"
    Empty,
}

impl ModelJson {
    pub fn is_empty(&self) -> bool {
        matches!(self, ModelJson::Empty)
    }

    /// Non-empty string value of `key`, if present
    pub fn str_field(&self, key: &str) -> Option<String> {
        match self {
            ModelJson::Parsed(map) => map
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ModelJson::Empty => None,
        }
    }

    /// String-list value of `key`; a bare string becomes a one-element list
    pub fn list_field(&self, key: &str) -> Vec<String> {
        let ModelJson::Parsed(map) = self else {
            return Vec::new();
        };
        match map.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Integer value of `key`, if present
    pub fn int_field(&self, key: &str) -> Option<i64> {
        match self {
            ModelJson::Parsed(map) => map.get(key).and_then(Value::as_i64),
            ModelJson::Empty => None,
        }
    }
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?\s*```").unwrap())
}

/// Parse a model reply into a JSON object with three fallback strategies:
/// direct decode, fenced-block extraction, then first-to-last brace span.
/// Unparsable replies degrade to [`ModelJson::Empty`].
pub fn parse_model_json(response: &str, context: &str) -> ModelJson {
    let text = response.trim();

    // Strategy 1: direct decode.
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return ModelJson::Parsed(map);
    }

    // Strategy 2: markdown fenced block.
    if let Some(captures) = fenced_block_re().captures(text) {
        if let Some(inner) = captures.get(1) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(inner.as_str().trim()) {
                return ModelJson::Parsed(map);
            }
        }
    }

    // Strategy 3: first '{' to last '}' span.
    if let (Some(first), Some(last)) = (text.find('{'), text.rfind('}')) {
        if last > first {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[first..=last]) {
                return ModelJson::Parsed(map);
            }
        }
    }

    tracing::warn!(
        context,
        reply = %crate::utils::TextUtils::truncate(text, 500),
        "Could not parse JSON from model reply"
    );
    ModelJson::Empty
}

// =============================================================================
// OpenAI-compatible HTTP provider
// =============================================================================

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Deserialize)]
struct EmbeddingsDatum {
    embedding: Vec<f32>,
}

/// OpenAI-compatible chat + embeddings client
pub struct HttpAiProvider {
    client: reqwest::Client,
    config: AiConfig,
}

impl HttpAiProvider {
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = super::http_client(config.timeout_seconds, super::USER_AGENT)?;
        Ok(Self { client, config })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl ChatProvider for HttpAiProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.chat_model,
            "temperature": temperature,
            "max_tokens": max_tokens,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_message},
            ],
        });

        let response = self
            .authorized(self.client.post(&self.config.chat_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "ai-chat".to_string(),
                details: format!("chat returned HTTP {}", response.status()),
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| IntelError::ExternalService {
                service: "ai-chat".to_string(),
                details: "chat reply contained no choices".to_string(),
            })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.config.embedding_model,
            "input": text,
        });

        let response = self
            .authorized(self.client.post(&self.config.embeddings_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "ai-embeddings".to_string(),
                details: format!("embeddings returned HTTP {}", response.status()),
            });
        }

        let embeddings: EmbeddingsResponse = response.json().await?;
        embeddings
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| IntelError::ExternalService {
                service: "ai-embeddings".to_string(),
                details: "embeddings reply contained no data".to_string(),
            })
    }
}
