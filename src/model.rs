//! External content model: the seam between the generation client and the
//! hosted LLM.
//!
//! The production implementation calls an OpenAI-compatible chat.completions
//! endpoint and asks for output matching a declared JSON schema. Calls are
//! instrumented and log model name, latency and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
  #[error("model request failed: {0}")]
  RequestFailed(String),
  #[error("invalid model response: {0}")]
  InvalidResponse(String),
}

/// One structured generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
  /// Fixed role/constraints instruction.
  pub system: String,
  /// Per-call instruction with the concrete parameters.
  pub user: String,
  /// Declared output schema.
  pub schema: Value,
  pub schema_name: &'static str,
  pub temperature: f32,
}

/// Anything that can turn a request into a text payload (expected to hold JSON).
#[async_trait]
pub trait ContentModel: Send + Sync {
  async fn generate(&self, request: GenerationRequest) -> Result<String, ModelError>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }
}

#[async_trait]
impl ContentModel for OpenAI {
  #[instrument(level = "info", skip(self, request), fields(model = %self.model, schema = request.schema_name))]
  async fn generate(&self, request: GenerationRequest) -> Result<String, ModelError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: request.system },
        ChatMessageReq { role: "user".into(), content: request.user },
      ],
      temperature: request.temperature,
      response_format: Some(ResponseFormat::json_schema(request.schema_name, request.schema)),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "lingoquest-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| ModelError::RequestFailed(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      warn!(elapsed = ?start.elapsed(), %status, "Model returned non-success status");
      return Err(ModelError::RequestFailed(format!("HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await
      .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| ModelError::InvalidResponse("no message content".into()))?;

    info!(elapsed = ?start.elapsed(), bytes = text.len(), "Model response received");
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  r#type: String,
  json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat { name: String, schema: Value }

impl ResponseFormat {
  /// Structured outputs require an object at the top level, so array schemas
  /// are wrapped under `items` (which the normalizer unwraps again).
  fn json_schema(name: &str, schema: Value) -> Self {
    let schema = if schema.get("type").and_then(Value::as_str) == Some("array") {
      serde_json::json!({ "type": "object", "properties": { "items": schema }, "required": ["items"] })
    } else {
      schema
    };
    Self { r#type: "json_schema".into(), json_schema: JsonSchemaFormat { name: name.into(), schema } }
  }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn array_schemas_are_wrapped_in_items() {
    let f = ResponseFormat::json_schema("topics", json!({ "type": "array", "items": { "type": "object" } }));
    let v = serde_json::to_value(&f).unwrap();
    assert_eq!(v["type"], "json_schema");
    assert_eq!(v["json_schema"]["name"], "topics");
    assert_eq!(v["json_schema"]["schema"]["properties"]["items"]["type"], "array");
  }

  #[test]
  fn object_schemas_pass_through() {
    let f = ResponseFormat::json_schema("location", json!({ "type": "object" }));
    let v = serde_json::to_value(&f).unwrap();
    assert_eq!(v["json_schema"]["schema"], json!({ "type": "object" }));
  }

  #[test]
  fn extracts_provider_error_message() {
    let body = r#"{"error": {"message": "Rate limit reached", "type": "requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>"), None);
  }
}
