pub mod gemini;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const TEMPERATURE: f32 = 0.9;
pub const TOP_P: f32 = 0.95;
pub const MAX_OUTPUT_TOKENS: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            top_p: TOP_P,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("upstream responded with status {status}")]
    Status { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A single-shot text generation backend. Returns the upstream JSON payload untouched.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Value, GenerationError>;

    fn get_model(&self) -> String;
}

/// Pulls the reply text out of either an OpenAI-style or a Gemini-style payload.
pub fn extract_reply_text(payload: &Value) -> Option<String> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| {
            payload.pointer("/candidates/0/content/parts/0/text").and_then(Value::as_str)
        })
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
