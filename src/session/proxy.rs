use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use log::error;

use crate::models::proxy::PromptRequest;

#[derive(Debug, Error)]
pub enum ProxyCallError {
    #[error("proxy responded with status {0}")]
    Status(u16),
    #[error("proxy request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Client side of the chat proxy endpoint.
#[async_trait]
pub trait ChatProxy: Send + Sync {
    async fn request(&self, system_prompt: &str) -> Result<Value, ProxyCallError>;
}

pub struct HttpChatProxy {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpChatProxy {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChatProxy for HttpChatProxy {
    async fn request(&self, system_prompt: &str) -> Result<Value, ProxyCallError> {
        let body = PromptRequest { system_prompt: Some(system_prompt.to_string()) };
        let resp = self.http.post(&self.endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await.unwrap_or_default();
            error!("API Error: {} {}", status, details);
            return Err(ProxyCallError::Status(status.as_u16()));
        }

        Ok(resp.json::<Value>().await?)
    }
}
