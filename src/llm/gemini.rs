use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use log::info;

use super::{ GenerationClient, GenerationConfig, GenerationError };

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    generation_config: GenerationConfig,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url,
            generation_config: GenerationConfig::default(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Value, GenerationError> {
        let payload = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
            generation_config: self.generation_config,
        };

        let url = self.endpoint();
        info!("GeminiClient::generate() → model={} url={}", self.model, url);

        let resp = self.http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status: status.as_u16(), body });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ extract::{ Path, Query, State }, http::StatusCode, routing::post, Json, Router };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{ Arc, Mutex };

    type Captured = Arc<Mutex<Vec<(String, HashMap<String, String>, Value)>>>;

    async fn spawn_upstream(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/v1/models/{call}",
                post(
                    move |
                        State(captured): State<Captured>,
                        Path(call): Path<String>,
                        Query(query): Query<HashMap<String, String>>,
                        Json(body): Json<Value>
                    | {
                        let reply = reply.clone();
                        async move {
                            captured.lock().unwrap().push((call, query, body));
                            (status, Json(reply))
                        }
                    }
                )
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/models", addr), captured)
    }

    #[tokio::test]
    async fn sends_prompt_and_fixed_generation_config() {
        let reply = json!({ "candidates": [{ "content": { "parts": [{ "text": "hi" }] } }] });
        let (base_url, captured) = spawn_upstream(StatusCode::OK, reply.clone()).await;
        let client = GeminiClient::new("secret".into(), "gemini-2.5-flash".into(), base_url);

        let payload = client.generate("Hello there").await.unwrap();
        assert_eq!(payload, reply);

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (call, query, body) = &calls[0];
        assert_eq!(call, "gemini-2.5-flash:generateContent");
        assert_eq!(query.get("key").map(String::as_str), Some("secret"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], json!("Hello there"));
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(1200));
        assert!(body["generationConfig"]["temperature"].is_number());
        assert!(body["generationConfig"]["topP"].is_number());
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let (base_url, _) = spawn_upstream(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "message": "quota" } })
        ).await;
        let client = GeminiClient::new("secret".into(), "gemini-2.5-flash".into(), base_url);

        match client.generate("Hello").await {
            Err(GenerationError::Status { status, body }) => {
                assert_eq!(status, 429);
                assert!(body.contains("quota"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
