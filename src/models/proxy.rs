use serde::{ Serialize, Deserialize };

/// Body accepted by the proxy endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PromptRequest {
    #[serde(rename = "systemPrompt", default)]
    pub system_prompt: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}
