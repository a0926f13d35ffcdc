use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{GenerationError, TextModel};

/// Text generation over the Gemini `generateContent` REST endpoint.
pub struct GeminiTextModel {
    client: Client,
    api_key: String,
    api_base: String,
}

impl GeminiTextModel {
    pub fn new(client: Client, api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

/// The text of the first candidate. Some models put JSON replies in
/// `inlineData` instead of `text`.
fn reply_text(body: &Value) -> Option<&str> {
    body.pointer("/candidates/0/content/parts/0/text")
        .or_else(|| body.pointer("/candidates/0/content/parts/0/inlineData/data"))
        .and_then(Value::as_str)
}

#[async_trait]
impl TextModel for GeminiTextModel {
    async fn complete_json(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "response_mime_type": "application/json",
                    "temperature": 0.3,
                },
            }))
            .send()
            .await
            .map_err(|err| GenerationError::UpstreamUnavailable(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GenerationError::UpstreamUnavailable(err.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::UpstreamUnavailable(format!(
                "{model} answered {status}: {text}"
            )));
        }
        let body: Value = serde_json::from_str(&text).map_err(|err| {
            GenerationError::UpstreamUnavailable(format!("{model} sent a non-JSON body: {err}"))
        })?;
        if let Some(error) = body.get("error") {
            return Err(GenerationError::UpstreamUnavailable(format!(
                "{model} reported an error: {error}"
            )));
        }
        match reply_text(&body) {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => Err(GenerationError::UpstreamUnavailable(format!(
                "{model} sent no text payload"
            ))),
        }
    }
}
