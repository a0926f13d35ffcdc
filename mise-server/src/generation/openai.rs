use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use super::{GenerationError, TextModel};

/// Text generation through any OpenAI-compatible chat completions API,
/// such as a self-hosted model server.
///
/// No JSON response format is requested: that mode only allows an object,
/// while the prompt asks for an array.
pub struct OpenAiTextModel {
    client: Client<OpenAIConfig>,
}

impl OpenAiTextModel {
    pub fn new(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::with_config(
                OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base(api_base),
            ),
        }
    }
}

#[async_trait]
impl TextModel for OpenAiTextModel {
    async fn complete_json(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .temperature(0.3)
            .messages([ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: prompt.into(),
                    name: None,
                },
            )])
            .build()
            .map_err(|err| GenerationError::UpstreamUnavailable(err.to_string()))?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|err| GenerationError::UpstreamUnavailable(err.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::UpstreamUnavailable(format!("{model} sent no text payload"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "local-model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        }))
    }

    #[tokio::test]
    async fn sends_prompt_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "local-model",
                "temperature": 0.3,
                "messages": [{ "role": "user", "content": "make soup" }],
            })))
            .respond_with(completion(json!("[{\"title\":\"Soup\"}]")))
            .expect(1)
            .mount(&server)
            .await;

        let text = OpenAiTextModel::new("test-key", &server.uri())
            .complete_json("local-model", "make soup")
            .await
            .unwrap();
        assert_eq!(text, "[{\"title\":\"Soup\"}]");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("response_format").is_none(), "{body}");
    }

    #[tokio::test]
    async fn missing_content_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion(Value::Null))
            .mount(&server)
            .await;
        let result = OpenAiTextModel::new("k", &server.uri())
            .complete_json("m", "p")
            .await;
        assert!(matches!(result, Err(GenerationError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn api_errors_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "message": "model not loaded", "type": "server_error", "param": null, "code": null }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let result = OpenAiTextModel::new("k", &server.uri())
            .complete_json("m", "p")
            .await;
        match result {
            Err(GenerationError::UpstreamUnavailable(message)) => {
                assert!(message.contains("model not loaded"), "{message}")
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }
}
