//! Dish illustrations from a text-to-image model, with bounded retries.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;

pub const DEFAULT_MIME_TYPE: &str = "image/png";
/// Total upstream calls per image, including the first.
pub const MAX_ATTEMPTS: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("Image request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Image model answered {status}: {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Image model sent malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("No image data in response")]
    MissingPayload,
    #[error("Image data is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Could not store image: {0}")]
    Io(#[from] std::io::Error),
}

/// An image as the model returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: String,
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    /// One upstream call for one square image.
    async fn request_image(&self, prompt: &str) -> Result<EncodedImage, ImageError>;
}

/// Imagen through the `predict` REST endpoint.
pub struct ImagenModel {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl ImagenModel {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageModel for ImagenModel {
    async fn request_image(&self, prompt: &str) -> Result<EncodedImage, ImageError> {
        let response = self
            .client
            .post(format!("{}/models/{}:predict", self.api_base, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "instances": [{ "prompt": prompt }],
                "parameters": { "sampleCount": 1, "aspectRatio": "1:1" },
            }))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ImageError::Upstream { status, body: text });
        }
        let body: Value = serde_json::from_str(&text)?;
        find_image_payload(&body).ok_or(ImageError::MissingPayload)
    }
}

/// Pull the first image out of any of the response shapes image models use.
pub fn find_image_payload(body: &Value) -> Option<EncodedImage> {
    let text = |pointer: &str| body.pointer(pointer).and_then(Value::as_str);
    let mime = |pointer: &str| text(pointer).unwrap_or(DEFAULT_MIME_TYPE).to_string();

    if let Some(data) = text("/predictions/0/bytesBase64Encoded") {
        return Some(EncodedImage {
            base64: data.into(),
            mime_type: mime("/predictions/0/mimeType"),
        });
    }
    if let Some(data) = text("/predictions/0/imageBytes") {
        return Some(EncodedImage {
            base64: data.into(),
            mime_type: mime("/predictions/0/mimeType"),
        });
    }
    if let Some(data) = text("/generatedImages/0/image/imageBytes") {
        return Some(EncodedImage {
            base64: data.into(),
            mime_type: mime("/generatedImages/0/image/mimeType"),
        });
    }
    body.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|part| part.get("inlineData"))
        .find_map(|inline| {
            Some(EncodedImage {
                base64: inline.get("data")?.as_str()?.to_string(),
                mime_type: inline
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_MIME_TYPE)
                    .to_string(),
            })
        })
}

/// Waits between attempts: about 1s, then 2s, each plus up to 500ms of jitter.
fn image_retry() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(500)
        .map(|delay| delay + Duration::from_millis(rand::thread_rng().gen_range(0..500)))
        .take(MAX_ATTEMPTS - 1)
}

pub struct ImageGenerator {
    model: Box<dyn ImageModel>,
}

impl ImageGenerator {
    pub fn new(model: Box<dyn ImageModel>) -> Self {
        Self { model }
    }

    /// Returns `None` for a blank prompt or when every attempt failed.
    pub async fn generate_image(&self, prompt: &str) -> Option<EncodedImage> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        let model = self.model.as_ref();
        let result = Retry::spawn(image_retry(), || async move {
            model.request_image(prompt).await.map_err(|err| {
                tracing::warn!("Image attempt failed: {err}");
                err
            })
        })
        .await;
        match result {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::error!("Giving up on image after {MAX_ATTEMPTS} attempts: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails a set number of times, then succeeds.
    struct FlakyModel {
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ImageModel for FlakyModel {
        async fn request_image(&self, _prompt: &str) -> Result<EncodedImage, ImageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ImageError::MissingPayload)
            } else {
                Ok(EncodedImage {
                    base64: "aGVsbG8=".into(),
                    mime_type: "image/png".into(),
                })
            }
        }
    }

    fn flaky(failures: usize) -> (ImageGenerator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = FlakyModel {
            failures,
            calls: calls.clone(),
        };
        (ImageGenerator::new(Box::new(model)), calls)
    }

    #[test]
    fn backoff_is_bounded() {
        let delays: Vec<_> = image_retry().collect();
        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= Duration::from_millis(1000) && delays[0] < Duration::from_millis(1500));
        assert!(delays[1] >= Duration::from_millis(2000) && delays[1] < Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_prompt_skips_upstream() {
        let (generator, calls) = flaky(0);
        assert_eq!(generator.generate_image("  ").await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_backoff() {
        let (generator, calls) = flaky(2);
        let started = tokio::time::Instant::now();
        let image = generator.generate_image("a bowl of soup").await;
        assert!(image.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts() {
        let (generator, calls) = flaky(usize::MAX);
        assert_eq!(generator.generate_image("a bowl of soup").await, None);
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[test]
    fn payload_lookup_order() {
        let body = json!({
            "predictions": [{ "bytesBase64Encoded": "AAA", "mimeType": "image/jpeg" }],
            "generatedImages": [{ "image": { "imageBytes": "BBB" } }],
        });
        assert_eq!(
            find_image_payload(&body),
            Some(EncodedImage {
                base64: "AAA".into(),
                mime_type: "image/jpeg".into()
            })
        );

        let body = json!({ "predictions": [{ "imageBytes": "CCC" }] });
        assert_eq!(find_image_payload(&body).unwrap().base64, "CCC");
        assert_eq!(find_image_payload(&body).unwrap().mime_type, "image/png");

        let body = json!({ "generatedImages": [{ "image": { "imageBytes": "DDD", "mimeType": "image/webp" } }] });
        assert_eq!(find_image_payload(&body).unwrap().mime_type, "image/webp");
    }

    #[test]
    fn payload_from_inline_parts() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here you go" },
                { "inlineData": { "mimeType": "image/webp", "data": "EEE" } }
            ] } }]
        });
        assert_eq!(
            find_image_payload(&body),
            Some(EncodedImage {
                base64: "EEE".into(),
                mime_type: "image/webp".into()
            })
        );
        assert_eq!(find_image_payload(&json!({ "predictions": [] })), None);
    }

    mod imagen {
        use super::*;
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        #[tokio::test]
        async fn requests_one_square_image() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/models/imagen-test:predict"))
                .and(header("x-goog-api-key", "k"))
                .and(body_partial_json(json!({
                    "instances": [{ "prompt": "pie" }],
                    "parameters": { "sampleCount": 1, "aspectRatio": "1:1" },
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "predictions": [{ "bytesBase64Encoded": "aGVsbG8=" }]
                })))
                .expect(1)
                .mount(&server)
                .await;
            let model = ImagenModel::new(Client::new(), "k", server.uri(), "imagen-test");
            let image = model.request_image("pie").await.unwrap();
            assert_eq!(image.base64, "aGVsbG8=");
        }

        #[tokio::test]
        async fn errors_are_typed() {
            let server = MockServer::start().await;
            Mock::given(path("/models/down:predict"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;
            Mock::given(path("/models/garbled:predict"))
                .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
                .mount(&server)
                .await;
            Mock::given(path("/models/empty:predict"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .mount(&server)
                .await;

            let model = |name: &str| ImagenModel::new(Client::new(), "k", server.uri(), name);
            assert!(matches!(
                model("down").request_image("pie").await,
                Err(ImageError::Upstream { .. })
            ));
            assert!(matches!(
                model("garbled").request_image("pie").await,
                Err(ImageError::Malformed(_))
            ));
            assert!(matches!(
                model("empty").request_image("pie").await,
                Err(ImageError::MissingPayload)
            ));
        }
    }
}
