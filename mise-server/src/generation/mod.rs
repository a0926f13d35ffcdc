//! Recipe generation: prompt, candidate fallthrough, parse, complete.
//!
//! A blank query is the only error a caller ever sees from
//! [`RecipeGenerator::generate`]. Every upstream or parsing failure is logged
//! and collapses into `Ok(None)`, leaving the choice of fallback to the caller.

mod complete;
mod gemini;
mod openai;
mod parse;
mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use mise::basic_models::{RecipeRecord, RecipeRequest};

pub use complete::{complete_record, fallback_recipe, synthesized_image_prompt};
pub use gemini::GeminiTextModel;
pub use openai::OpenAiTextModel;
pub use parse::{parse_model_output, RawRecipe};
pub use prompt::{build_prompt, constraint_lines};

#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Model unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Unusable model output: {0}")]
    BadModelOutput(String),
}

/// A generative text model that can be asked for a JSON reply.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// One call, no retries. Returns the raw reply text, possibly empty.
    async fn complete_json(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}

pub struct RecipeGenerator {
    model: Arc<dyn TextModel>,
    candidates: Vec<String>,
}

impl RecipeGenerator {
    /// `candidates` are model names, tried in order.
    pub fn new(model: Arc<dyn TextModel>, candidates: Vec<String>) -> Self {
        Self { model, candidates }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Ask each candidate in turn until one replies, then turn the reply into
    /// a complete record.
    pub async fn generate(
        &self,
        request: &RecipeRequest,
    ) -> Result<Option<RecipeRecord>, GenerationError> {
        if !request.has_query() {
            return Err(GenerationError::InvalidArgument(
                "Missing 'query' field.".into(),
            ));
        }
        let prompt = build_prompt(request);
        tracing::debug!("Prompt: {}", prompt);

        let Some(text) = self.first_reply(&prompt).await else {
            tracing::warn!("No candidate model produced a reply");
            return Ok(None);
        };
        match parse_model_output(&text) {
            Ok(raw) => Ok(Some(complete_record(&raw))),
            Err(err) => {
                tracing::warn!("{err}. Reply was: {text:?}");
                Ok(None)
            }
        }
    }

    async fn first_reply(&self, prompt: &str) -> Option<String> {
        for candidate in &self.candidates {
            match self.model.complete_json(candidate, prompt).await {
                Ok(text) => {
                    tracing::info!(model = %candidate, "Model replied");
                    return Some(text);
                }
                Err(err) => tracing::warn!(model = %candidate, "{err}"),
            }
        }
        None
    }
}
