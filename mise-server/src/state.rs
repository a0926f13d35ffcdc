use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, TextProvider};
use crate::database::Database;
use crate::detect::Detector;
use crate::generation::{GeminiTextModel, OpenAiTextModel, RecipeGenerator, TextModel};
use crate::illustrate::{ImageGenerator, ImagenModel};
use crate::storage::ImageStore;

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub recipes: Arc<RecipeGenerator>,
    pub images: Arc<ImageGenerator>,
    pub image_store: ImageStore,
    pub db: Database,
    pub detector: Detector,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<Self> {
        if config.api_key.is_empty() {
            tracing::warn!("No API key configured; model calls will fail and serve fallbacks");
        }
        let client = reqwest::Client::new();
        let text_model: Arc<dyn TextModel> = match config.text_provider {
            TextProvider::Gemini => Arc::new(GeminiTextModel::new(
                client.clone(),
                &config.api_key,
                &config.llm_api_base,
            )),
            TextProvider::OpenAi => Arc::new(OpenAiTextModel::new(
                &config.api_key,
                &config.llm_api_base,
            )),
        };
        tracing::info!(
            provider = %config.text_provider,
            "Text models, in order: {}",
            config.text_models.join(", ")
        );
        let image_model = ImagenModel::new(
            client,
            &config.api_key,
            &config.image_api_base,
            &config.image_model,
        );
        let db = Database::connect(&config.database_path)
            .await
            .with_context(|| format!("Opening {}", config.database_path.display()))?;

        Ok(Self {
            recipes: Arc::new(RecipeGenerator::new(text_model, config.text_models.clone())),
            images: Arc::new(ImageGenerator::new(Box::new(image_model))),
            image_store: ImageStore::new(&config.generated_dir),
            db,
            detector: Detector::from_command_line(&config.detector)?,
        })
    }
}
