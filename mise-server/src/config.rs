use std::path::PathBuf;

use anyhow::{Context, Result};
use strum::{Display, EnumString};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Where an OpenAI-compatible server usually listens when self-hosted.
pub const LOCAL_LLM_API_BASE: &str = "http://localhost:11434/v1";
pub const DEFAULT_TEXT_MODELS: &[&str] = &["gemini-2.5-flash"];
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

/// Which wire protocol the text model speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum TextProvider {
    #[strum(serialize = "gemini")]
    Gemini,
    #[strum(serialize = "openai")]
    OpenAi,
}

/// Everything the server needs from its environment.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub text_provider: TextProvider,
    /// Tried in order until one answers.
    pub text_models: Vec<String>,
    pub llm_api_base: String,
    pub image_model: String,
    pub image_api_base: String,
    pub generated_dir: PathBuf,
    pub database_path: PathBuf,
    pub detector: String,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load the configuration from the process environment (and `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let text_provider = match var("MISE_TEXT_PROVIDER") {
            Some(name) => name
                .trim()
                .parse()
                .with_context(|| format!("Unknown MISE_TEXT_PROVIDER {name:?}"))?,
            None => TextProvider::Gemini,
        };
        let api_key = var("GEMINI_API_KEY")
            .or_else(|| var("OPENAI_API_KEY"))
            .unwrap_or_default();
        let mut text_models: Vec<String> = var("MISE_TEXT_MODELS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        if text_models.is_empty() {
            text_models = DEFAULT_TEXT_MODELS.iter().map(|m| m.to_string()).collect();
        }
        let llm_api_base = var("MISE_LLM_API_BASE").unwrap_or_else(|| {
            match text_provider {
                TextProvider::Gemini => GEMINI_API_BASE,
                TextProvider::OpenAi => LOCAL_LLM_API_BASE,
            }
            .to_string()
        });

        Ok(Self {
            api_key,
            text_provider,
            text_models,
            llm_api_base: llm_api_base.trim_end_matches('/').to_string(),
            image_model: var("MISE_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.into()),
            image_api_base: var("MISE_IMAGE_API_BASE")
                .unwrap_or_else(|| GEMINI_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
            generated_dir: var("MISE_GENERATED_DIR")
                .unwrap_or_else(|| "public/generated".into())
                .into(),
            database_path: var("MISE_DATABASE_PATH")
                .unwrap_or_else(|| "data/saved.db".into())
                .into(),
            detector: var("MISE_DETECTOR").unwrap_or_else(|| "python3 backend/detect.py".into()),
            log_dir: var("MISE_LOG_DIR").map(PathBuf::from),
        })
    }
}

// Hand-written so the API key never lands in a log line.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("text_provider", &self.text_provider)
            .field("text_models", &self.text_models)
            .field("llm_api_base", &self.llm_api_base)
            .field("image_model", &self.image_model)
            .field("image_api_base", &self.image_api_base)
            .field("generated_dir", &self.generated_dir)
            .field("database_path", &self.database_path)
            .field("detector", &self.detector)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}
