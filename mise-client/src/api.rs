use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use mise::basic_models::{
    DetectedIngredients, ErrorBody, ImageRequest, ImageResponse, RecipeRecord, RecipeRequest,
    SaveReceipt, SavedRecipe,
};
use reqwest::{multipart, Response, StatusCode};

use crate::presenter::{resolve_image_url, DisplayRecipe};

const USER_HEADER: &str = "x-user-id";

/// Talks to a mise server.
#[derive(Clone, Debug)]
pub struct MiseClient {
    client: reqwest::Client,
    server: String,
    user: Option<String>,
}

/// Turn a non-2xx reply into an error carrying the server's message.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) => format!("{error} ({details})"),
        Ok(ErrorBody { error, .. }) => error,
        Err(_) => text,
    };
    Err(anyhow!("Server answered {status}: {message}"))
}

impl MiseClient {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server: server.into().trim_end_matches('/').to_string(),
            user: None,
        }
    }

    /// Act as a signed-in user, as needed for saved recipes.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server)
    }

    fn user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .context("A user id is needed for saved recipes")
    }

    /// Ask for a recipe and normalize whatever comes back.
    pub async fn generate(&self, request: &RecipeRequest) -> Result<DisplayRecipe> {
        ensure!(request.has_query(), "Enter some ingredients or an idea first");
        let resp = self
            .client
            .post(self.url("/api/recipe"))
            .json(request)
            .send()
            .await?;
        let raw: serde_json::Value = check(resp).await?.json().await?;
        let mut recipe = DisplayRecipe::present(&raw, request);
        recipe.image_url = resolve_image_url(&self.server, &recipe.image_url);
        Ok(recipe)
    }

    /// Generate an image for a prompt and return its absolute URL.
    pub async fn illustrate(&self, prompt: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/api/image"))
            .json(&ImageRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await?;
        let ImageResponse { image_url } = check(resp).await?.json().await?;
        Ok(resolve_image_url(&self.server, &image_url))
    }

    /// Upload a photo and get back the ingredients seen in it.
    pub async fn detect_ingredients(&self, photo: &Path) -> Result<Vec<String>> {
        let bytes = tokio::fs::read(photo)
            .await
            .with_context(|| format!("Reading {}", photo.display()))?;
        let file_name = photo
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jpg".into());
        let form = multipart::Form::new()
            .part("image", multipart::Part::bytes(bytes).file_name(file_name))
            .text("onlyDetect", "true");
        let resp = self
            .client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await?;
        let DetectedIngredients { ingredients } = check(resp).await?.json().await?;
        Ok(ingredients)
    }

    pub async fn save(&self, recipe: &RecipeRecord) -> Result<SaveReceipt> {
        let resp = self
            .client
            .post(self.url("/api/saved"))
            .header(USER_HEADER, self.user()?)
            .json(recipe)
            .send()
            .await?;
        let receipt: SaveReceipt = check(resp).await?.json().await?;
        if let Some(previous) = &receipt.replaced_title {
            tracing::warn!("Saving replaced {previous:?}, which had the same id");
        }
        Ok(receipt)
    }

    /// Remove a saved recipe. Returns false if it wasn't saved.
    pub async fn unsave(&self, id: &str) -> Result<bool> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/saved/{id}")))
            .header(USER_HEADER, self.user()?)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }

    pub async fn is_saved(&self, id: &str) -> Result<bool> {
        let resp = self
            .client
            .get(self.url(&format!("/api/saved/{id}")))
            .header(USER_HEADER, self.user()?)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }

    /// The user's saved recipes, newest first, with image URLs made absolute.
    pub async fn saved(&self) -> Result<Vec<SavedRecipe>> {
        let resp = self
            .client
            .get(self.url("/api/saved"))
            .header(USER_HEADER, self.user()?)
            .send()
            .await?;
        let mut saved: Vec<SavedRecipe> = check(resp).await?.json().await?;
        for recipe in &mut saved {
            if let Some(url) = &recipe.recipe.image_url {
                recipe.recipe.image_url = Some(resolve_image_url(&self.server, url));
            }
        }
        Ok(saved)
    }
}
