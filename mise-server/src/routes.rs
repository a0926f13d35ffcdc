use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mise::basic_models::{
    DetectedIngredients, ImageRequest, ImageResponse, RecipeRecord, RecipeRequest, SaveReceipt,
    SavedRecipe,
};
use serde::de::DeserializeOwned;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{
    auth::UserId,
    errors::{WebError, WebResult},
    generation::{fallback_recipe, GenerationError},
    saved::{SaveOutcome, SavedRecipes},
    state::AppState,
    storage::GENERATED_URL_PREFIX,
};

/// Largest request body accepted, uploads included.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let generated = ServeDir::new(state.image_store.dir());
    Router::new()
        // `GET /health` goes to `health`
        .route("/health", get(health))
        // `POST /api/recipe` goes to `generate_recipe`
        .route("/api/recipe", post(generate_recipe))
        // `POST /api/image` goes to `generate_image`
        .route("/api/image", post(generate_image))
        // `POST /api/upload` goes to `detect_ingredients`
        .route("/api/upload", post(detect_ingredients))
        .route("/api/saved", get(list_saved).post(save_recipe))
        .route("/api/saved/:id", get(get_saved).delete(unsave_recipe))
        // generated images are plain files
        .nest_service(GENERATED_URL_PREFIX, generated)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(
            tower_http::compression::CompressionLayer::new()
                .quality(tower_http::CompressionLevel::Fastest),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// Just reply that everything is okay
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Parse a JSON body, answering 400 in our own error shape when it isn't.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> WebResult<T> {
    serde_json::from_slice(body)
        .map_err(|err| WebError::InvalidArgument(format!("Invalid JSON body: {err}")))
}

/// Generate a recipe. Anything short of a malformed request gets a 200, with
/// the fallback recipe standing in when no model delivered.
async fn generate_recipe(
    State(state): State<AppState>,
    body: Bytes,
) -> WebResult<Json<RecipeRecord>> {
    let request: RecipeRequest = parse_body(&body)?;
    if !request.has_query() {
        return Err(WebError::InvalidArgument("Missing 'query' field.".into()));
    }
    tracing::info!(query = %request.query, "Generating recipe");

    // Run in its own task so a panic in generation still gets an answer.
    let recipes = state.recipes.clone();
    let generation = tokio::spawn(async move { recipes.generate(&request).await });
    let record = match generation.await {
        Ok(Ok(Some(record))) => record,
        Ok(Ok(None)) => {
            tracing::warn!("Serving fallback recipe");
            fallback_recipe()
        }
        Ok(Err(err @ GenerationError::InvalidArgument(_))) => return Err(err.into()),
        Ok(Err(err)) => {
            tracing::error!("Serving fallback recipe after {err}");
            fallback_recipe()
        }
        Err(err) => {
            tracing::error!("Recipe generation task failed: {err}");
            fallback_recipe()
        }
    };
    Ok(Json(record))
}

async fn generate_image(
    State(state): State<AppState>,
    body: Bytes,
) -> WebResult<Json<ImageResponse>> {
    let request: ImageRequest = parse_body(&body)?;
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(WebError::InvalidArgument("Missing 'prompt' field.".into()));
    }
    let image = state
        .images
        .generate_image(prompt)
        .await
        .ok_or(WebError::ImageUnavailable)?;
    let image_url = state.image_store.save(prompt, &image).await?;
    Ok(Json(ImageResponse { image_url }))
}

/// Spool an uploaded photo to disk and run the detector over it.
async fn detect_ingredients(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> WebResult<Json<DetectedIngredients>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| WebError::InvalidArgument(err.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let extension = field
                    .file_name()
                    .and_then(|name| std::path::Path::new(name).extension())
                    .and_then(|ext| ext.to_str())
                    .map(|ext| format!(".{ext}"))
                    .unwrap_or_else(|| ".jpg".into());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| WebError::InvalidArgument(err.body_text()))?;
                upload = Some((extension, bytes));
            }
            Some("onlyDetect") => {
                // Detection is the only thing this route does either way.
                let only_detect = field
                    .text()
                    .await
                    .map_err(|err| WebError::InvalidArgument(err.body_text()))?;
                tracing::debug!("onlyDetect={only_detect}");
            }
            _ => {}
        }
    }
    let (extension, bytes) = upload
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| WebError::InvalidArgument("No file uploaded.".into()))?;

    let spool = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&extension)
        .tempfile()
        .context("Creating upload spool file")?;
    tokio::fs::write(spool.path(), &bytes)
        .await
        .context("Writing upload spool file")?;
    let ingredients = state.detector.detect(spool.path()).await?;
    tracing::info!("Detected {} ingredients", ingredients.len());
    Ok(Json(DetectedIngredients { ingredients }))
}

async fn list_saved(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> WebResult<Json<Vec<SavedRecipe>>> {
    Ok(Json(SavedRecipes::for_user(&state.db, &user).list()?))
}

async fn get_saved(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> WebResult<Json<SavedRecipe>> {
    let saved = SavedRecipes::for_user(&state.db, &user)
        .get(&id)?
        .ok_or(WebError::NotFound)?;
    Ok(Json(saved))
}

async fn save_recipe(
    State(state): State<AppState>,
    UserId(user): UserId,
    body: Bytes,
) -> WebResult<(StatusCode, Json<SaveReceipt>)> {
    let recipe: RecipeRecord = parse_body(&body)?;
    if recipe.title.trim().is_empty() {
        return Err(WebError::InvalidArgument(
            "A recipe needs a title to be saved.".into(),
        ));
    }
    let (receipt, outcome) = SavedRecipes::for_user(&state.db, &user).save(&recipe)?;
    let status = match outcome {
        SaveOutcome::Created => StatusCode::CREATED,
        SaveOutcome::Resaved | SaveOutcome::Collided { .. } => StatusCode::OK,
    };
    Ok((status, Json(receipt)))
}

async fn unsave_recipe(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> WebResult<StatusCode> {
    if SavedRecipes::for_user(&state.db, &user).delete(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::NotFound)
    }
}
