//! Turns whatever the server sent into something that can always be shown.

use mise::basic_models::{DifficultyLevel, Ingredient, RecipeRecord, RecipeRequest};
use serde::Serialize;
use serde_json::Value;

pub const NO_INSTRUCTIONS: &str = "No instructions provided.";
const CAPTION_CHARS: usize = 60;

/// A recipe ready for display. Every field is filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRecipe {
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    /// Minutes, or `N/A`.
    pub prep_time: String,
    pub difficulty: String,
    pub estimated_calories: u64,
    pub image_prompt: String,
    pub recipe_id: String,
    pub image_url: String,
}

impl DisplayRecipe {
    /// Normalize a raw server reply, filling gaps from the request that produced it.
    pub fn present(raw: &Value, request: &RecipeRequest) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let title = text("title")
            .or_else(|| request.notes.clone())
            .or_else(|| Some(request.query.trim().to_string()).filter(|q| !q.is_empty()))
            .unwrap_or_else(|| "Generated Recipe".into());
        let prep_time = match raw.get("prep_time_minutes") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if s.trim().parse::<f64>().is_ok() => s.trim().to_string(),
            _ => request
                .max_time_minutes
                .map(|m| m.to_string())
                .unwrap_or_else(|| "N/A".into()),
        };
        let difficulty = text("difficulty_level")
            .or_else(|| request.difficulty.map(|d| d.to_string()))
            .unwrap_or_else(|| DifficultyLevel::NotApplicable.to_string());

        Self {
            title,
            ingredients: ingredients(raw.get("ingredients")),
            instructions: instructions(raw.get("instructions")),
            prep_time,
            difficulty,
            estimated_calories: raw
                .get("estimated_calories")
                .and_then(|c| c.as_u64().or_else(|| c.as_f64().map(|f| f.max(0.0).round() as u64)))
                .unwrap_or(0),
            image_prompt: text("image_prompt").unwrap_or_default(),
            recipe_id: text("recipe_id").unwrap_or_else(|| "TEMP_ID".into()),
            image_url: text("imageUrl").unwrap_or_default(),
        }
    }

    /// Short blurb for lists of recipes.
    pub fn caption(&self) -> String {
        caption(&self.instructions)
    }

    /// The record to send back to the server when saving.
    pub fn to_record(&self) -> RecipeRecord {
        let number = |s: &str| s.parse::<f64>().ok().filter(|n| *n >= 0.0);
        RecipeRecord {
            title: self.title.clone(),
            ingredients: self.ingredients.clone(),
            instructions: self
                .instructions
                .iter()
                .filter(|step| step.as_str() != NO_INSTRUCTIONS)
                .cloned()
                .collect(),
            prep_time_minutes: number(&self.prep_time).map_or(0, |n| n.round() as u32),
            difficulty_level: self.difficulty.parse().unwrap_or_default(),
            estimated_calories: self.estimated_calories.min(u32::MAX as u64) as u32,
            image_prompt: Some(self.image_prompt.clone()).filter(|p| !p.is_empty()),
            recipe_id: self.recipe_id.clone(),
            image_url: Some(self.image_url.clone()).filter(|u| !u.is_empty()),
        }
    }
}

/// First step, cut to 60 characters.
pub fn caption(instructions: &[String]) -> String {
    match instructions.first() {
        Some(first) if first.chars().count() > CAPTION_CHARS => {
            format!("{}...", first.chars().take(CAPTION_CHARS).collect::<String>())
        }
        Some(first) => first.clone(),
        None => "View recipe details".into(),
    }
}

/// Server-relative image paths become absolute against `server`.
pub fn resolve_image_url(server: &str, image_url: &str) -> String {
    if image_url.starts_with("/generated/") {
        format!("{}{image_url}", server.trim_end_matches('/'))
    } else {
        image_url.to_string()
    }
}

fn ingredients(value: Option<&Value>) -> Vec<Ingredient> {
    let Some(Value::Array(items)) = value else {
        return vec![];
    };
    let field = |item: &Value, key: &str| match item.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(Ingredient::new(name.trim(), "")),
            Value::Object(_) => Some(Ingredient::new(field(item, "name"), field(item, "quantity"))),
            _ => None,
        })
        .filter(|ingredient| !ingredient.name.is_empty())
        .collect()
}

fn instructions(value: Option<&Value>) -> Vec<String> {
    let steps: Vec<String> = match value {
        Some(Value::Array(steps)) => steps
            .iter()
            .map(|step| match step {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|step| !step.is_empty())
            .collect(),
        Some(Value::String(text)) => text
            .lines()
            .map(str::trim)
            .filter(|step| !step.is_empty())
            .map(String::from)
            .collect(),
        _ => vec![],
    };
    if steps.is_empty() {
        vec![NO_INSTRUCTIONS.into()]
    } else {
        steps
    }
}
