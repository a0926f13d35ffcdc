use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Difficulty a user can ask for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, IntoStaticStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Difficulty reported on a finished recipe. Models that omit it get `N/A`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    IntoStaticStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
    #[default]
    #[serde(rename = "N/A")]
    #[strum(to_string = "N/A")]
    NotApplicable,
}

impl From<Difficulty> for DifficultyLevel {
    fn from(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => DifficultyLevel::Easy,
            Difficulty::Medium => DifficultyLevel::Medium,
            Difficulty::Hard => DifficultyLevel::Hard,
        }
    }
}

/// What the user wants to cook, as sent to `POST /api/recipe`.
///
/// Optional fields are deserialized leniently because browser forms send
/// empty strings and numbers-as-text. Anything that can't be understood is
/// treated as absent rather than rejected; only `query` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRequest {
    #[serde(default)]
    pub query: String,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub cuisine: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_minutes",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_time_minutes: Option<u32>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub dietary_restrictions: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_difficulty",
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty: Option<Difficulty>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<String>,
}

impl RecipeRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// True when the request can be sent to a model at all.
    pub fn has_query(&self) -> bool {
        !self.query.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
        }
    }
}

/// A complete, always-renderable recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    pub prep_time_minutes: u32,
    pub difficulty_level: DifficultyLevel,
    pub estimated_calories: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    pub recipe_id: String,
    #[serde(
        rename = "imageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

impl RecipeRecord {
    /// The document id this recipe is saved under.
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// A recipe in a user's favorites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRecipe {
    pub id: String,
    #[serde(rename = "savedAt")]
    pub saved_at: String,
    #[serde(flatten)]
    pub recipe: RecipeRecord,
}

/// Reply to a save. `replaced_title` is set when the save overwrote a
/// different recipe whose title happens to slug to the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub id: String,
    #[serde(rename = "savedAt")]
    pub saved_at: String,
    #[serde(
        rename = "replacedTitle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub replaced_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIngredients {
    pub ingredients: Vec<String>,
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Derive a document id from a recipe title: ASCII letters and digits are
/// lowercased, everything else becomes `-`.
///
/// This is lossy. "Mac & Cheese" and "Mac + Cheese" share an id, and saving
/// one replaces the other.
pub fn slugify(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.filter(|t| !t.trim().is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn lenient_minutes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let minutes = match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(t)) => t.trim().parse::<f64>().ok(),
        None => None,
    };
    // Zero means "no limit" to the forms that send it.
    Ok(minutes
        .filter(|m| m.is_finite() && *m >= 1.0)
        .map(|m| m.round().min(u32::MAX as f64) as u32))
}

fn lenient_difficulty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Difficulty>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.and_then(|t| t.trim().parse().ok()))
}
