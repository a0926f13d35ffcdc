use mise::basic_models::{DifficultyLevel, Ingredient, RecipeRecord};
use serde_json::Value;

use super::parse::RawRecipe;

pub const UNTITLED: &str = "Untitled Recipe";
pub const TEMP_ID: &str = "TEMP_ID";

/// The image prompt used when the model didn't write one.
pub fn synthesized_image_prompt(title: &str) -> String {
    format!("Professional food photography of {title}, plated, natural light")
}

/// Fill every missing or ill-typed field of a parsed model reply with a safe
/// default, so the result can always be rendered.
///
/// Values are taken as given otherwise. In particular the prep time is not
/// checked against what the user asked for.
pub fn complete_record(raw: &RawRecipe) -> RecipeRecord {
    let title = non_blank(raw.get("title")).unwrap_or_else(|| UNTITLED.to_string());
    let image_prompt =
        non_blank(raw.get("image_prompt")).unwrap_or_else(|| synthesized_image_prompt(&title));
    RecipeRecord {
        ingredients: ingredients(raw.get("ingredients")),
        instructions: instructions(raw.get("instructions")),
        prep_time_minutes: non_negative(raw.get("prep_time_minutes")),
        difficulty_level: raw
            .get("difficulty_level")
            .and_then(Value::as_str)
            .and_then(|level| level.trim().parse().ok())
            .unwrap_or_default(),
        estimated_calories: non_negative(raw.get("estimated_calories")),
        image_prompt: Some(image_prompt),
        recipe_id: non_blank(raw.get("recipe_id")).unwrap_or_else(|| TEMP_ID.to_string()),
        image_url: None,
        title,
    }
}

/// The recipe served when no model produced anything usable.
pub fn fallback_recipe() -> RecipeRecord {
    RecipeRecord {
        title: "Fallback Recipe (AI Failed)".into(),
        ingredients: vec![
            Ingredient::new("Flour", "1 cup"),
            Ingredient::new("Water", "1/2 cup"),
        ],
        instructions: vec![
            "Mix flour and water.".into(),
            "Cook over medium heat.".into(),
        ],
        prep_time_minutes: 5,
        difficulty_level: DifficultyLevel::Easy,
        estimated_calories: 200,
        image_prompt: Some(
            "Simple bread dough on a wooden board, high-quality food photo.".into(),
        ),
        recipe_id: TEMP_ID.into(),
        image_url: None,
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Strings for quantities; models sometimes write `2` instead of `"2"`.
fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn ingredients(value: Option<&Value>) -> Vec<Ingredient> {
    let Some(Value::Array(items)) = value else {
        return vec![];
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(fields) => Some(Ingredient::new(
                text_of(fields.get("name")),
                text_of(fields.get("quantity")),
            )),
            Value::String(name) => Some(Ingredient::new(name.trim(), "")),
            _ => None,
        })
        .filter(|ingredient| !ingredient.name.is_empty())
        .collect()
}

fn instructions(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(steps)) => steps
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|step| !step.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(text)) => text
            .lines()
            .map(str::trim)
            .filter(|step| !step.is_empty())
            .map(String::from)
            .collect(),
        _ => vec![],
    }
}

/// Whole non-negative number from a JSON number or numeric string, else 0.
fn non_negative(value: Option<&Value>) -> u32 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => n.round().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecipe {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn empty_object_gets_every_default() {
        let record = complete_record(&raw(json!({})));
        assert_eq!(record.title, "Untitled Recipe");
        assert!(record.ingredients.is_empty());
        assert!(record.instructions.is_empty());
        assert_eq!(record.prep_time_minutes, 0);
        assert_eq!(record.estimated_calories, 0);
        assert_eq!(record.difficulty_level, DifficultyLevel::NotApplicable);
        assert_eq!(
            record.image_prompt.as_deref(),
            Some("Professional food photography of Untitled Recipe, plated, natural light")
        );
        assert_eq!(record.recipe_id, "TEMP_ID");
        assert_eq!(record.image_url, None);
    }

    #[test]
    fn well_formed_reply_is_kept() {
        let record = complete_record(&raw(json!({
            "title": "Lemon Herb Pasta",
            "ingredients": [{"name": "Spaghetti", "quantity": "200 g"}],
            "instructions": ["Boil pasta.", "Toss with lemon."],
            "prep_time_minutes": 20,
            "difficulty_level": "EASY",
            "estimated_calories": 540,
            "image_prompt": "A bowl of lemony pasta",
            "recipe_id": "lemon-1"
        })));
        assert_eq!(record.title, "Lemon Herb Pasta");
        assert_eq!(record.ingredients, vec![Ingredient::new("Spaghetti", "200 g")]);
        assert_eq!(record.instructions, vec!["Boil pasta.", "Toss with lemon."]);
        assert_eq!(record.prep_time_minutes, 20);
        assert_eq!(record.difficulty_level, DifficultyLevel::Easy);
        assert_eq!(record.estimated_calories, 540);
        assert_eq!(record.image_prompt.as_deref(), Some("A bowl of lemony pasta"));
        assert_eq!(record.recipe_id, "lemon-1");
    }

    #[test]
    fn image_prompt_is_synthesized_from_title() {
        let record = complete_record(&raw(json!({"title": "Pad Thai", "image_prompt": "  "})));
        assert_eq!(
            record.image_prompt.as_deref(),
            Some("Professional food photography of Pad Thai, plated, natural light")
        );
    }

    #[test]
    fn blank_steps_are_dropped() {
        let record = complete_record(&raw(json!({
            "instructions": ["Chop.", "", "   ", 7, "Serve."]
        })));
        assert_eq!(record.instructions, vec!["Chop.", "Serve."]);
    }

    #[test]
    fn single_string_instructions_are_split() {
        let record = complete_record(&raw(json!({
            "instructions": "Chop onions.\n\nFry them.\n"
        })));
        assert_eq!(record.instructions, vec!["Chop onions.", "Fry them."]);
    }

    #[test]
    fn ingredients_accept_strings_and_numbers() {
        let record = complete_record(&raw(json!({
            "ingredients": [
                "Salt",
                {"name": "Eggs", "quantity": 2},
                {"name": "", "quantity": "1 cup"},
                {"quantity": "a pinch"},
                42
            ]
        })));
        assert_eq!(
            record.ingredients,
            vec![Ingredient::new("Salt", ""), Ingredient::new("Eggs", "2")]
        );
    }

    #[test]
    fn non_array_ingredients_become_empty() {
        let record = complete_record(&raw(json!({"ingredients": "flour, water"})));
        assert!(record.ingredients.is_empty());
    }

    #[test]
    fn numbers_are_coerced() {
        let record = complete_record(&raw(json!({
            "prep_time_minutes": "15",
            "estimated_calories": -30
        })));
        assert_eq!(record.prep_time_minutes, 15);
        assert_eq!(record.estimated_calories, 0);

        let record = complete_record(&raw(json!({
            "prep_time_minutes": 12.6,
            "estimated_calories": "lots"
        })));
        assert_eq!(record.prep_time_minutes, 13);
        assert_eq!(record.estimated_calories, 0);
    }

    #[test]
    fn prep_time_is_not_checked_against_request() {
        // A 10 minute limit was asked for; the model's 45 passes through.
        let record = complete_record(&raw(json!({"prep_time_minutes": 45})));
        assert_eq!(record.prep_time_minutes, 45);
    }

    #[test]
    fn difficulty_is_case_insensitive() {
        for (given, expected) in [
            (json!("hard"), DifficultyLevel::Hard),
            (json!(" Medium "), DifficultyLevel::Medium),
            (json!("N/A"), DifficultyLevel::NotApplicable),
            (json!("moderate"), DifficultyLevel::NotApplicable),
            (json!(3), DifficultyLevel::NotApplicable),
        ] {
            let record = complete_record(&raw(json!({"difficulty_level": given})));
            assert_eq!(record.difficulty_level, expected);
        }
    }

    #[test]
    fn fallback_is_fixed() {
        let fallback = fallback_recipe();
        assert_eq!(fallback.title, "Fallback Recipe (AI Failed)");
        assert_eq!(fallback.ingredients.len(), 2);
        assert_eq!(fallback.instructions.len(), 2);
        assert_eq!(fallback.prep_time_minutes, 5);
        assert_eq!(fallback.difficulty_level, DifficultyLevel::Easy);
        assert_eq!(fallback.estimated_calories, 200);
        assert_eq!(fallback.recipe_id, "TEMP_ID");
        assert_eq!(fallback, fallback_recipe());
    }
}
