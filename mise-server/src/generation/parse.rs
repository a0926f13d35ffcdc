//! Syntactic recovery of a recipe object from model text.
//!
//! Models are told to return a bare JSON array, but sometimes wrap it in prose
//! or code fences anyway. This only finds the object; filling in missing
//! fields is [`super::complete_record`]'s job.

use serde_json::{Map, Value};

use super::GenerationError;

/// A recipe-shaped JSON object straight from the model, not yet defaulted.
pub type RawRecipe = Map<String, Value>;

pub fn parse_model_output(text: &str) -> Result<RawRecipe, GenerationError> {
    let text = text.trim();
    match serde_json::from_str::<Value>(text) {
        Ok(value) => first_object(value),
        Err(err) => match salvage(text) {
            Some(map) => unwrap_envelope(map),
            None => Err(GenerationError::BadModelOutput(format!(
                "not JSON ({err}) and no embedded object could be recovered"
            ))),
        },
    }
}

fn first_object(value: Value) -> Result<RawRecipe, GenerationError> {
    match value {
        Value::Object(map) => unwrap_envelope(map),
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(GenerationError::BadModelOutput(format!(
                "first array element is not an object: {other}"
            ))),
            None => Err(GenerationError::BadModelOutput("empty array".into())),
        },
        other => Err(GenerationError::BadModelOutput(format!(
            "expected an object or array, got {other}"
        ))),
    }
}

/// JSON-only chat modes can't return a bare array, so the recipe may come
/// back under a single key such as `{"recipes": [...]}`.
fn unwrap_envelope(map: RawRecipe) -> Result<RawRecipe, GenerationError> {
    if map.len() == 1 && !map.contains_key("title") {
        if let Some(inner) = map.values().next().filter(|v| v.is_array() || v.is_object()) {
            return first_object(inner.clone());
        }
    }
    Ok(map)
}

/// Best effort: parse everything from the first `{` to the last `}`.
fn salvage(text: &str) -> Option<RawRecipe> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
