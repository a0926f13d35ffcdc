use mise::basic_models::RecipeRequest;

/// One line per constraint the user actually gave, in a fixed order.
pub fn constraint_lines(request: &RecipeRequest) -> Vec<String> {
    let mut lines = vec![];
    if let Some(cuisine) = &request.cuisine {
        lines.push(format!("Cuisine: {}.", cuisine.trim()));
    }
    if let Some(minutes) = request.max_time_minutes {
        lines.push(format!(
            "Total time must be <= {minutes} minutes (prep_time_minutes <= {minutes})."
        ));
    }
    if let Some(restrictions) = &request.dietary_restrictions {
        lines.push(format!(
            "Dietary restrictions to respect: {}.",
            restrictions.trim()
        ));
    }
    if let Some(difficulty) = request.difficulty {
        lines.push(format!("Difficulty level: {difficulty}."));
    }
    if let Some(notes) = &request.notes {
        lines.push(format!("Other details: {}.", notes.trim()));
    }
    lines
}

/// The constraints section. Never empty, so the model always sees the same shape.
pub fn constraints_block(request: &RecipeRequest) -> String {
    let lines = constraint_lines(request);
    if lines.is_empty() {
        return "Constraints:\n- None specified.".to_string();
    }
    let bullets = lines
        .iter()
        .map(|line| format!("- {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Constraints:\n{bullets}")
}

/// Render a request into the instruction sent to the text model.
pub fn build_prompt(request: &RecipeRequest) -> String {
    let query = request.query.trim();
    let constraints = constraints_block(request);
    let time_rule = match request.max_time_minutes {
        Some(minutes) => format!("- Keep prep_time_minutes <= {minutes}."),
        None => "- If a max time is provided, keep prep_time_minutes <= that value.".to_string(),
    };
    format!(
        r#"Create a cooking recipe in JSON using the user's ingredients or idea.

User query: "{query}"

{constraints}

Return ONLY JSON like:
[
  {{
    "title": "...",
    "ingredients": [
      {{ "name": "...", "quantity": "..." }}
    ],
    "instructions": ["step 1", "step 2"],
    "prep_time_minutes": 10,
    "difficulty_level": "EASY",
    "estimated_calories": 250,
    "image_prompt": "A short description of the finished dish for a food photo",
    "recipe_id": "TEMP_ID"
  }}
]

Rules:
- Obey dietary restrictions if given.
{time_rule}
- If a difficulty is provided, make instructions match it (short for EASY, more steps for HARD).
- Return an ARRAY with exactly ONE recipe object.
- Do not wrap the JSON in markdown code fences.
- Do not add comments or prose outside JSON.
"#
    )
}
