use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use mise::basic_models::{Difficulty, RecipeRequest};
use mise_client::api::MiseClient;

/// Ask the server for a recipe
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Ingredients or an idea, e.g. "eggs and toast"
    query: Vec<String>,
    /// Detect ingredients from a photo and add them to the query
    #[arg(short, long)]
    photo: Option<PathBuf>,
    #[arg(short, long)]
    cuisine: Option<String>,
    /// Upper limit on total time, in minutes
    #[arg(short = 't', long)]
    max_time: Option<u32>,
    /// Dietary restrictions to respect
    #[arg(long)]
    diet: Option<String>,
    #[arg(short, long)]
    difficulty: Option<Level>,
    /// Anything else the recipe should take into account
    #[arg(short, long)]
    notes: Option<String>,
    /// Also generate a picture of the dish
    #[arg(short, long)]
    image: bool,
    /// Save the recipe to this user's favorites
    #[arg(long)]
    save_as: Option<String>,
    /// URL of the server
    #[arg(long, default_value = "http://localhost:3001")]
    server: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Level {
    Easy,
    Medium,
    Hard,
}

impl From<Level> for Difficulty {
    fn from(level: Level) -> Self {
        match level {
            Level::Easy => Difficulty::Easy,
            Level::Medium => Difficulty::Medium,
            Level::Hard => Difficulty::Hard,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let client = MiseClient::new(&args.server);

    let mut query = args.query.join(" ");
    if let Some(photo) = &args.photo {
        let found = client.detect_ingredients(photo).await?;
        println!("Detected: {}", found.join(", "));
        if !found.is_empty() {
            if !query.trim().is_empty() {
                query.push_str(", ");
            }
            query.push_str(&found.join(", "));
        }
    }

    let request = RecipeRequest {
        query,
        cuisine: args.cuisine,
        max_time_minutes: args.max_time.filter(|m| *m > 0),
        dietary_restrictions: args.diet,
        difficulty: args.difficulty.map(Difficulty::from),
        notes: args.notes,
    };
    let mut recipe = client.generate(&request).await?;

    if args.image && !recipe.image_prompt.is_empty() {
        match client.illustrate(&recipe.image_prompt).await {
            Ok(url) => recipe.image_url = url,
            Err(err) => tracing::warn!("No picture this time: {err:#}"),
        }
    }

    println!("# {}\n", recipe.title);
    println!(
        "Time: {} min | Difficulty: {} | About {} kcal\n",
        recipe.prep_time, recipe.difficulty, recipe.estimated_calories
    );
    println!("## Ingredients");
    for ingredient in &recipe.ingredients {
        if ingredient.quantity.is_empty() {
            println!("- {}", ingredient.name);
        } else {
            println!("- {} ({})", ingredient.name, ingredient.quantity);
        }
    }
    println!("\n## Steps");
    for (number, step) in recipe.instructions.iter().enumerate() {
        println!("{}. {step}", number + 1);
    }
    if !recipe.image_url.is_empty() {
        println!("\nPicture: {}", recipe.image_url);
    }

    if let Some(user) = args.save_as {
        let receipt = client.with_user(user).save(&recipe.to_record()).await?;
        println!("\nSaved as {} at {}", receipt.id, receipt.saved_at);
    }
    Ok(())
}
