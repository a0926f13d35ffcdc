use anyhow::Result;
use clap::{Parser, Subcommand};
use mise_client::{api::MiseClient, presenter::caption};

/// List or remove a user's saved recipes
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Whose favorites to look at
    #[arg(long, env = "MISE_USER")]
    user: String,
    /// URL of the server
    #[arg(long, default_value = "http://localhost:3001")]
    server: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every saved recipe, newest first
    List,
    /// Remove a saved recipe by id
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if dotenvy::dotenv().is_err() {
        eprintln!("Warning: Failed to load .env file");
    }
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let client = MiseClient::new(&args.server).with_user(&args.user);

    match args.command.unwrap_or(Command::List) {
        Command::List => {
            let saved = match client.saved().await {
                Ok(saved) => saved,
                Err(e) => {
                    eprintln!("\nCould not load saved recipes from {}", args.server);
                    if args.server.starts_with("https://localhost")
                        || args.server.starts_with("https://127.0.0.1")
                    {
                        eprintln!("\nHint: Local dev servers typically use HTTP, not HTTPS.");
                        eprintln!("Try: cargo run --bin mise-saved -- --server http://localhost:3001");
                    }
                    return Err(e);
                }
            };
            if saved.is_empty() {
                println!("No saved recipes yet.");
            }
            for recipe in saved {
                println!("{}  {}", recipe.id, recipe.recipe.title);
                println!("    {}", caption(&recipe.recipe.instructions));
                println!("    saved {}", recipe.saved_at);
            }
        }
        Command::Remove { id } => {
            if client.unsave(&id).await? {
                println!("Removed {id}");
            } else {
                println!("{id} was not saved");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
