//! Per-user favorites.
//!
//! Each saved recipe is a JSON document keyed by `(user, slug of title)`.
//! Saving replaces whatever was there; the last writer wins.

use anyhow::{ensure, Result};
use chrono::SecondsFormat;
use mise::basic_models::{RecipeRecord, SaveReceipt, SavedRecipe};
use rusqlite::{params, OptionalExtension};

use crate::database::{Database, FromRow};

/// Sortable UTC timestamp with millisecond precision.
pub fn saved_at_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl FromRow for SavedRecipe {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let document: String = row.get("document")?;
        let recipe = serde_json::from_str(&document).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
        })?;
        Ok(Self {
            id: row.get("recipe_id")?,
            saved_at: row.get("saved_at")?,
            recipe,
        })
    }
}

/// What a save did to the slot it landed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    /// The same recipe was saved again.
    Resaved,
    /// A recipe with a different title but the same slug was overwritten.
    Collided { previous_title: String },
}

/// The saved recipes of one user.
pub struct SavedRecipes<'a> {
    db: &'a Database,
    user_id: &'a str,
}

impl<'a> SavedRecipes<'a> {
    pub fn for_user(db: &'a Database, user_id: &'a str) -> Self {
        Self { db, user_id }
    }

    /// All saved recipes, most recently saved first.
    pub fn list(&self) -> Result<Vec<SavedRecipe>> {
        self.db.collect_rows(
            "SELECT * FROM SavedRecipe
            WHERE user_id = ?
            ORDER BY saved_at DESC, rowid DESC",
            params![self.user_id],
        )
    }

    pub fn get(&self, recipe_id: &str) -> Result<Option<SavedRecipe>> {
        Ok(self
            .db
            .collect_rows(
                "SELECT * FROM SavedRecipe WHERE user_id = ? AND recipe_id = ?",
                params![self.user_id, recipe_id],
            )?
            .pop())
    }

    /// Save a recipe under the slug of its title.
    pub fn save(&self, recipe: &RecipeRecord) -> Result<(SaveReceipt, SaveOutcome)> {
        let recipe_id = recipe.slug();
        ensure!(
            !recipe.title.trim().is_empty(),
            "Cannot save a recipe without a title"
        );
        let document = serde_json::to_string(recipe)?;
        let saved_at = saved_at_timestamp();

        let mut conn = self.db.pool.get()?;
        let tx = conn.transaction()?;
        let previous_title: Option<String> = tx
            .query_row(
                "SELECT title FROM SavedRecipe WHERE user_id = ? AND recipe_id = ?",
                params![self.user_id, recipe_id],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute(
            "INSERT OR REPLACE INTO SavedRecipe (user_id, recipe_id, title, document, saved_at)
            VALUES (?, ?, ?, ?, ?)",
            params![self.user_id, recipe_id, recipe.title, document, saved_at],
        )?;
        tx.commit()?;

        let outcome = match previous_title {
            None => SaveOutcome::Created,
            Some(title) if title == recipe.title => SaveOutcome::Resaved,
            Some(title) => {
                tracing::warn!(
                    user = self.user_id,
                    recipe_id = %recipe_id,
                    "Saving {:?} replaced {:?}, which has the same id",
                    recipe.title,
                    title
                );
                SaveOutcome::Collided {
                    previous_title: title,
                }
            }
        };
        let receipt = SaveReceipt {
            id: recipe_id,
            saved_at,
            replaced_title: match &outcome {
                SaveOutcome::Collided { previous_title } => Some(previous_title.clone()),
                _ => None,
            },
        };
        Ok((receipt, outcome))
    }

    /// Remove a saved recipe. Returns false when there was nothing to remove.
    pub fn delete(&self, recipe_id: &str) -> Result<bool> {
        let conn = self.db.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM SavedRecipe WHERE user_id = ? AND recipe_id = ?",
            params![self.user_id, recipe_id],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mise::basic_models::{DifficultyLevel, Ingredient};

    fn recipe(title: &str) -> RecipeRecord {
        RecipeRecord {
            title: title.into(),
            ingredients: vec![Ingredient::new("Egg", "2")],
            instructions: vec!["Crack the eggs.".into()],
            prep_time_minutes: 5,
            difficulty_level: DifficultyLevel::Easy,
            estimated_calories: 150,
            image_prompt: None,
            recipe_id: "TEMP_ID".into(),
            image_url: Some("/generated/0123456789abcdef.png".into()),
        }
    }

    async fn database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(&dir.path().join("nested/saved.db"))
            .await
            .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn save_get_delete() {
        let (_dir, db) = database().await;
        let store = SavedRecipes::for_user(&db, "alice");

        let (receipt, outcome) = store.save(&recipe("Scrambled Eggs")).unwrap();
        assert_eq!(receipt.id, "scrambled-eggs");
        assert_eq!(outcome, SaveOutcome::Created);

        let saved = store.get("scrambled-eggs").unwrap().unwrap();
        assert_eq!(saved.recipe, recipe("Scrambled Eggs"));
        assert_eq!(saved.saved_at, receipt.saved_at);

        assert!(store.delete("scrambled-eggs").unwrap());
        assert!(!store.delete("scrambled-eggs").unwrap());
        assert!(store.get("scrambled-eggs").unwrap().is_none());
    }

    #[tokio::test]
    async fn users_do_not_share_favorites() {
        let (_dir, db) = database().await;
        SavedRecipes::for_user(&db, "alice")
            .save(&recipe("Toast"))
            .unwrap();
        assert!(SavedRecipes::for_user(&db, "bob").list().unwrap().is_empty());
        assert!(SavedRecipes::for_user(&db, "bob").get("toast").unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (_dir, db) = database().await;
        let store = SavedRecipes::for_user(&db, "alice");
        store.save(&recipe("Toast")).unwrap();
        store.save(&recipe("Soup")).unwrap();
        store.save(&recipe("Salad")).unwrap();
        // Re-saving moves a recipe back to the top
        store.save(&recipe("Toast")).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["toast", "salad", "soup"]);
    }

    #[tokio::test]
    async fn slug_collisions_are_reported() {
        let (_dir, db) = database().await;
        let store = SavedRecipes::for_user(&db, "alice");
        store.save(&recipe("Mac & Cheese")).unwrap();

        let (_, outcome) = store.save(&recipe("Mac & Cheese")).unwrap();
        assert_eq!(outcome, SaveOutcome::Resaved);

        let (receipt, outcome) = store.save(&recipe("Mac + Cheese")).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Collided {
                previous_title: "Mac & Cheese".into()
            }
        );
        assert_eq!(receipt.replaced_title.as_deref(), Some("Mac & Cheese"));
        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].recipe.title, "Mac + Cheese");
    }

    #[tokio::test]
    async fn untitled_recipes_cannot_be_saved() {
        let (_dir, db) = database().await;
        assert!(SavedRecipes::for_user(&db, "alice")
            .save(&recipe("  "))
            .is_err());
    }
}
