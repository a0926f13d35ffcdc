use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

const MIGRATIONS: [&str; 1] = [include_str!("migrations/01-saved-recipes.sql")];

#[derive(Clone)]
pub struct Database {
    pub pool: r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>,
}

impl Database {
    /// Open (creating if needed) the SQLite file at `path` and bring it up to date.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating database directory {}", parent.display()))?;
        }
        let manager = r2d2_sqlite::SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = r2d2::Pool::new(manager)?;
        let me = Self { pool };
        me.migrate().await?;
        Ok(me)
    }

    /// The migration count recorded in `metadata`, or 0 for a fresh file.
    pub fn schema_version(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                rusqlite::params![],
                |row| row.get(0),
            )
            .ok();
        Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Apply whichever migrations the file hasn't seen yet.
    async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version()?;
        tracing::info!("Current schema version: {}", current_version);
        let conn = self.pool.get()?;
        for (number, migration) in MIGRATIONS.iter().enumerate().skip(current_version) {
            tracing::warn!("Applying migration {}", number + 1);
            conn.execute_batch(migration)
                .with_context(|| format!("Applying migration {}", number + 1))?;
        }
        Ok(())
    }

    /// Convenience method to collect rows from a query into a Vec.
    pub fn collect_rows<T: FromRow, P: rusqlite::Params>(
        &self,
        sql: &str,
        parameters: P,
    ) -> Result<Vec<T>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query(parameters)?;
        rows.mapped(T::from_row)
            .map(|r| r.map_err(Into::into))
            .collect::<Result<_>>()
    }
}

pub trait FromRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self>
    where
        Self: Sized;
}
