use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;

/// Named-area key/value store. Values are opaque strings; callers own the
/// encoding. Every `put` overwrites the previous value for `(area, key)`.
pub struct PreferenceStore {
    connection: Connection,
}

impl PreferenceStore {
    pub fn open(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(database_path)?;
        log::info!("preference store opened at {}", database_path.display());
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        run_preference_migrations(&connection)?;
        Ok(Self { connection })
    }

    pub fn get(&self, area: &str, key: &str) -> Result<Option<String>> {
        let value = self
            .connection
            .query_row(
                "SELECT value FROM preferences WHERE area = ?1 AND key = ?2",
                params![area, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, area: &str, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().timestamp_millis();
        self.connection.execute(
            "INSERT INTO preferences (area, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(area, key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![area, key, value, updated_at],
        )?;
        Ok(())
    }
}

fn run_preference_migrations(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS preferences (
            area TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (area, key)
        );
        "#,
    )?;
    Ok(())
}
