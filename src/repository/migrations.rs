//! Schema migrations using cetane.
//!
//! Migrations run over a plain rusqlite connection on a blocking task, before
//! any async connection is opened. Applied names are kept in
//! `__cetane_migrations`.

use std::path::Path;

use cetane::migrator::MigrationStateStore;
use tracing::{debug, info};

use super::pool::DbError;

fn migration_error(msg: impl std::fmt::Display) -> DbError {
    DbError::QueryBuilderError(msg.to_string().into())
}

/// Run pending migrations for a SQLite database URL or path.
pub async fn run_migrations(database_url: &str) -> Result<Vec<String>, DbError> {
    use cetane::backend::Sqlite;
    use cetane::migrator::Migrator;

    let path = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url)
        .to_string();

    tokio::task::spawn_blocking(move || {
        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(migration_error)?;
            }
        }

        let conn = rusqlite::Connection::open(&path).map_err(migration_error)?;
        let registry = crate::migrations::registry();

        let log = AppliedLog::open(&conn)?;
        let mut migrator = Migrator::new(&registry, &Sqlite, log);
        let applied = migrator
            .migrate_forward(|sql| {
                debug!("Executing migration SQL on {}", path);
                conn.execute_batch(sql).map_err(|e| e.to_string())
            })
            .map_err(migration_error)?;

        if applied.is_empty() {
            debug!("Schema of {} is current", path);
        }
        for name in &applied {
            info!("Applied migration {} to {}", name, path);
        }

        Ok(applied.iter().map(|name| name.to_string()).collect())
    })
    .await
    .map_err(|e| DbError::QueryBuilderError(Box::new(e)))?
}

/// Applied-migration bookkeeping in the migrated database itself.
struct AppliedLog<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> AppliedLog<'a> {
    fn open(conn: &'a rusqlite::Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS __cetane_migrations (
                name TEXT PRIMARY KEY NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .map_err(migration_error)?;

        Ok(Self { conn })
    }
}

impl MigrationStateStore for AppliedLog<'_> {
    fn applied_migrations(&mut self) -> Result<Vec<String>, String> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM __cetane_migrations ORDER BY name")
            .map_err(|e| e.to_string())?;

        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| e.to_string())?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| e.to_string())?;

        Ok(names)
    }

    fn mark_applied(&mut self, name: &str) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO __cetane_migrations (name) VALUES (?1)",
                [name],
            )
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn mark_unapplied(&mut self, name: &str) -> Result<(), String> {
        self.conn
            .execute("DELETE FROM __cetane_migrations WHERE name = ?1", [name])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
