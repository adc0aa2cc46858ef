//! SQLite connection pool.
//!
//! Connections are created on demand; SQLite has no server to hold them open.
//! A crawl, a feed download, and an upload run may share one database file,
//! so every connection waits on locks instead of failing immediately.

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

use super::util::to_diesel_error;

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// Milliseconds a connection waits for a competing writer.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Lightweight pool: one fresh connection per operation.
#[derive(Debug, Clone)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    /// Accepts a plain path or a `sqlite:` URL.
    pub fn new(database_url: &str) -> Self {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_diesel_error)?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
            .await?;
        Ok(conn)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
