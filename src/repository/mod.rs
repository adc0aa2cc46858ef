//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against a SQLite database.

pub mod item;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod util;

pub use item::{ItemRepository, UploadStats};
pub use migrations::run_migrations;
pub use pool::{DbError, SqlitePool};

/// Open the item store at `database_url`, applying pending migrations first.
pub async fn open(database_url: &str) -> Result<ItemRepository, DbError> {
    run_migrations(database_url).await?;
    Ok(ItemRepository::new(SqlitePool::new(database_url)))
}
