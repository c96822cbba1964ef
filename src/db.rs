//! SQLite database connection management.
//!
//! Provides a connection pool to the SQLite database that backs the vector
//! index. The database file and its parent directories are created
//! automatically if they don't exist.
//!
//! # Durability
//!
//! WAL mode is enabled so queries can read while a reindex writes, and
//! `synchronous = FULL` makes every committed transaction durable before the
//! write call returns.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;

use crate::error::Result;

/// Create a connection pool to the SQLite database at `db_path`.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
