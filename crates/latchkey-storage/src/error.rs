use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row that the schema allows but the settings model cannot hold
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The directory meant to hold the database file could not be created
    #[error("Cannot create database directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
