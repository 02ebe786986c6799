//! SQLite connection handling for the settings database.
//!
//! The controller is the only writer, so the pool stays small. Writes use
//! WAL with `synchronous = FULL`: losing the last flush after a power cut
//! would silently hand back an emergency use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Connections kept by an on-disk pool: the flushing writer plus one for
/// template reads during a resync.
const POOL_SIZE: u32 = 2;

/// Where and how to open the settings database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,

    /// Create the file (and missing parent directories) on first open
    pub create_if_missing: bool,

    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,

    /// Apply embedded migrations after opening
    pub migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("latchkey.db")
    }
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }
}

/// Handle to the settings database. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database described by `config`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use latchkey_storage::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::open(DatabaseConfig::new("/var/lib/latchkey/settings.db")).await?;
    /// db.health_check().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the parent directory cannot be created, the file is missing
    /// and `create_if_missing` is off, or a migration fails.
    pub async fn open(config: DatabaseConfig) -> StorageResult<Self> {
        if config.create_if_missing {
            ensure_parent_dir(&config.path)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(config.busy_timeout)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .connect_with(options)
            .await?;
        info!(path = %config.path.display(), "Settings database opened");

        let db = Self { pool };
        if config.migrate {
            db.migrate().await?;
        }
        Ok(db)
    }

    /// A private in-memory database, migrated and ready. Used by tests.
    ///
    /// The single connection is never reaped, since closing it would drop
    /// the data.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the migrations embedded from the workspace `migrations/` directory.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("Settings schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close them all.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        let (one,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        if one != 1 {
            return Err(StorageError::Corrupt(format!("health check returned {}", one)));
        }
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(parent).map_err(|source| StorageError::Directory {
        path: parent.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_setters() {
        let config = DatabaseConfig::new("/tmp/door.db")
            .create_if_missing(false)
            .busy_timeout(Duration::from_millis(250))
            .migrate(false);

        assert_eq!(config.path, PathBuf::from("/tmp/door.db"));
        assert!(!config.create_if_missing);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.migrate);
    }

    #[test]
    fn test_config_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, PathBuf::from("latchkey.db"));
        assert!(config.create_if_missing);
        assert!(config.migrate);
    }

    #[test]
    fn test_bare_file_name_needs_no_directory() {
        ensure_parent_dir(Path::new("latchkey.db")).unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_is_migrated() {
        let db = Database::in_memory().await.unwrap();
        db.health_check().await.unwrap();

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'settings'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }
}
