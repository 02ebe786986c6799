//! Persistence for the Latchkey access point.
//!
//! This crate keeps the controller's settings and the enrolled fingerprint
//! templates in SQLite.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with automatic migrations
//! - [`SettingsStore`] - In-memory property map with write-behind flushing
//! - [`credentials`] - Typed credential records layered on the property map
//!
//! # Examples
//!
//! ```no_run
//! use latchkey_core::{Credential, CredentialId};
//! use latchkey_storage::{Database, DatabaseConfig, SettingsStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(DatabaseConfig::new("latchkey.db")).await?;
//! let mut settings = SettingsStore::load(db).await?;
//!
//! settings.put_credential(&Credential::enrolled(CredentialId::new(0)));
//! settings.flush().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Failure Model
//!
//! Loading is all-or-nothing and a failure is meant to stop the process.
//! Flushing is best effort: a failed flush keeps the unsaved keys and the
//! next flush retries them.

pub mod connection;
pub mod credentials;
pub mod error;
pub mod settings;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use settings::SettingsStore;
