//! Write-behind property store and template blobs.
//!
//! Properties are loaded once into memory and mutated there. Every mutation
//! marks its key dirty; [`SettingsStore::flush`] writes all dirty keys in
//! one transaction. A failed flush leaves the dirty set intact, so the next
//! flush retries everything that has not reached disk yet.
//!
//! Template blobs bypass the cache and go straight to the `templates` table.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use latchkey_core::CredentialId;
use tracing::{debug, info};

use crate::connection::Database;
use crate::error::{StorageError, StorageResult};

/// In-memory view of the `settings` table with write-behind persistence.
#[derive(Debug)]
pub struct SettingsStore {
    db: Database,
    properties: BTreeMap<String, String>,
    dirty: BTreeSet<String>,
}

impl SettingsStore {
    /// Load every property from the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read. Callers treat this as
    /// fatal at startup.
    pub async fn load(db: Database) -> StorageResult<Self> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(db.pool())
            .await?;

        let properties: BTreeMap<String, String> = rows.into_iter().collect();
        info!(count = properties.len(), "Settings loaded");

        Ok(Self {
            db,
            properties,
            dirty: BTreeSet::new(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.properties.insert(key.clone(), value.into());
        self.dirty.insert(key);
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let previous = self.properties.remove(key);
        if previous.is_some() {
            self.dirty.insert(key.to_string());
        }
        previous
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Whether some mutation has not reached disk yet.
    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Write every dirty key in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns the database error. Nothing is marked clean on failure.
    pub async fn flush(&mut self) -> StorageResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        for key in &self.dirty {
            match self.properties.get(key) {
                Some(value) => {
                    sqlx::query(
                        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    )
                    .bind(key)
                    .bind(value)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM settings WHERE key = ?")
                        .bind(key)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        debug!(count = self.dirty.len(), "Settings flushed");
        self.dirty.clear();
        Ok(())
    }

    /// Every stored template, keyed by slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or a slot id is out of range.
    pub async fn load_templates(&self) -> StorageResult<BTreeMap<CredentialId, Vec<u8>>> {
        let rows: Vec<(i64, Vec<u8>)> =
            sqlx::query_as("SELECT credential_id, template FROM templates ORDER BY credential_id")
                .fetch_all(self.db.pool())
                .await?;

        rows.into_iter()
            .map(|(id, template)| {
                let id = u16::try_from(id).map_err(|_| {
                    StorageError::Corrupt(format!("template slot {} out of range", id))
                })?;
                Ok((CredentialId::new(id), template))
            })
            .collect()
    }

    pub async fn store_template(&self, id: CredentialId, template: &[u8]) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO templates (credential_id, template, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(credential_id) DO UPDATE SET template = excluded.template, updated_at = excluded.updated_at",
        )
        .bind(i64::from(id.as_u16()))
        .bind(template)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_template(&self, id: CredentialId) -> StorageResult<()> {
        sqlx::query("DELETE FROM templates WHERE credential_id = ?")
            .bind(i64::from(id.as_u16()))
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
