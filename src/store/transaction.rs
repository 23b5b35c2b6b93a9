//! Serialised read-check-write access to one license key.
//!
//! A [`LicenseTx`] is opened per validation. Opening it takes the key's row
//! lock (Postgres `SELECT ... FOR UPDATE`) or the database write lock
//! (SQLite, by making a write the first statement of the transaction), so
//! a second validation of the same key waits until the first commits and
//! then sees its activation row.

use chrono::NaiveDateTime;
use tracing::debug;

use super::database::{query_failed, Database};
use super::licenses::{ActivationRecord, LicenseRecord};
use crate::errors::VocabResult;
use crate::hardware::MachineId;

/// An open transaction holding the lock on one license key.
///
/// Dropping it without [`LicenseTx::commit`] rolls back.
pub enum LicenseTx {
    #[cfg(feature = "sqlite")]
    SQLite(sqlx::Transaction<'static, sqlx::Sqlite>),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
}

impl Database {
    /// Begin a transaction and lock `license_key` for the rest of it.
    ///
    /// Locking a key that does not exist is allowed; the caller then sees
    /// no license row.
    pub async fn begin_license_tx(&self, license_key: &str) -> VocabResult<LicenseTx> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(|e| query_failed("SQLite", "begin", e))?;
                // No-op write: acquires the write lock before anything is read.
                sqlx::query(
                    "UPDATE license_keys SET max_activations = max_activations \
                     WHERE license_key = ?",
                )
                .bind(license_key)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_failed("SQLite", "lock_license", e))?;
                debug!("Locked license {license_key}");
                Ok(LicenseTx::SQLite(tx))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(|e| query_failed("Postgres", "begin", e))?;
                sqlx::query("SELECT license_key FROM license_keys WHERE license_key = $1 FOR UPDATE")
                    .bind(license_key)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| query_failed("Postgres", "lock_license", e))?;
                debug!("Locked license {license_key}");
                Ok(LicenseTx::Postgres(tx))
            }
        }
    }
}

impl LicenseTx {
    pub async fn get_license(&mut self, license_key: &str) -> VocabResult<Option<LicenseRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            LicenseTx::SQLite(tx) => sqlx::query_as::<_, LicenseRecord>(
                "SELECT license_key, status, expiry_date, max_activations, machine_id, \
                 created_at FROM license_keys WHERE license_key = ?",
            )
            .bind(license_key)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| query_failed("SQLite", "get_license", e)),
            #[cfg(feature = "postgres")]
            LicenseTx::Postgres(tx) => sqlx::query_as::<_, LicenseRecord>(
                "SELECT license_key, status, expiry_date, max_activations, machine_id, \
                 created_at FROM license_keys WHERE license_key = $1",
            )
            .bind(license_key)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| query_failed("Postgres", "get_license", e)),
        }
    }

    pub async fn get_activation(
        &mut self,
        license_key: &str,
        machine: &MachineId,
    ) -> VocabResult<Option<ActivationRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            LicenseTx::SQLite(tx) => sqlx::query_as::<_, ActivationRecord>(
                "SELECT license_key, machine_id, activated_at FROM machine_activations \
                 WHERE license_key = ? AND machine_id = ?",
            )
            .bind(license_key)
            .bind(machine.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| query_failed("SQLite", "get_activation", e)),
            #[cfg(feature = "postgres")]
            LicenseTx::Postgres(tx) => sqlx::query_as::<_, ActivationRecord>(
                "SELECT license_key, machine_id, activated_at FROM machine_activations \
                 WHERE license_key = $1 AND machine_id = $2",
            )
            .bind(license_key)
            .bind(machine.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| query_failed("Postgres", "get_activation", e)),
        }
    }

    pub async fn count_activations(&mut self, license_key: &str) -> VocabResult<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            LicenseTx::SQLite(tx) => sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM machine_activations WHERE license_key = ?",
            )
            .bind(license_key)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| query_failed("SQLite", "count_activations", e)),
            #[cfg(feature = "postgres")]
            LicenseTx::Postgres(tx) => sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM machine_activations WHERE license_key = $1",
            )
            .bind(license_key)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| query_failed("Postgres", "count_activations", e)),
        }
    }

    /// Record an activation.
    ///
    /// Returns `Ok(false)` if the (key, machine) pair already existed; the
    /// unique constraint turns the duplicate into a no-op.
    pub async fn insert_activation(
        &mut self,
        license_key: &str,
        machine: &MachineId,
        activated_at: NaiveDateTime,
    ) -> VocabResult<bool> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            LicenseTx::SQLite(tx) => sqlx::query(
                "INSERT INTO machine_activations (license_key, machine_id, activated_at) \
                 VALUES (?, ?, ?) ON CONFLICT (license_key, machine_id) DO NOTHING",
            )
            .bind(license_key)
            .bind(machine.as_str())
            .bind(activated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| query_failed("SQLite", "insert_activation", e))?,
            #[cfg(feature = "postgres")]
            LicenseTx::Postgres(tx) => sqlx::query(
                "INSERT INTO machine_activations (license_key, machine_id, activated_at) \
                 VALUES ($1, $2, $3) ON CONFLICT (license_key, machine_id) DO NOTHING",
            )
            .bind(license_key)
            .bind(machine.as_str())
            .bind(activated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| query_failed("Postgres", "insert_activation", e))?,
        };

        Ok(result.rows_affected() > 0)
    }

    pub async fn commit(self) -> VocabResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            LicenseTx::SQLite(tx) => tx
                .commit()
                .await
                .map_err(|e| query_failed("SQLite", "commit", e)),
            #[cfg(feature = "postgres")]
            LicenseTx::Postgres(tx) => tx
                .commit()
                .await
                .map_err(|e| query_failed("Postgres", "commit", e)),
        }
    }
}
