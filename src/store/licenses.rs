//! License store and activation ledger.
//!
//! `license_keys` rows are provisioned by an administrator; this module also
//! carries the administrative writes. `machine_activations` rows are written
//! by the validator (see [`super::LicenseTx`]) and read here.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use tracing::debug;

use super::database::{is_unique_violation, query_failed, Database};
use crate::errors::{VocabError, VocabResult};
use crate::hardware::MachineId;

/// Stored license status.
///
/// Exhaustion is not a status: it is derived from the activation count.
/// `Used` only appears on rows written by one-shot deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Used,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Used => "used",
            LicenseStatus::Revoked => "revoked",
        }
    }

    /// Case-insensitive parse of a stored value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(LicenseStatus::Active),
            "used" => Some(LicenseStatus::Used),
            "revoked" => Some(LicenseStatus::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of `license_keys`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LicenseRecord {
    pub license_key: String,
    pub status: String,
    pub expiry_date: Option<NaiveDate>,
    pub max_activations: i64,
    /// Machine the key is pinned to, if provisioned that way.
    pub machine_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl LicenseRecord {
    /// Parsed status; `None` for values this build does not know.
    pub fn status(&self) -> Option<LicenseStatus> {
        LicenseStatus::parse(&self.status)
    }

    /// Expired means the expiry date is strictly before `today`.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < today)
    }

    /// True if the key is pinned to a machine other than `machine`.
    pub fn is_pinned_elsewhere(&self, machine: &MachineId) -> bool {
        self.machine_id
            .as_deref()
            .is_some_and(|pinned| pinned != machine.as_str())
    }
}

/// A row of `machine_activations`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivationRecord {
    pub license_key: String,
    pub machine_id: String,
    pub activated_at: NaiveDateTime,
}

/// Input for provisioning a key.
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub license_key: String,
    pub expiry_date: Option<NaiveDate>,
    pub max_activations: u32,
    pub machine_id: Option<MachineId>,
}

impl NewLicense {
    pub fn new(license_key: impl Into<String>) -> Self {
        Self {
            license_key: license_key.into(),
            expiry_date: None,
            max_activations: 1,
            machine_id: None,
        }
    }

    pub fn expires_on(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }

    pub fn max_activations(mut self, max: u32) -> Self {
        self.max_activations = max;
        self
    }

    pub fn pinned_to(mut self, machine: MachineId) -> Self {
        self.machine_id = Some(machine);
        self
    }
}

impl Database {
    /// Insert a new license key with status `active`.
    ///
    /// Fails with `DuplicateLicenseKey` if the key exists.
    pub async fn provision_license(
        &self,
        license: &NewLicense,
        created_at: NaiveDateTime,
    ) -> VocabResult<()> {
        if license.license_key.trim().is_empty() {
            return Err(VocabError::InvalidInput(
                "license key cannot be empty".to_string(),
            ));
        }
        if license.max_activations == 0 {
            return Err(VocabError::InvalidInput(
                "max_activations must be at least 1".to_string(),
            ));
        }

        let machine = license.machine_id.as_ref().map(|m| m.as_str().to_string());
        let max = i64::from(license.max_activations);

        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => sqlx::query(
                "INSERT INTO license_keys \
                 (license_key, status, expiry_date, max_activations, machine_id, created_at) \
                 VALUES (?, 'active', ?, ?, ?, ?)",
            )
            .bind(&license.license_key)
            .bind(license.expiry_date)
            .bind(max)
            .bind(&machine)
            .bind(created_at)
            .execute(pool)
            .await
            .map(|_| ()),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => sqlx::query(
                "INSERT INTO license_keys \
                 (license_key, status, expiry_date, max_activations, machine_id, created_at) \
                 VALUES ($1, 'active', $2, $3, $4, $5)",
            )
            .bind(&license.license_key)
            .bind(license.expiry_date)
            .bind(max)
            .bind(&machine)
            .bind(created_at)
            .execute(pool)
            .await
            .map(|_| ()),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(VocabError::DuplicateLicenseKey(
                license.license_key.clone(),
            )),
            Err(e) => Err(query_failed(self.backend_name(), "provision_license", e)),
        }
    }

    /// Fetch a license by key.
    pub async fn get_license(&self, license_key: &str) -> VocabResult<Option<LicenseRecord>> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, LicenseRecord>(
                    "SELECT license_key, status, expiry_date, max_activations, machine_id, \
                     created_at FROM license_keys WHERE license_key = ?",
                )
                .bind(license_key)
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, LicenseRecord>(
                    "SELECT license_key, status, expiry_date, max_activations, machine_id, \
                     created_at FROM license_keys WHERE license_key = $1",
                )
                .bind(license_key)
                .fetch_optional(pool)
                .await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "get_license", e))
    }

    pub async fn license_exists(&self, license_key: &str) -> VocabResult<bool> {
        Ok(self.get_license(license_key).await?.is_some())
    }

    /// All keys, ordered by creation time.
    pub async fn list_licenses(&self) -> VocabResult<Vec<LicenseRecord>> {
        let sql = "SELECT license_key, status, expiry_date, max_activations, machine_id, \
                   created_at FROM license_keys ORDER BY created_at, license_key";
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, LicenseRecord>(sql).fetch_all(pool).await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, LicenseRecord>(sql).fetch_all(pool).await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "list_licenses", e))
    }

    /// Set the stored status of a key.
    ///
    /// Returns `Ok(false)` if no such key exists. Revocation is terminal:
    /// moving a revoked key to any other status is `InvalidInput`.
    pub async fn update_license_status(
        &self,
        license_key: &str,
        status: LicenseStatus,
    ) -> VocabResult<bool> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query(
                    "UPDATE license_keys SET status = ? \
                     WHERE license_key = ? AND (status <> 'revoked' OR ? = 'revoked')",
                )
                .bind(status.as_str())
                .bind(license_key)
                .bind(status.as_str())
                .execute(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query(
                    "UPDATE license_keys SET status = $1 \
                     WHERE license_key = $2 AND (status <> 'revoked' OR $1 = 'revoked')",
                )
                .bind(status.as_str())
                .bind(license_key)
                .execute(pool)
                .await
            }
        };

        let rows = result
            .map_err(|e| query_failed(self.backend_name(), "update_license_status", e))?
            .rows_affected();
        debug!("Set status of {license_key} to {status} ({rows} row(s))");

        if rows == 0 && self.license_exists(license_key).await? {
            return Err(VocabError::InvalidInput(format!(
                "license {license_key} is revoked; revocation is final"
            )));
        }
        Ok(rows > 0)
    }

    /// Number of machines that activated `license_key`.
    pub async fn count_activations(&self, license_key: &str) -> VocabResult<i64> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM machine_activations WHERE license_key = ?",
                )
                .bind(license_key)
                .fetch_one(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM machine_activations WHERE license_key = $1",
                )
                .bind(license_key)
                .fetch_one(pool)
                .await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "count_activations", e))
    }

    /// The activation of `license_key` on `machine`, if any.
    pub async fn get_activation(
        &self,
        license_key: &str,
        machine: &MachineId,
    ) -> VocabResult<Option<ActivationRecord>> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, ActivationRecord>(
                    "SELECT license_key, machine_id, activated_at FROM machine_activations \
                     WHERE license_key = ? AND machine_id = ?",
                )
                .bind(license_key)
                .bind(machine.as_str())
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, ActivationRecord>(
                    "SELECT license_key, machine_id, activated_at FROM machine_activations \
                     WHERE license_key = $1 AND machine_id = $2",
                )
                .bind(license_key)
                .bind(machine.as_str())
                .fetch_optional(pool)
                .await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "get_activation", e))
    }

    /// Every activation held by `machine`, oldest first.
    pub async fn activations_for_machine(
        &self,
        machine: &MachineId,
    ) -> VocabResult<Vec<ActivationRecord>> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, ActivationRecord>(
                    "SELECT license_key, machine_id, activated_at FROM machine_activations \
                     WHERE machine_id = ? ORDER BY activated_at",
                )
                .bind(machine.as_str())
                .fetch_all(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, ActivationRecord>(
                    "SELECT license_key, machine_id, activated_at FROM machine_activations \
                     WHERE machine_id = $1 ORDER BY activated_at",
                )
                .bind(machine.as_str())
                .fetch_all(pool)
                .await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "activations_for_machine", e))
    }

    /// Every activation of `license_key`, oldest first.
    pub async fn activations_for_license(
        &self,
        license_key: &str,
    ) -> VocabResult<Vec<ActivationRecord>> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, ActivationRecord>(
                    "SELECT license_key, machine_id, activated_at FROM machine_activations \
                     WHERE license_key = ? ORDER BY activated_at",
                )
                .bind(license_key)
                .fetch_all(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, ActivationRecord>(
                    "SELECT license_key, machine_id, activated_at FROM machine_activations \
                     WHERE license_key = $1 ORDER BY activated_at",
                )
                .bind(license_key)
                .fetch_all(pool)
                .await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "activations_for_license", e))
    }

    /// Delete one activation, freeing a slot on the key.
    ///
    /// Returns `Ok(false)` if there was nothing to delete.
    pub async fn remove_activation(
        &self,
        license_key: &str,
        machine: &MachineId,
    ) -> VocabResult<bool> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query(
                    "DELETE FROM machine_activations WHERE license_key = ? AND machine_id = ?",
                )
                .bind(license_key)
                .bind(machine.as_str())
                .execute(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query(
                    "DELETE FROM machine_activations WHERE license_key = $1 AND machine_id = $2",
                )
                .bind(license_key)
                .bind(machine.as_str())
                .execute(pool)
                .await
            }
        };

        Ok(result
            .map_err(|e| query_failed(self.backend_name(), "remove_activation", e))?
            .rows_affected()
            > 0)
    }
}
