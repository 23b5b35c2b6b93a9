//! License validation and activation.
//!
//! [`LicenseValidator::validate`] decides whether the current machine may
//! use a key and records the activation when it may. Checks run in a fixed
//! order and the first failing one decides the outcome:
//!
//! 1. this machine already activated the key → admitted, nothing written
//! 2. key unknown → `NotFound`
//! 3. key revoked → `Revoked`
//! 4. key not active → `NotActive`
//! 5. key pinned to another machine → `AlreadyBoundToOtherMachine`
//! 6. expiry date before today → `Expired`
//! 7. activations ≥ `max_activations` → `MaxActivationsReached`
//! 8. otherwise write the activation → admitted
//!
//! All eight steps run inside one [`LicenseTx`](crate::store::LicenseTx),
//! so two machines racing for the last slot cannot both get it.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

use crate::clock::{Clock, SystemClock};
use crate::errors::{VocabError, VocabResult};
use crate::hardware::MachineId;
use crate::license_key::normalize_license_key;
use crate::logging::{generate_attempt_id, log_license_event, LicenseEvent};
use crate::store::{Database, LicenseRecord, LicenseStatus};

/// Why a key was refused. Each reason is an expected, user-facing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    NotFound,
    NotActive,
    Revoked,
    Expired,
    AlreadyBoundToOtherMachine,
    MaxActivationsReached,
}

impl DenialReason {
    /// Human-readable message for the activation prompt.
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::NotFound => "Invalid license key.",
            DenialReason::NotActive => "License key is not active.",
            DenialReason::Revoked => "License key has been revoked.",
            DenialReason::Expired => "License key has expired.",
            DenialReason::AlreadyBoundToOtherMachine => {
                "License key is already linked to another machine."
            }
            DenialReason::MaxActivationsReached => {
                "This license has already been activated on the maximum number of computers."
            }
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Admission {
    /// The machine held an activation before this call.
    AlreadyActivated,
    /// A new activation was recorded.
    Activated {
        activated_count: i64,
        max_activations: i64,
    },
}

impl Admission {
    pub fn message(&self) -> String {
        match self {
            Admission::AlreadyActivated => {
                "This machine is already activated with this license key.".to_string()
            }
            Admission::Activated {
                activated_count,
                max_activations,
            } => format!(
                "License key validated successfully and linked to this machine \
                 ({activated_count} of {max_activations} activations used)."
            ),
        }
    }
}

/// Failure of [`LicenseValidator::validate`]: a denial or a storage problem.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Denied(DenialReason),
    #[error(transparent)]
    Storage(#[from] VocabError),
}

impl ValidationError {
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            ValidationError::Denied(reason) => Some(*reason),
            ValidationError::Storage(_) => None,
        }
    }

    /// Message for the activation prompt.
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::Denied(reason) => reason.message().to_string(),
            ValidationError::Storage(e) => e.user_message(),
        }
    }
}

/// Steps 2-6: everything decidable from the key's row alone.
pub fn check_license<'a>(
    license: Option<&'a LicenseRecord>,
    machine: &MachineId,
    today: NaiveDate,
) -> Result<&'a LicenseRecord, DenialReason> {
    let license = license.ok_or(DenialReason::NotFound)?;

    match license.status() {
        Some(LicenseStatus::Revoked) => return Err(DenialReason::Revoked),
        Some(LicenseStatus::Active) => {}
        Some(LicenseStatus::Used) | None => return Err(DenialReason::NotActive),
    }
    if license.is_pinned_elsewhere(machine) {
        return Err(DenialReason::AlreadyBoundToOtherMachine);
    }
    if license.is_expired_on(today) {
        return Err(DenialReason::Expired);
    }

    Ok(license)
}

/// Step 7.
pub fn check_capacity(license: &LicenseRecord, activated_count: i64) -> Result<(), DenialReason> {
    if activated_count >= license.max_activations {
        return Err(DenialReason::MaxActivationsReached);
    }
    Ok(())
}

/// One key's state as seen from a machine that activated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseStatusReport {
    pub license_key: String,
    pub status: String,
    pub expiry_date: Option<NaiveDate>,
    pub max_activations: i64,
    pub activated_count: i64,
    pub activated_at: NaiveDateTime,
}

impl LicenseStatusReport {
    pub fn remaining_activations(&self) -> i64 {
        (self.max_activations - self.activated_count).max(0)
    }

    /// Multi-line text for a status dialog.
    pub fn summary(&self) -> String {
        let expiry = self
            .expiry_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "No expiry".to_string());
        format!(
            "License Key: {}\nStatus: {}\nExpiry: {}\nActivations: {} of {}",
            self.license_key, self.status, expiry, self.activated_count, self.max_activations
        )
    }
}

/// Validates keys for one machine.
///
/// The machine id is fixed at construction; compute it once with
/// [`crate::hardware::current_machine_id`] and pass it in.
#[derive(Clone)]
pub struct LicenseValidator {
    db: Arc<Database>,
    machine: MachineId,
    clock: Arc<dyn Clock>,
}

impl LicenseValidator {
    pub fn new(db: Arc<Database>, machine: MachineId) -> Self {
        Self {
            db,
            machine,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn machine_id(&self) -> &MachineId {
        &self.machine
    }

    /// Validate `key` for this machine and activate it if allowed.
    pub async fn validate(&self, key: &str) -> Result<Admission, ValidationError> {
        let key = match normalize_license_key(key) {
            Ok(key) => key,
            Err(_) => return Err(ValidationError::Denied(DenialReason::NotFound)),
        };

        let span = info_span!(
            "validate",
            attempt = %generate_attempt_id(),
            machine = self.machine.short(),
        );

        async {
            let outcome = self.validate_locked(&key).await;
            match &outcome {
                Ok(Admission::AlreadyActivated) => log_license_event(
                    LicenseEvent::AlreadyActivated,
                    &key,
                    Some(&self.machine),
                    None,
                ),
                Ok(Admission::Activated {
                    activated_count,
                    max_activations,
                }) => log_license_event(
                    LicenseEvent::Activated,
                    &key,
                    Some(&self.machine),
                    Some(&format!("{activated_count}/{max_activations}")),
                ),
                Err(ValidationError::Denied(reason)) => log_license_event(
                    LicenseEvent::Denied,
                    &key,
                    Some(&self.machine),
                    Some(&format!("{reason:?}")),
                ),
                Err(ValidationError::Storage(e)) => {
                    tracing::error!("Validation of {key} aborted: {e}");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn validate_locked(&self, key: &str) -> Result<Admission, ValidationError> {
        let mut tx = self.db.begin_license_tx(key).await?;

        if tx.get_activation(key, &self.machine).await?.is_some() {
            debug!("Machine already holds an activation for {key}");
            return Ok(Admission::AlreadyActivated);
        }

        let record = tx.get_license(key).await?;
        let license = check_license(record.as_ref(), &self.machine, self.clock.today())
            .map_err(ValidationError::Denied)?;

        let activated_count = tx.count_activations(key).await?;
        check_capacity(license, activated_count).map_err(ValidationError::Denied)?;

        let inserted = tx
            .insert_activation(key, &self.machine, self.clock.now())
            .await?;
        tx.commit().await?;

        if !inserted {
            return Ok(Admission::AlreadyActivated);
        }
        Ok(Admission::Activated {
            activated_count: activated_count + 1,
            max_activations: license.max_activations,
        })
    }

    /// True if this machine holds an activation of a key that is still
    /// usable today (not revoked, not expired).
    pub async fn is_machine_activated(&self) -> VocabResult<bool> {
        let today = self.clock.today();
        for activation in self.db.activations_for_machine(&self.machine).await? {
            let Some(license) = self.db.get_license(&activation.license_key).await? else {
                continue;
            };
            let revoked = license.status() == Some(LicenseStatus::Revoked);
            if !revoked && !license.is_expired_on(today) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Status of every key this machine activated.
    pub async fn status_report(&self) -> VocabResult<Vec<LicenseStatusReport>> {
        status_report(&self.db, &self.machine).await
    }
}

/// Status of every key `machine` activated, oldest activation first.
pub async fn status_report(
    db: &Database,
    machine: &MachineId,
) -> VocabResult<Vec<LicenseStatusReport>> {
    let mut reports = Vec::new();
    for activation in db.activations_for_machine(machine).await? {
        let Some(license) = db.get_license(&activation.license_key).await? else {
            continue;
        };
        let activated_count = db.count_activations(&license.license_key).await?;
        reports.push(LicenseStatusReport {
            license_key: license.license_key,
            status: license.status,
            expiry_date: license.expiry_date,
            max_activations: license.max_activations,
            activated_count,
            activated_at: activation.activated_at,
        });
    }
    Ok(reports)
}
