//! License administration: the out-of-band side that provisions keys.
//!
//! Only built with the `admin` feature and driven by the `vocabkeep-admin`
//! binary; the user-facing `vocabkeep` binary never links it. These
//! operations sit on top of the [`Database`] license queries and add key
//! generation, existence checks and event logging.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::errors::{VocabError, VocabResult};
use crate::hardware::MachineId;
use crate::license_key::{generate_unique_license_key, LicenseKeyConfig};
use crate::logging::{log_license_event, LicenseEvent};
use crate::store::{Database, LicenseRecord, LicenseStatus, NewLicense};

const KEY_GENERATION_RETRIES: u32 = 10;

/// Options for creating a key. Unset fields take configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CreateLicenseOptions {
    /// Use this key instead of generating one.
    pub license_key: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub max_activations: Option<u32>,
    pub pinned_to: Option<MachineId>,
}

/// A key with its current activation count.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseSummary {
    #[serde(flatten)]
    pub license: LicenseRecord,
    pub activated_count: i64,
}

pub struct LicenseAdmin {
    db: Arc<Database>,
    key_config: LicenseKeyConfig,
    default_max_activations: u32,
    clock: Arc<dyn Clock>,
}

impl LicenseAdmin {
    pub fn new(db: Arc<Database>, key_config: LicenseKeyConfig, default_max_activations: u32) -> Self {
        Self {
            db,
            key_config,
            default_max_activations,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create a key and return its stored row.
    pub async fn create_license(&self, options: CreateLicenseOptions) -> VocabResult<LicenseRecord> {
        let license_key = match options.license_key {
            Some(key) => key.trim().to_string(),
            None => {
                let db = &self.db;
                generate_unique_license_key(
                    &self.key_config,
                    |key| async move { db.license_exists(&key).await },
                    KEY_GENERATION_RETRIES,
                )
                .await?
            }
        };

        let mut new = NewLicense::new(&license_key)
            .max_activations(options.max_activations.unwrap_or(self.default_max_activations));
        if let Some(date) = options.expiry_date {
            new = new.expires_on(date);
        }
        if let Some(machine) = options.pinned_to {
            new = new.pinned_to(machine);
        }

        self.db.provision_license(&new, self.clock.now()).await?;
        log_license_event(
            LicenseEvent::Provisioned,
            &license_key,
            new.machine_id.as_ref(),
            Some(&format!("max_activations={}", new.max_activations)),
        );

        self.db
            .get_license(&license_key)
            .await?
            .ok_or(VocabError::LicenseNotFound(license_key))
    }

    /// Mark a key revoked. Revocation is final; existing activations stay
    /// in the ledger but no longer unlock anything.
    pub async fn revoke_license(&self, license_key: &str) -> VocabResult<()> {
        if !self
            .db
            .update_license_status(license_key, LicenseStatus::Revoked)
            .await?
        {
            return Err(VocabError::LicenseNotFound(license_key.to_string()));
        }
        log_license_event(LicenseEvent::Revoked, license_key, None, None);
        Ok(())
    }

    /// Every key with its activation count, oldest first.
    pub async fn list_licenses(&self) -> VocabResult<Vec<LicenseSummary>> {
        let mut summaries = Vec::new();
        for license in self.db.list_licenses().await? {
            let activated_count = self.db.count_activations(&license.license_key).await?;
            summaries.push(LicenseSummary {
                license,
                activated_count,
            });
        }
        Ok(summaries)
    }

    /// Free the slot `machine` holds on `license_key`.
    pub async fn release_activation(
        &self,
        license_key: &str,
        machine: &MachineId,
    ) -> VocabResult<()> {
        if !self.db.license_exists(license_key).await? {
            return Err(VocabError::LicenseNotFound(license_key.to_string()));
        }
        if !self.db.remove_activation(license_key, machine).await? {
            return Err(VocabError::InvalidInput(format!(
                "machine {} holds no activation of {license_key}",
                machine.short()
            )));
        }

        log_license_event(LicenseEvent::ActivationRemoved, license_key, Some(machine), None);
        info!("Released activation of {license_key} from {}", machine.short());
        Ok(())
    }
}
