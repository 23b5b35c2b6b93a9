//! Provisioning tests. Run with `cargo test --features admin`.
#![cfg(feature = "admin")]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqlitePoolOptions;

use vocabkeep::admin::{CreateLicenseOptions, LicenseAdmin};
use vocabkeep::clock::FixedClock;
use vocabkeep::errors::{VocabError, VocabResult};
use vocabkeep::hardware::MachineId;
use vocabkeep::license_key::{validate_license_key_format, LicenseKeyConfig};
use vocabkeep::store::{Database, LicenseStatus, NewLicense};
use vocabkeep::validator::{DenialReason, LicenseValidator, ValidationError};

async fn setup_in_memory_db() -> VocabResult<Arc<Database>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| VocabError::DatabaseError(format!("db connect failed: {e}")))?;

    let db = Database::SQLite(pool);
    db.migrate().await?;
    Ok(Arc::new(db))
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn admin(db: &Arc<Database>) -> LicenseAdmin {
    LicenseAdmin::new(db.clone(), LicenseKeyConfig::default(), 1)
        .with_clock(Arc::new(FixedClock(now())))
}

#[tokio::test]
async fn admin_generates_well_formed_keys() {
    let db = setup_in_memory_db().await.unwrap();
    let admin = admin(&db);

    let license = admin
        .create_license(CreateLicenseOptions::default())
        .await
        .unwrap();

    assert!(validate_license_key_format(
        &license.license_key,
        &LicenseKeyConfig::default()
    ));
    assert_eq!(license.max_activations, 1);
    assert_eq!(license.status, "active");
}

#[tokio::test]
async fn admin_create_with_explicit_key_and_options() {
    let db = setup_in_memory_db().await.unwrap();
    let admin = admin(&db);
    let expiry = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();

    let license = admin
        .create_license(CreateLicenseOptions {
            license_key: Some(" TEAM-1 ".to_string()),
            expiry_date: Some(expiry),
            max_activations: Some(5),
            pinned_to: None,
        })
        .await
        .unwrap();

    assert_eq!(license.license_key, "TEAM-1");
    assert_eq!(license.expiry_date, Some(expiry));
    assert_eq!(license.max_activations, 5);
}

#[tokio::test]
async fn admin_revoke_is_final() {
    let db = setup_in_memory_db().await.unwrap();
    let admin = admin(&db);
    db.provision_license(&NewLicense::new("ABC-1"), now())
        .await
        .unwrap();

    admin.revoke_license("ABC-1").await.unwrap();
    let license = db.get_license("ABC-1").await.unwrap().unwrap();
    assert_eq!(license.status(), Some(LicenseStatus::Revoked));

    // Revoking twice is fine; nothing brings the key back.
    admin.revoke_license("ABC-1").await.unwrap();
    assert!(matches!(
        db.update_license_status("ABC-1", LicenseStatus::Active).await,
        Err(VocabError::InvalidInput(_))
    ));

    let err = LicenseValidator::new(db.clone(), MachineId::new("m1"))
        .with_clock(Arc::new(FixedClock(now())))
        .validate("ABC-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::Denied(DenialReason::Revoked)));

    assert!(matches!(
        admin.revoke_license("NOPE").await,
        Err(VocabError::LicenseNotFound(_))
    ));
}

#[tokio::test]
async fn admin_list_includes_activation_counts() {
    let db = setup_in_memory_db().await.unwrap();
    let admin = admin(&db);
    db.provision_license(&NewLicense::new("ABC-1").max_activations(2), now())
        .await
        .unwrap();
    db.provision_license(&NewLicense::new("ABC-2"), now())
        .await
        .unwrap();

    LicenseValidator::new(db.clone(), MachineId::new("m1"))
        .with_clock(Arc::new(FixedClock(now())))
        .validate("ABC-1")
        .await
        .unwrap();

    let summaries = admin.list_licenses().await.unwrap();
    assert_eq!(summaries.len(), 2);
    let abc1 = summaries
        .iter()
        .find(|s| s.license.license_key == "ABC-1")
        .unwrap();
    assert_eq!(abc1.activated_count, 1);
    let abc2 = summaries
        .iter()
        .find(|s| s.license.license_key == "ABC-2")
        .unwrap();
    assert_eq!(abc2.activated_count, 0);
}

#[tokio::test]
async fn admin_release_frees_a_slot() {
    let db = setup_in_memory_db().await.unwrap();
    let admin = admin(&db);
    db.provision_license(&NewLicense::new("ABC-1"), now())
        .await
        .unwrap();
    let m1 = MachineId::new("m1");

    LicenseValidator::new(db.clone(), m1.clone())
        .with_clock(Arc::new(FixedClock(now())))
        .validate("ABC-1")
        .await
        .unwrap();

    admin.release_activation("ABC-1", &m1).await.unwrap();
    assert_eq!(db.count_activations("ABC-1").await.unwrap(), 0);

    assert!(matches!(
        admin.release_activation("ABC-1", &m1).await,
        Err(VocabError::InvalidInput(_))
    ));
    assert!(matches!(
        admin.release_activation("NOPE", &m1).await,
        Err(VocabError::LicenseNotFound(_))
    ));
}
