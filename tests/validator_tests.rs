use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;

use vocabkeep::clock::FixedClock;
use vocabkeep::errors::{VocabError, VocabResult};
use vocabkeep::hardware::MachineId;
use vocabkeep::store::{Database, LicenseStatus, NewLicense};
use vocabkeep::validator::{Admission, DenialReason, LicenseValidator, ValidationError};

/// Helper: in-memory SQLite database with the schema applied.
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

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2025, 3, 10)
}

fn validator_for(db: &Arc<Database>, machine: &str) -> LicenseValidator {
    LicenseValidator::new(db.clone(), MachineId::new(machine))
        .with_clock(Arc::new(FixedClock::on(today())))
}

async fn provision(db: &Database, license: NewLicense) {
    db.provision_license(&license, today().and_hms_opt(8, 0, 0).unwrap())
        .await
        .expect("provision failed");
}

fn denial(result: Result<Admission, ValidationError>) -> DenialReason {
    match result {
        Err(ValidationError::Denied(reason)) => reason,
        other => panic!("expected a denial, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_single_seat_key_binds_first_machine_only() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1")).await;

    let m1 = validator_for(&db, "m1");
    let m2 = validator_for(&db, "m2");

    let admission = m1.validate("ABC-1").await.unwrap();
    assert_eq!(
        admission,
        Admission::Activated {
            activated_count: 1,
            max_activations: 1
        }
    );

    assert_eq!(
        denial(m2.validate("ABC-1").await),
        DenialReason::MaxActivationsReached
    );
    assert_eq!(db.count_activations("ABC-1").await.unwrap(), 1);
}

#[tokio::test]
async fn scenario_expired_key_is_refused() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-2").expires_on(date(2020, 1, 1))).await;

    let m1 = validator_for(&db, "m1");
    assert_eq!(denial(m1.validate("ABC-2").await), DenialReason::Expired);
    assert_eq!(db.count_activations("ABC-2").await.unwrap(), 0);
}

#[tokio::test]
async fn scenario_absent_key_is_not_found() {
    let db = setup_in_memory_db().await.unwrap();
    let m1 = validator_for(&db, "m1");
    assert_eq!(denial(m1.validate("ABC-3").await), DenialReason::NotFound);
}

#[tokio::test]
async fn blank_key_is_not_found() {
    let db = setup_in_memory_db().await.unwrap();
    let m1 = validator_for(&db, "m1");
    assert_eq!(denial(m1.validate("   ").await), DenialReason::NotFound);
}

#[tokio::test]
async fn key_is_trimmed_before_lookup() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1")).await;

    let m1 = validator_for(&db, "m1");
    assert!(m1.validate("  ABC-1\n").await.is_ok());
}

#[tokio::test]
async fn revalidation_from_same_machine_is_idempotent() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1")).await;

    let m1 = validator_for(&db, "m1");
    assert!(matches!(
        m1.validate("ABC-1").await.unwrap(),
        Admission::Activated { .. }
    ));
    assert_eq!(
        m1.validate("ABC-1").await.unwrap(),
        Admission::AlreadyActivated
    );
    assert_eq!(db.activations_for_license("ABC-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn existing_activation_wins_over_later_revocation() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1")).await;

    let m1 = validator_for(&db, "m1");
    m1.validate("ABC-1").await.unwrap();
    db.update_license_status("ABC-1", LicenseStatus::Revoked)
        .await
        .unwrap();

    assert_eq!(
        m1.validate("ABC-1").await.unwrap(),
        Admission::AlreadyActivated
    );
    // ...but the machine no longer counts as activated for the app gate.
    assert!(!m1.is_machine_activated().await.unwrap());
}

#[tokio::test]
async fn revoked_key_is_refused_regardless_of_other_fields() {
    let db = setup_in_memory_db().await.unwrap();
    provision(
        &db,
        NewLicense::new("ABC-1")
            .expires_on(date(2020, 1, 1))
            .pinned_to(MachineId::new("m2")),
    )
    .await;
    db.update_license_status("ABC-1", LicenseStatus::Revoked)
        .await
        .unwrap();

    let m1 = validator_for(&db, "m1");
    assert_eq!(denial(m1.validate("ABC-1").await), DenialReason::Revoked);
}

#[tokio::test]
async fn used_status_is_not_active() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1")).await;
    db.update_license_status("ABC-1", LicenseStatus::Used)
        .await
        .unwrap();

    let m1 = validator_for(&db, "m1");
    assert_eq!(denial(m1.validate("ABC-1").await), DenialReason::NotActive);
}

#[tokio::test]
async fn pinned_key_only_admits_its_machine() {
    let db = setup_in_memory_db().await.unwrap();
    provision(
        &db,
        NewLicense::new("ABC-1")
            .max_activations(5)
            .pinned_to(MachineId::new("m1")),
    )
    .await;

    let m2 = validator_for(&db, "m2");
    assert_eq!(
        denial(m2.validate("ABC-1").await),
        DenialReason::AlreadyBoundToOtherMachine
    );

    let m1 = validator_for(&db, "m1");
    assert!(m1.validate("ABC-1").await.is_ok());
}

#[tokio::test]
async fn key_expiring_today_is_still_valid() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1").expires_on(today())).await;

    let m1 = validator_for(&db, "m1");
    assert!(m1.validate("ABC-1").await.is_ok());
}

#[tokio::test]
async fn multi_seat_key_admits_up_to_its_limit() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("TEAM-1").max_activations(3)).await;

    for (i, machine) in ["m1", "m2", "m3"].iter().enumerate() {
        let admission = validator_for(&db, machine).validate("TEAM-1").await.unwrap();
        assert_eq!(
            admission,
            Admission::Activated {
                activated_count: i as i64 + 1,
                max_activations: 3
            }
        );
    }

    assert_eq!(
        denial(validator_for(&db, "m4").validate("TEAM-1").await),
        DenialReason::MaxActivationsReached
    );
    // A machine already holding a seat is still admitted at the limit.
    assert_eq!(
        validator_for(&db, "m2").validate("TEAM-1").await.unwrap(),
        Admission::AlreadyActivated
    );
}

#[tokio::test]
async fn released_seat_can_be_taken_by_another_machine() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1")).await;

    validator_for(&db, "m1").validate("ABC-1").await.unwrap();
    assert!(db
        .remove_activation("ABC-1", &MachineId::new("m1"))
        .await
        .unwrap());

    assert!(validator_for(&db, "m2").validate("ABC-1").await.is_ok());
}

#[tokio::test]
async fn denial_leaves_no_activation_behind() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1").expires_on(date(2020, 1, 1))).await;

    let m1 = validator_for(&db, "m1");
    let _ = m1.validate("ABC-1").await;
    assert!(db
        .activations_for_machine(&MachineId::new("m1"))
        .await
        .unwrap()
        .is_empty());
    assert!(!m1.is_machine_activated().await.unwrap());
}

#[tokio::test]
async fn is_machine_activated_tracks_usable_activations() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1")).await;

    let m1 = validator_for(&db, "m1");
    assert!(!m1.is_machine_activated().await.unwrap());

    m1.validate("ABC-1").await.unwrap();
    assert!(m1.is_machine_activated().await.unwrap());
    assert!(!validator_for(&db, "m2").is_machine_activated().await.unwrap());
}

#[tokio::test]
async fn activation_expires_with_its_key() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1").expires_on(today())).await;
    validator_for(&db, "m1").validate("ABC-1").await.unwrap();

    let tomorrow = LicenseValidator::new(db.clone(), MachineId::new("m1"))
        .with_clock(Arc::new(FixedClock::on(date(2025, 3, 11))));
    assert!(!tomorrow.is_machine_activated().await.unwrap());
}

#[tokio::test]
async fn status_report_lists_this_machines_keys() {
    let db = setup_in_memory_db().await.unwrap();
    provision(&db, NewLicense::new("ABC-1").max_activations(2)).await;
    provision(&db, NewLicense::new("ABC-9").expires_on(date(2030, 1, 1))).await;

    validator_for(&db, "m1").validate("ABC-1").await.unwrap();
    validator_for(&db, "m2").validate("ABC-1").await.unwrap();
    validator_for(&db, "m1").validate("ABC-9").await.unwrap();

    let reports = validator_for(&db, "m1").status_report().await.unwrap();
    assert_eq!(reports.len(), 2);

    let abc1 = reports.iter().find(|r| r.license_key == "ABC-1").unwrap();
    assert_eq!(abc1.status, "active");
    assert_eq!(abc1.activated_count, 2);
    assert_eq!(abc1.max_activations, 2);
    assert_eq!(abc1.remaining_activations(), 0);

    let abc9 = reports.iter().find(|r| r.license_key == "ABC-9").unwrap();
    assert_eq!(abc9.expiry_date, Some(date(2030, 1, 1)));

    assert!(validator_for(&db, "m3")
        .status_report()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn closed_pool_is_reported_as_storage_unavailable() {
    let db = setup_in_memory_db().await.unwrap();
    if let Database::SQLite(pool) = db.as_ref() {
        pool.close().await;
    }

    let err = validator_for(&db, "m1").validate("ABC-1").await.unwrap_err();
    match err {
        ValidationError::Storage(e) => {
            assert!(e.is_transient());
            assert_eq!(
                e.user_message(),
                "Cannot reach the database right now. Please try again."
            );
        }
        other => panic!("expected a storage error, got {other:?}"),
    }
}
