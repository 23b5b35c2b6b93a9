//! Racing validations against a file-backed SQLite database.
//!
//! An in-memory database with a single connection serialises everything by
//! construction, so these tests open a real file with several connections.

use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use vocabkeep::clock::FixedClock;
use vocabkeep::config::DatabaseConfig;
use vocabkeep::hardware::MachineId;
use vocabkeep::store::{Database, NewLicense};
use vocabkeep::validator::{Admission, DenialReason, LicenseValidator, ValidationError};

async fn setup_file_db(dir: &TempDir) -> Arc<Database> {
    setup_file_db_with_timeout(dir, 10).await
}

async fn setup_file_db_with_timeout(dir: &TempDir, busy_timeout_secs: u64) -> Arc<Database> {
    let path = dir.path().join("ledger.db");
    let config = DatabaseConfig {
        db_type: "sqlite".to_string(),
        sqlite_url: format!("sqlite://{}?mode=rwc", path.display()),
        postgres_url: String::new(),
        max_connections: 4,
        busy_timeout_secs,
    };

    let db = Database::connect(&config).await.expect("connect failed");
    db.migrate().await.expect("migrate failed");
    Arc::new(db)
}

fn validator_for(db: &Arc<Database>, machine: &str) -> LicenseValidator {
    let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    LicenseValidator::new(db.clone(), MachineId::new(machine))
        .with_clock(Arc::new(FixedClock::on(today)))
}

fn created_at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn last_slot_goes_to_exactly_one_machine() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db(&dir).await;
    db.provision_license(&NewLicense::new("ABC-1"), created_at())
        .await
        .unwrap();

    let m1 = validator_for(&db, "m1");
    let m2 = validator_for(&db, "m2");
    let (r1, r2) = tokio::join!(m1.validate("ABC-1"), m2.validate("ABC-1"));

    let results = [r1, r2];
    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(ValidationError::Denied(DenialReason::MaxActivationsReached))
            )
        })
        .count();

    assert_eq!(admitted, 1, "{results:?}");
    assert_eq!(refused, 1, "{results:?}");
    assert_eq!(db.count_activations("ABC-1").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_machines_never_exceed_max_activations() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db(&dir).await;
    db.provision_license(&NewLicense::new("TEAM-1").max_activations(3), created_at())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let validator = validator_for(&db, &format!("m{i}"));
        handles.push(tokio::spawn(
            async move { validator.validate("TEAM-1").await },
        ));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 3);
    assert_eq!(db.count_activations("TEAM-1").await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_machine_racing_itself_records_one_activation() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db(&dir).await;
    db.provision_license(&NewLicense::new("ABC-1").max_activations(2), created_at())
        .await
        .unwrap();

    let a = validator_for(&db, "m1");
    let b = validator_for(&db, "m1");
    let (r1, r2) = tokio::join!(a.validate("ABC-1"), b.validate("ABC-1"));

    let outcomes = [r1.unwrap(), r2.unwrap()];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == Admission::AlreadyActivated)
            .count(),
        1
    );
    assert_eq!(db.count_activations("ABC-1").await.unwrap(), 1);
}

#[tokio::test]
async fn lock_wait_past_busy_timeout_is_transient() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db_with_timeout(&dir, 0).await;
    db.provision_license(&NewLicense::new("ABC-1"), created_at())
        .await
        .unwrap();

    let held = db.begin_license_tx("ABC-1").await.unwrap();

    let err = validator_for(&db, "m2").validate("ABC-1").await.unwrap_err();
    match err {
        ValidationError::Storage(e) => assert!(e.is_transient(), "{e:?}"),
        other => panic!("expected a storage failure, got {other:?}"),
    }

    held.commit().await.unwrap();
    let admission = validator_for(&db, "m2").validate("ABC-1").await.unwrap();
    assert!(matches!(admission, Admission::Activated { .. }));
}
