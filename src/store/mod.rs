//! Persistence for vocabkeep.
//!
//! This module contains:
//! - `database`    → pool setup over SQLite/Postgres, schema, health check
//! - `licenses`    → license store and activation ledger queries
//! - `transaction` → per-key locked transaction used by the validator
//! - `vocabulary`  → the user's word list

pub mod database;
pub mod licenses;
mod schema;
pub mod transaction;
pub mod vocabulary;

pub use database::Database;
pub use licenses::{ActivationRecord, LicenseRecord, LicenseStatus, NewLicense};
pub use transaction::LicenseTx;
pub use vocabulary::VocabularyEntry;
