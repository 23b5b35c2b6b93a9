//! vocabkeep - a licensed personal vocabulary manager.
//!
//! The core of the crate is [`validator::LicenseValidator`], which decides
//! whether this machine may use a license key and records the activation in
//! a shared ledger. Everything else (the word list, the dictionary lookup,
//! the `vocabkeep` binary) sits behind that gate.
//!
//! # Features
//!
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend, for a ledger shared by many
//!   machines.
//! - `admin` - License provisioning (the `admin` module) and the `vocabkeep-admin`
//!   binary. Not part of the end-user build.
//!
//! # Example
//!
//! ```no_run
//! use vocabkeep::hardware::current_machine_id;
//! use vocabkeep::store::Database;
//! use vocabkeep::validator::LicenseValidator;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new().await?;
//! let validator = LicenseValidator::new(db, current_machine_id());
//! match validator.validate("VOC-A2B3-C4D5-E6F7-G8H9").await {
//!     Ok(admission) => println!("{}", admission.message()),
//!     Err(e) => println!("{}", e.user_message()),
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "admin")]
pub mod admin;
pub mod clock;
pub mod config;
pub mod dictionary;
pub mod errors;
pub mod hardware;
pub mod license_key;
pub mod logging;
pub mod store;
pub mod validator;

pub use errors::{VocabError, VocabResult};
pub use validator::{Admission, DenialReason, LicenseValidator, ValidationError};
