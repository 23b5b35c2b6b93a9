//! Error types shared across the crate.
//!
//! License denials are *not* errors: they are expected outcomes and live in
//! [`crate::validator::DenialReason`]. Everything here is a failure of the
//! machinery around them (storage, configuration, network, bad input).

use thiserror::Error;

/// Errors produced by the store, configuration and collaborators.
#[derive(Debug, Error)]
pub enum VocabError {
    /// The persistence layer could not be reached (I/O, TLS, pool exhausted)
    /// or stayed locked past the busy timeout.
    ///
    /// Transient: the caller retries by re-running the whole operation.
    #[error("cannot reach storage: {0}")]
    StorageUnavailable(String),

    /// A query reached the database and failed there.
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Dictionary lookups and other outbound HTTP calls.
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("'{0}' already exists in the vocabulary")]
    DuplicateWord(String),

    #[error("no vocabulary entry with id {0}")]
    WordNotFound(i64),

    #[error("license key '{0}' already exists")]
    DuplicateLicenseKey(String),

    #[error("license key '{0}' not found")]
    LicenseNotFound(String),
}

impl VocabError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VocabError::StorageUnavailable(_) | VocabError::NetworkError(_)
        )
    }

    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            VocabError::StorageUnavailable(_) => {
                "Cannot reach the database right now. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Classify a sqlx error into connectivity vs. query failure.
impl From<sqlx::Error> for VocabError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => VocabError::StorageUnavailable(e.to_string()),
            sqlx::Error::Database(ref db) if is_lock_contention(db.as_ref()) => {
                VocabError::StorageUnavailable(e.to_string())
            }
            other => VocabError::DatabaseError(other.to_string()),
        }
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED (including extended codes) and Postgres
/// `lock_not_available`.
fn is_lock_contention(e: &(dyn sqlx::error::DatabaseError + 'static)) -> bool {
    #[cfg(feature = "sqlite")]
    if e.try_downcast_ref::<sqlx::sqlite::SqliteError>().is_some() {
        return e
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6));
    }
    e.code().as_deref() == Some("55P03")
}

impl From<reqwest::Error> for VocabError {
    fn from(e: reqwest::Error) -> Self {
        VocabError::NetworkError(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type VocabResult<T> = Result<T, VocabError>;
