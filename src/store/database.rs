use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
#[cfg(feature = "sqlite")]
use std::str::FromStr;

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::{get_config, DatabaseConfig};
use crate::errors::{VocabError, VocabResult};

/// Unified database handle over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Connect using the global configuration and apply the schema.
    pub async fn new() -> VocabResult<Arc<Self>> {
        let config = get_config()?;
        let db = Self::connect(&config.database).await?;
        db.migrate().await?;
        Ok(Arc::new(db))
    }

    /// Open a pool for the configured backend. Does not touch the schema.
    pub async fn connect(db_config: &DatabaseConfig) -> VocabResult<Self> {
        match db_config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let options = SqliteConnectOptions::from_str(&db_config.sqlite_url)
                    .map_err(|e| {
                        VocabError::ConfigError(format!("invalid SQLite URL: {e}"))
                    })?
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .busy_timeout(Duration::from_secs(db_config.busy_timeout_secs));

                if let Some(parent) = options.get_filename().parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            VocabError::StorageUnavailable(format!(
                                "cannot create database directory {}: {e}",
                                parent.display()
                            ))
                        })?;
                    }
                }

                let pool = SqlitePoolOptions::new()
                    .max_connections(db_config.max_connections)
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        VocabError::StorageUnavailable(format!(
                            "failed to connect to SQLite: {e}"
                        ))
                    })?;

                debug!("Connected to SQLite at {}", db_config.sqlite_url);
                Ok(Database::SQLite(pool))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(VocabError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(db_config.max_connections)
                    .connect(&db_config.postgres_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        VocabError::StorageUnavailable(format!(
                            "failed to connect to PostgreSQL: {e}"
                        ))
                    })?;

                debug!("Connected to PostgreSQL");
                Ok(Database::Postgres(pool))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(VocabError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(VocabError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Create any missing tables and indexes.
    pub async fn migrate(&self) -> VocabResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                for statement in super::schema::SQLITE_SCHEMA {
                    sqlx::query(statement).execute(pool).await.map_err(|e| {
                        error!("SQLite migration failed: {e}");
                        VocabError::from(e)
                    })?;
                }
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                for statement in super::schema::POSTGRES_SCHEMA {
                    sqlx::query(statement).execute(pool).await.map_err(|e| {
                        error!("Postgres migration failed: {e}");
                        VocabError::from(e)
                    })?;
                }
            }
        }

        info!("Database schema is up to date");
        Ok(())
    }

    /// Round-trip a trivial query to confirm the database is reachable.
    pub async fn check_connection(&self) -> VocabResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Backend name for diagnostics.
    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }
}

/// Log a failed query and convert it, keeping connectivity failures distinct.
pub(crate) fn query_failed(backend: &str, operation: &str, e: sqlx::Error) -> VocabError {
    error!("{backend} {operation} failed: {e}");
    VocabError::from(e)
}

/// True when the error is a UNIQUE/PRIMARY KEY violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
