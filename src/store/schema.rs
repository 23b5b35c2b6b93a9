//! Table definitions, one statement per entry, applied in order.
//!
//! Every statement is idempotent so `Database::migrate` can run at each
//! startup.

#[cfg(feature = "sqlite")]
pub(crate) const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS license_keys (
        license_key     TEXT PRIMARY KEY NOT NULL,
        status          TEXT NOT NULL DEFAULT 'active'
                        CHECK (status IN ('active', 'used', 'revoked')),
        expiry_date     TEXT,
        max_activations INTEGER NOT NULL DEFAULT 1 CHECK (max_activations >= 1),
        machine_id      TEXT,
        created_at      TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS machine_activations (
        license_key     TEXT NOT NULL REFERENCES license_keys(license_key) ON DELETE CASCADE,
        machine_id      TEXT NOT NULL,
        activated_at    TEXT NOT NULL,
        UNIQUE (license_key, machine_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS machine_activations_machine ON machine_activations (machine_id)",
    r#"
    CREATE TABLE IF NOT EXISTS vocabulary (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        word        TEXT NOT NULL COLLATE NOCASE UNIQUE,
        meaning     TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
];

#[cfg(feature = "postgres")]
pub(crate) const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS license_keys (
        license_key     TEXT PRIMARY KEY,
        status          TEXT NOT NULL DEFAULT 'active'
                        CHECK (status IN ('active', 'used', 'revoked')),
        expiry_date     DATE,
        max_activations BIGINT NOT NULL DEFAULT 1 CHECK (max_activations >= 1),
        machine_id      TEXT,
        created_at      TIMESTAMP NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS machine_activations (
        license_key     TEXT NOT NULL REFERENCES license_keys(license_key) ON DELETE CASCADE,
        machine_id      TEXT NOT NULL,
        activated_at    TIMESTAMP NOT NULL,
        UNIQUE (license_key, machine_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS machine_activations_machine ON machine_activations (machine_id)",
    r#"
    CREATE TABLE IF NOT EXISTS vocabulary (
        id          BIGSERIAL PRIMARY KEY,
        word        TEXT NOT NULL,
        meaning     TEXT NOT NULL,
        created_at  TIMESTAMP NOT NULL,
        updated_at  TIMESTAMP NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS vocabulary_word_ci ON vocabulary (LOWER(word))",
];
