//! Vocabulary table: the user's words and their meanings.
//!
//! Words are unique ignoring case, so "Apple" and "apple" are one entry.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use tracing::{debug, info};

use super::database::{is_unique_violation, query_failed, Database};
use crate::errors::{VocabError, VocabResult};

/// A stored word.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct VocabularyEntry {
    pub id: i64,
    pub word: String,
    pub meaning: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Trim both fields and reject blanks.
fn clean_entry(word: &str, meaning: &str) -> VocabResult<(String, String)> {
    let word = word.trim();
    let meaning = meaning.trim();
    if word.is_empty() {
        return Err(VocabError::InvalidInput("please provide a word".to_string()));
    }
    if meaning.is_empty() {
        return Err(VocabError::InvalidInput(format!(
            "please provide a meaning for '{word}'"
        )));
    }
    Ok((word.to_string(), meaning.to_string()))
}

/// `%term%` with LIKE wildcards in `term` escaped by `\`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Database {
    /// Add a word. The meaning must already be resolved by the caller.
    pub async fn add_word(
        &self,
        word: &str,
        meaning: &str,
        now: NaiveDateTime,
    ) -> VocabResult<VocabularyEntry> {
        let (word, meaning) = clean_entry(word, meaning)?;

        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "INSERT INTO vocabulary (word, meaning, created_at, updated_at) \
                     VALUES (?, ?, ?, ?) \
                     RETURNING id, word, meaning, created_at, updated_at",
                )
                .bind(&word)
                .bind(&meaning)
                .bind(now)
                .bind(now)
                .fetch_one(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "INSERT INTO vocabulary (word, meaning, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4) \
                     RETURNING id, word, meaning, created_at, updated_at",
                )
                .bind(&word)
                .bind(&meaning)
                .bind(now)
                .bind(now)
                .fetch_one(pool)
                .await
            }
        };

        match result {
            Ok(entry) => {
                info!("Added '{}' to vocabulary (id {})", entry.word, entry.id);
                Ok(entry)
            }
            Err(e) if is_unique_violation(&e) => Err(VocabError::DuplicateWord(word)),
            Err(e) => Err(query_failed(self.backend_name(), "add_word", e)),
        }
    }

    pub async fn get_word(&self, id: i64) -> VocabResult<Option<VocabularyEntry>> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "SELECT id, word, meaning, created_at, updated_at FROM vocabulary WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "SELECT id, word, meaning, created_at, updated_at FROM vocabulary WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(pool)
                .await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "get_word", e))
    }

    /// Every entry, alphabetically.
    pub async fn list_words(&self) -> VocabResult<Vec<VocabularyEntry>> {
        let sql = "SELECT id, word, meaning, created_at, updated_at FROM vocabulary \
                   ORDER BY LOWER(word)";
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(sql).fetch_all(pool).await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(sql).fetch_all(pool).await
            }
        };

        result.map_err(|e| query_failed(self.backend_name(), "list_words", e))
    }

    /// Entries whose word contains `term`, ignoring case. A blank term lists everything.
    pub async fn search_words(&self, term: &str) -> VocabResult<Vec<VocabularyEntry>> {
        if term.trim().is_empty() {
            return self.list_words().await;
        }
        let pattern = like_pattern(term);

        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "SELECT id, word, meaning, created_at, updated_at FROM vocabulary \
                     WHERE word LIKE ? ESCAPE '\\' ORDER BY LOWER(word)",
                )
                .bind(&pattern)
                .fetch_all(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "SELECT id, word, meaning, created_at, updated_at FROM vocabulary \
                     WHERE word ILIKE $1 ESCAPE '\\' ORDER BY LOWER(word)",
                )
                .bind(&pattern)
                .fetch_all(pool)
                .await
            }
        };

        let entries = result.map_err(|e| query_failed(self.backend_name(), "search_words", e))?;
        debug!("Search '{}' matched {} word(s)", term.trim(), entries.len());
        Ok(entries)
    }

    /// Replace the word and meaning of entry `id`.
    pub async fn update_word(
        &self,
        id: i64,
        word: &str,
        meaning: &str,
        now: NaiveDateTime,
    ) -> VocabResult<VocabularyEntry> {
        let (word, meaning) = clean_entry(word, meaning)?;

        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "UPDATE vocabulary SET word = ?, meaning = ?, updated_at = ? WHERE id = ? \
                     RETURNING id, word, meaning, created_at, updated_at",
                )
                .bind(&word)
                .bind(&meaning)
                .bind(now)
                .bind(id)
                .fetch_optional(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query_as::<_, VocabularyEntry>(
                    "UPDATE vocabulary SET word = $1, meaning = $2, updated_at = $3 WHERE id = $4 \
                     RETURNING id, word, meaning, created_at, updated_at",
                )
                .bind(&word)
                .bind(&meaning)
                .bind(now)
                .bind(id)
                .fetch_optional(pool)
                .await
            }
        };

        match result {
            Ok(Some(entry)) => {
                info!("Updated vocabulary entry {}", entry.id);
                Ok(entry)
            }
            Ok(None) => Err(VocabError::WordNotFound(id)),
            Err(e) if is_unique_violation(&e) => Err(VocabError::DuplicateWord(word)),
            Err(e) => Err(query_failed(self.backend_name(), "update_word", e)),
        }
    }

    pub async fn delete_word(&self, id: i64) -> VocabResult<()> {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                sqlx::query("DELETE FROM vocabulary WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                sqlx::query("DELETE FROM vocabulary WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await
            }
        };

        let rows = result
            .map_err(|e| query_failed(self.backend_name(), "delete_word", e))?
            .rows_affected();
        if rows == 0 {
            return Err(VocabError::WordNotFound(id));
        }
        info!("Deleted vocabulary entry {id}");
        Ok(())
    }
}
