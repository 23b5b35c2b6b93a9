//! Client for the online dictionary used to fill in missing meanings.
//!
//! The API answers `GET {api_url}{word}` with a list of entries, each with
//! `meanings[].partOfSpeech` and `meanings[].definitions[].definition`.
//! An unknown word is a 404.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DictionaryConfig;
use crate::errors::{VocabError, VocabResult};

#[derive(Debug, Deserialize)]
struct ApiEntry {
    #[serde(default)]
    meanings: Vec<ApiMeaning>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMeaning {
    #[serde(default)]
    part_of_speech: Option<String>,
    #[serde(default)]
    definitions: Vec<ApiDefinition>,
}

#[derive(Debug, Deserialize)]
struct ApiDefinition {
    definition: String,
}

/// One definition of a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub part_of_speech: Option<String>,
    pub definition: String,
}

/// Flatten an API response body into definitions, in response order.
pub fn parse_entries(body: &str) -> VocabResult<Vec<Definition>> {
    let entries: Vec<ApiEntry> = serde_json::from_str(body).map_err(|e| {
        VocabError::NetworkError(format!("unexpected dictionary response: {e}"))
    })?;

    Ok(entries
        .into_iter()
        .flat_map(|entry| entry.meanings)
        .flat_map(|meaning| {
            let pos = meaning.part_of_speech;
            meaning.definitions.into_iter().map(move |d| Definition {
                part_of_speech: pos.clone(),
                definition: d.definition.trim().to_string(),
            })
        })
        .filter(|d| !d.definition.is_empty())
        .collect())
}

#[derive(Debug, Clone)]
pub struct DictionaryClient {
    http: Client,
    base_url: Url,
}

impl DictionaryClient {
    pub fn new(config: &DictionaryConfig) -> VocabResult<Self> {
        let mut base = config.api_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| VocabError::ConfigError(format!("invalid dictionary URL: {e}")))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, base_url })
    }

    fn word_url(&self, word: &str) -> VocabResult<Url> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Err(VocabError::InvalidInput("please provide a word".to_string()));
        }
        if word == "." || word == ".." {
            return Err(VocabError::InvalidInput(format!("cannot look up '{word}'")));
        }

        // The word is always exactly one path segment, percent-encoded.
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| VocabError::ConfigError("dictionary URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(&word);
        Ok(url)
    }

    /// Every definition of `word`. Unknown words give an empty list.
    pub async fn fetch_definitions(&self, word: &str) -> VocabResult<Vec<Definition>> {
        let url = self.word_url(word)?;
        debug!("Looking up {url}");

        let resp = self.http.get(url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                debug!("No dictionary entry for '{}'", word.trim());
                Ok(Vec::new())
            }
            status if status.is_success() => {
                let body = resp.text().await?;
                parse_entries(&body)
            }
            status => {
                warn!("Dictionary lookup for '{}' failed: HTTP {status}", word.trim());
                Err(VocabError::NetworkError(format!(
                    "dictionary returned HTTP {status}"
                )))
            }
        }
    }

    /// The first definition of `word`, if the dictionary knows it.
    pub async fn fetch_meaning(&self, word: &str) -> VocabResult<Option<String>> {
        Ok(self
            .fetch_definitions(word)
            .await?
            .into_iter()
            .next()
            .map(|d| d.definition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "word": "run",
            "meanings": [
                {
                    "partOfSpeech": "verb",
                    "definitions": [
                        {"definition": "To move swiftly on foot.", "example": "Run!"},
                        {"definition": "  To manage.  "}
                    ]
                },
                {
                    "partOfSpeech": "noun",
                    "definitions": [{"definition": "An act of running."}]
                }
            ]
        },
        {"word": "run", "meanings": []}
    ]"#;

    #[test]
    fn parse_flattens_meanings_in_order() {
        let defs = parse_entries(SAMPLE).unwrap();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].definition, "To move swiftly on foot.");
        assert_eq!(defs[0].part_of_speech.as_deref(), Some("verb"));
        assert_eq!(defs[1].definition, "To manage.");
        assert_eq!(defs[2].part_of_speech.as_deref(), Some("noun"));
    }

    #[test]
    fn parse_rejects_non_list_body() {
        let err = parse_entries(r#"{"title": "No Definitions Found"}"#).unwrap_err();
        assert!(matches!(err, VocabError::NetworkError(_)));
    }

    #[test]
    fn word_url_lowercases_and_keeps_base_path() {
        let config = DictionaryConfig {
            api_url: "https://api.dictionaryapi.dev/api/v2/entries/en".to_string(),
            timeout_secs: 1,
        };
        let client = DictionaryClient::new(&config).unwrap();
        let url = client.word_url(" Ephemeral ").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/ephemeral"
        );
        assert!(client.word_url("  ").is_err());
    }

    #[test]
    fn word_url_encodes_the_word_as_one_segment() {
        let config = DictionaryConfig {
            api_url: "https://api.dictionaryapi.dev/api/v2/entries/en/".to_string(),
            timeout_secs: 1,
        };
        let client = DictionaryClient::new(&config).unwrap();

        let url = client.word_url("../admin").unwrap();
        assert_eq!(url.path(), "/api/v2/entries/en/..%2Fadmin");

        let url = client.word_url("what?x=1").unwrap();
        assert_eq!(url.path(), "/api/v2/entries/en/what%3Fx=1");
        assert_eq!(url.query(), None);

        let url = client.word_url("a#b").unwrap();
        assert_eq!(url.path(), "/api/v2/entries/en/a%23b");
        assert_eq!(url.fragment(), None);

        let url = client.word_url("ice cream").unwrap();
        assert_eq!(url.path(), "/api/v2/entries/en/ice%20cream");

        assert!(matches!(client.word_url(".."), Err(VocabError::InvalidInput(_))));
        assert!(matches!(client.word_url("."), Err(VocabError::InvalidInput(_))));
    }
}
