//! License key generation and normalisation.
//!
//! Keys handed to users are `PREFIX-XXXX-XXXX-XXXX-XXXX`, drawn from an
//! alphabet without look-alike characters (0, O, I, L, 1). The validator
//! itself treats keys as opaque strings; the format only matters when
//! provisioning new keys and when cleaning up what the user typed.

use rand::Rng;
use regex::Regex;

use crate::config::LicenseConfig;
use crate::errors::{VocabError, VocabResult};

/// Unambiguous characters used in generated segments.
const LICENSE_KEY_CHARSET: &str = "23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Shape of generated keys.
#[derive(Debug, Clone)]
pub struct LicenseKeyConfig {
    pub prefix: String,
    pub segments: u8,
    pub segment_length: u8,
}

impl Default for LicenseKeyConfig {
    fn default() -> Self {
        Self {
            prefix: "VOC".to_string(),
            segments: 4,
            segment_length: 4,
        }
    }
}

impl From<&LicenseConfig> for LicenseKeyConfig {
    fn from(config: &LicenseConfig) -> Self {
        Self {
            prefix: config.key_prefix.clone(),
            segments: config.key_segments,
            segment_length: config.key_segment_length,
        }
    }
}

impl LicenseKeyConfig {
    /// Anchored pattern matching exactly the keys this config generates.
    fn pattern(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!(
            "^{}(-[{}]{{{}}}){{{}}}$",
            regex::escape(&self.prefix),
            LICENSE_KEY_CHARSET,
            self.segment_length,
            self.segments,
        ))
    }
}

fn generate_segment(rng: &mut impl Rng, length: u8) -> String {
    let charset = LICENSE_KEY_CHARSET.as_bytes();
    (0..length)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

/// Generate a fresh key, e.g. `VOC-A2B3-C4D5-E6F7-G8H9`.
pub fn generate_license_key(config: &LicenseKeyConfig) -> String {
    let mut rng = rand::rng();
    let segments: Vec<String> = (0..config.segments)
        .map(|_| generate_segment(&mut rng, config.segment_length))
        .collect();

    format!("{}-{}", config.prefix, segments.join("-"))
}

/// True if `key` has exactly the shape `config` generates.
pub fn validate_license_key_format(key: &str, config: &LicenseKeyConfig) -> bool {
    config
        .pattern()
        .map(|re| re.is_match(key))
        .unwrap_or(false)
}

/// Clean up a key as typed by the user.
///
/// Surrounding whitespace is dropped; an empty result is rejected. Case is
/// preserved because keys provisioned elsewhere are opaque.
pub fn normalize_license_key(input: &str) -> VocabResult<String> {
    let key = input.trim();
    if key.is_empty() {
        return Err(VocabError::InvalidInput(
            "license key cannot be empty".to_string(),
        ));
    }
    if key.chars().any(char::is_control) {
        return Err(VocabError::InvalidInput(
            "license key contains control characters".to_string(),
        ));
    }
    Ok(key.to_string())
}

/// Generate keys until `exists_fn` reports one as unused.
pub async fn generate_unique_license_key<F, Fut>(
    config: &LicenseKeyConfig,
    exists_fn: F,
    max_retries: u32,
) -> VocabResult<String>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = VocabResult<bool>>,
{
    for _ in 0..max_retries {
        let key = generate_license_key(config);
        if !exists_fn(key.clone()).await? {
            return Ok(key);
        }
    }

    Err(VocabError::DatabaseError(format!(
        "failed to generate unique license key after {max_retries} attempts"
    )))
}
