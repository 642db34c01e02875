//! Validates cached profile lookups using SHA-256 checksums.
//!
//! Social profile responses are cached as JSON strings. Each entry carries a
//! checksum computed at insert time; an entry whose checksum no longer matches
//! is treated as a miss and the profile is fetched again.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Wrapper for cached data with integrity validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCacheEntry {
    /// The actual cached data (JSON string)
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    /// Creates a new validated cache entry with computed checksum
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    /// Serializes `value` and wraps it. Returns `None` if the value cannot be encoded.
    pub fn wrap<T: Serialize>(value: &T) -> Option<String> {
        serde_json::to_string(value)
            .ok()
            .map(|json| Self::new(json).serialize())
    }

    /// Validates and decodes an entry produced by [`ValidatedCacheEntry::wrap`].
    pub fn unwrap_validated<T: DeserializeOwned>(serialized: &str) -> Option<T> {
        let data = Self::deserialize_and_validate(serialized)?;
        serde_json::from_str(&data).ok()
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Validates the integrity of the cached data
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// Serializes the entry for storage in cache
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserializes and validates a cache entry
    ///
    /// Returns Some(data) if valid, None if corrupted or invalid JSON
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}
