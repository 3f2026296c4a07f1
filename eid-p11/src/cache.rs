//! In-memory result cache
//!
//! Keeps what was read from the current card so the UI can redraw or save it
//! without going back to the token. Serialized values are base64 encoded.

use serde::{Deserialize, Serialize};

use crate::backend::Cache;

/// Custom serde module for base64 encoding of byte vectors
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// One cached object value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub label: String,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

impl CacheEntry {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Insertion-ordered cache; re-adding a label replaces its value in place
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCache {
    entries: Vec<CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by label
    pub fn get(&self, label: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.value.as_slice())
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize all entries as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

impl Cache for MemoryCache {
    fn add(&mut self, label: &str, value: &[u8]) {
        match self.entries.iter_mut().find(|e| e.label == label) {
            Some(entry) => entry.value = value.to_vec(),
            None => self.entries.push(CacheEntry {
                label: label.to_string(),
                value: value.to_vec(),
            }),
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
