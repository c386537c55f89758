//! Incremental per-source cache.
//!
//! Entries are keyed by source URL/path and guarded by a content hash, so
//! an unchanged source skips re-transformation on the next run. Writers
//! hold the lock for the whole update; readers get a cloned snapshot.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{CompilerError, Result};

/// A cached per-source compilation result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Hex SHA-256 of the raw source content.
    pub content_hash: String,
    /// The transformed rules.
    pub rules: Vec<String>,
    /// When the entry was written.
    pub compiled_at: DateTime<Utc>,
}

/// In-memory incremental cache for per-source results.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl SourceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a source result; hits require a matching content hash.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` when the cache lock is poisoned.
    pub fn get(&self, key: &str, content_hash: &str) -> Result<Option<Vec<String>>> {
        let entries = self.lock()?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.content_hash == content_hash)
            .map(|entry| entry.rules.clone()))
    }

    /// Store a source result. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` when the cache lock is poisoned.
    pub fn put(&self, key: &str, content_hash: &str, rules: Vec<String>) -> Result<()> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                content_hash: content_hash.to_string(),
                rules,
                compiled_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Remove a source entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` when the cache lock is poisoned.
    pub fn evict(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut entries = self.lock()?;
        Ok(entries.remove(key))
    }

    /// Number of cached sources.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` when the cache lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the cache is empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` when the cache lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| CompilerError::StorageOperationFailed("cache lock poisoned".to_string()))
    }
}

/// Hex SHA-256 of source content, used as the cache guard.
#[must_use]
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = content_hash("||example.com^");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash, content_hash("||other.org^"));
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = SourceCache::new();
        let hash = content_hash("raw content");
        assert_eq!(cache.get("https://example.org/a.txt", &hash).unwrap(), None);

        cache
            .put(
                "https://example.org/a.txt",
                &hash,
                vec!["||example.com^".to_string()],
            )
            .unwrap();
        assert_eq!(
            cache.get("https://example.org/a.txt", &hash).unwrap(),
            Some(vec!["||example.com^".to_string()])
        );
    }

    #[test]
    fn test_stale_hash_misses() {
        let cache = SourceCache::new();
        cache
            .put("key", &content_hash("v1"), vec!["rule".to_string()])
            .unwrap();
        assert_eq!(cache.get("key", &content_hash("v2")).unwrap(), None);
    }

    #[test]
    fn test_last_write_wins_and_evict() {
        let cache = SourceCache::new();
        let hash = content_hash("content");
        cache.put("key", &hash, vec!["old".to_string()]).unwrap();
        cache.put("key", &hash, vec!["new".to_string()]).unwrap();
        assert_eq!(
            cache.get("key", &hash).unwrap(),
            Some(vec!["new".to_string()])
        );

        let evicted = cache.evict("key").unwrap().unwrap();
        assert_eq!(evicted.rules, vec!["new".to_string()]);
        assert!(cache.is_empty().unwrap());
    }
}
