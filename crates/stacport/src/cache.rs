//! In-process caches for upstream lookups.
//!
//! Entries expire after a fixed TTL; stale entries are dropped lazily on
//! read or in bulk with [`TtlCache::delete_stale`]. Locks are never held
//! across an await point.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::provider::License;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted: Instant,
}

/// String-keyed cache with a single TTL.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live entry.
    ///
    /// Returns `None` if the key is unknown or its entry expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.into(),
                Entry {
                    value,
                    inserted: Instant::now(),
                },
            );
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn delete_stale(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted.elapsed() < self.ttl);
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caches shared by every request of the server.
#[derive(Debug)]
pub struct Caches {
    /// Project licenses by project path; `None` records "no license".
    pub licenses: TtlCache<Option<License>>,
    /// Usernames by token digest.
    pub users: TtlCache<String>,
    /// Project paths by numeric id.
    pub project_paths: TtlCache<String>,
    /// Store access decisions by `user:path`.
    pub access: TtlCache<bool>,
}

impl Caches {
    #[must_use]
    pub fn new(project_ttl: Duration, access_ttl: Duration) -> Self {
        Self {
            licenses: TtlCache::new(project_ttl),
            users: TtlCache::new(access_ttl),
            project_paths: TtlCache::new(project_ttl),
            access: TtlCache::new(access_ttl),
        }
    }
}

/// Cache key for a token; the token itself is never stored.
#[must_use]
pub fn token_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("space/dataset", Some(1));
        assert_eq!(cache.get("space/dataset"), Some(Some(1)));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("space/dataset"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_stale() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("a", 1);
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.insert("b", 2);
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.delete_stale(), 1);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_token_key_hides_token() {
        let key = token_key("glpat-secret");
        assert_eq!(key.len(), 64);
        assert!(!key.contains("secret"));
        assert_eq!(key, token_key("glpat-secret"));
    }
}
