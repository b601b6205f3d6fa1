//! Extracted-text cache
//!
//! Entries are keyed by the SHA-256 of the normalized URL. Expiry is checked
//! lazily on read against the injected [`Clock`]; capacity is enforced on
//! write by evicting the oldest insertion. Reads do not refresh an entry's
//! position.

use crate::clock::Clock;
use crate::url::cache_key;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    inserted_at: DateTime<Utc>,
}

/// URL to extracted text, TTL and capacity bounded
pub struct ContentCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl ContentCache {
    /// Creates a cache
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of entries; 0 is treated as 1
    /// * `ttl` - Age at which an entry stops being served
    /// * `clock` - Time source for insertion and expiry
    pub fn new(capacity: usize, ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Cached text for `url`, unless missing or expired
    ///
    /// An expired entry is removed on the way out.
    pub fn get(&self, url: &Url) -> Option<String> {
        let key = cache_key(url);
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.peek(&key) {
            None => return None,
            Some(entry) => now - entry.inserted_at >= self.ttl,
        };

        if expired {
            entries.pop(&key);
            tracing::debug!("Cache entry for {} expired", url);
            return None;
        }

        entries.peek(&key).map(|entry| entry.text.clone())
    }

    /// Stores text for `url`, evicting the oldest insertion when full
    pub fn put(&self, url: &Url, text: impl Into<String>) {
        let key = cache_key(url);
        let entry = CacheEntry {
            text: text.into(),
            inserted_at: self.clock.now(),
        };

        let mut entries = self.entries.lock();
        // Re-inserting must count as a new insertion, not a touch
        entries.pop(&key);
        if let Some((evicted, _)) = entries.push(key, entry) {
            tracing::trace!("Evicted cache entry {}", evicted);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
