use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::cache::{Cache, CacheError, CacheResult, PutOptions};
use crate::util::time::{Clock, SystemClock};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Option<SystemTime>,
}

/// In-process cache backed by a `HashMap`.
///
/// Expiration hints are honored against the configured clock; expired entries read as absent
/// and are evicted on access.
#[derive(Clone, Debug)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .map(|entries| entries.values().filter(|entry| is_live(entry, now)).count())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("memory cache lock poisoned".into()))
    }
}

fn is_live(entry: &Entry, now: SystemTime) -> bool {
    entry.expires_at.map_or(true, |deadline| now < deadline)
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if is_live(entry, now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> CacheResult<()> {
        let expires_at = options.deadline(self.clock.now());
        self.lock()?
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;
    use std::time::Duration;

    #[tokio::test]
    async fn put_get_delete() {
        let cache = MemoryCache::new();
        cache
            .put("key", "value".into(), PutOptions::default())
            .await
            .unwrap();
        assert_eq!(cache.get("key").await.unwrap().as_deref(), Some("value"));

        cache.delete("key").await.unwrap();
        assert!(cache.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let clock = Arc::new(ManualClock::default());
        let cache = MemoryCache::with_clock(clock.clone());
        cache
            .put(
                "key",
                "value".into(),
                PutOptions::expires_in(Duration::from_secs(10)),
            )
            .await
            .unwrap();

        clock.advance(Duration::from_secs(9));
        assert!(cache.get("key").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("key").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn absolute_expiration_is_honored() {
        let clock = Arc::new(ManualClock::default());
        let cache = MemoryCache::with_clock(clock.clone());
        let deadline = clock.now() + Duration::from_secs(60);
        cache
            .put("key", "value".into(), PutOptions::expires_at(deadline))
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        clock.advance(Duration::from_secs(61));
        assert!(cache.get("key").await.unwrap().is_none());
    }
}
