//! Cache LRU borné avec expiration par entrée
//!
//! Les lots de métadonnées sont stockés sous une clé composite (identifiants
//! externes triés et joints par des virgules). Chaque entrée porte sa date
//! d'expiration ; une lecture ratée sur une entrée expirée la supprime.
//!
//! L'ordre de récence est celui de [`lru::LruCache`] et il est réaffirmé à chaque
//! lecture réussie. Après un `set`, la taille ne dépasse jamais `max_size`.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Durée de vie par défaut d'une entrée (30 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Nombre maximal d'entrées par défaut
pub const DEFAULT_CACHE_SIZE: usize = 100;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    expires_at: Instant,
}

/// Statistiques du cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    destroyed: bool,
}

/// Cache LRU + TTL
pub struct ResultCache<V> {
    inner: Mutex<Inner<V>>,
    max_size: usize,
    ttl: Duration,
}

impl<V: Clone> ResultCache<V> {
    /// Crée un cache. `max_size` est ramené à 1 au minimum.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                destroyed: false,
            }),
            max_size: max_size.max(1),
            ttl,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lit une entrée et la promeut en position la plus récente
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return None;
        }

        let now = Instant::now();
        let expired = match inner.entries.peek(key) {
            None => return None,
            Some(entry) => now > entry.expires_at,
        };

        if expired {
            inner.entries.pop(key);
            debug!(key = %key, "Cache entry expired");
            return None;
        }

        inner.entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Insère une entrée puis évince les moins récentes au-delà de `max_size`
    pub fn set(&self, key: impl Into<String>, payload: V) {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return;
        }

        let entry = CacheEntry {
            payload,
            expires_at: Instant::now() + self.ttl,
        };
        inner.entries.put(key.into(), entry);

        while inner.entries.len() > self.max_size {
            if let Some((evicted, _)) = inner.entries.pop_lru() {
                debug!(key = %evicted, "Evicted least recently used cache entry");
            }
        }
    }

    /// Supprime toutes les entrées expirées et retourne leur nombre
    pub fn cleanup(&self) -> usize {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return 0;
        }

        let now = Instant::now();
        let stale: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            inner.entries.pop(key);
        }
        stale.len()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().entries.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let now = Instant::now();
        let expired = inner
            .entries
            .iter()
            .filter(|(_, entry)| now > entry.expires_at)
            .count();
        CacheStats {
            total: inner.entries.len(),
            valid: inner.entries.len() - expired,
            expired,
        }
    }

    /// Vide le cache et le rend inerte
    pub fn destroy(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.destroyed = true;
    }
}

/// Construit la clé composite d'un lot à partir des identifiants externes
pub fn composite_key<'a, I>(external_ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ids: Vec<&str> = external_ids.into_iter().collect();
    ids.sort_unstable();
    ids.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize, ttl_ms: u64) -> ResultCache<u32> {
        ResultCache::new(max, Duration::from_millis(ttl_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_evicts_oldest() {
        let cache = cache(2, 60_000);
        cache.set("A", 1);
        cache.set("B", 2);
        cache.set("C", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("A"), None);
        assert_eq!(cache.get("B"), Some(2));
        assert_eq!(cache.get("C"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_refreshes_recency() {
        let cache = cache(2, 60_000);
        cache.set("A", 1);
        cache.set("B", 2);

        assert_eq!(cache.get("A"), Some(1));
        cache.set("C", 3);

        assert!(cache.contains("A"));
        assert!(!cache.contains("B"));
        assert!(cache.contains("C"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_is_a_miss_and_removes() {
        let cache = cache(10, 1000);
        cache.set("A", 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(cache.get("A"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("A"), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_only_expired() {
        let cache = cache(10, 1000);
        cache.set("old", 1);
        tokio::time::advance(Duration::from_millis(600)).await;
        cache.set("new", 2);
        tokio::time::advance(Duration::from_millis(500)).await;

        assert_eq!(
            cache.stats(),
            CacheStats {
                total: 2,
                valid: 1,
                expired: 1
            }
        );
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[tokio::test]
    async fn test_destroyed_cache_is_inert() {
        let cache = cache(10, 1000);
        cache.set("A", 1);
        cache.destroy();

        cache.set("B", 2);
        assert_eq!(cache.get("A"), None);
        assert_eq!(cache.get("B"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_composite_key_is_order_independent() {
        assert_eq!(composite_key(["b", "c", "a"]), "a,b,c");
        assert_eq!(composite_key(["c", "a", "b"]), composite_key(["a", "b", "c"]));
    }
}
