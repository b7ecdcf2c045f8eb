//! TTL response cache with pluggable backing stores.
//!
//! Cache failures never surface to callers: a read error is a miss, a
//! write error is a no-op. Both are logged.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

/// Raw byte store behind the TTL cache.
///
/// Implementations must be usable concurrently through a shared
/// reference; entries are independent and writes are idempotent
/// overwrites, so no cross-entry coordination is required.
pub trait CacheBackend: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<Vec<u8>>;
    fn set_raw(&self, key: &str, value: Vec<u8>);
    fn delete(&self, key: &str);
    fn delete_prefix(&self, prefix: &str);
    fn clear(&self);
}

#[derive(Deserialize)]
struct Envelope<T> {
    value: T,
    expires_at: i64,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    value: &'a T,
    expires_at: i64,
}

/// Serializing TTL cache over a [`CacheBackend`].
pub struct Cache {
    backend: Box<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Purely in-memory cache. Used for tests and as a degraded mode.
    pub fn memory() -> Self {
        Self::new(MemoryCache::new())
    }

    /// Open the persistent file store at `dir`, falling back to an
    /// in-memory store if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        match FileCache::new(dir.as_ref()) {
            Ok(store) => Self::new(store),
            Err(e) => {
                tracing::warn!(
                    dir = %dir.as_ref().display(),
                    error = %e,
                    "file cache unavailable, falling back to in-memory cache"
                );
                Self::memory()
            }
        }
    }

    /// Read a value. Expired or undecodable entries are evicted and
    /// reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.backend.get_raw(key)?;
        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt cache entry, treating as miss");
                self.backend.delete(key);
                return None;
            }
        };
        if envelope.expires_at <= Utc::now().timestamp() {
            tracing::debug!(key, "cache entry expired");
            self.backend.delete(key);
            return None;
        }
        tracing::debug!(key, "cache hit");
        Some(envelope.value)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        match serde_json::to_vec(&EnvelopeRef { value, expires_at }) {
            Ok(bytes) => self.backend.set_raw(key, bytes),
            Err(e) => tracing::warn!(key, error = %e, "failed to serialize cache entry"),
        }
    }

    pub fn delete(&self, key: &str) {
        self.backend.delete(key);
    }

    /// Drop every entry whose key starts with `prefix`. Used to force
    /// freshness for a user's list pages after a successful mutation.
    pub fn delete_by_prefix(&self, prefix: &str) {
        self.backend.delete_prefix(prefix);
    }

    pub fn clear(&self) {
        self.backend.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        id: u32,
        name: String,
    }

    fn payload() -> Payload {
        Payload {
            id: 7,
            name: "test".to_string(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let cache = Cache::memory();
        cache.set("media_details:7", &payload(), Duration::from_secs(60));
        assert_eq!(cache.get::<Payload>("media_details:7"), Some(payload()));
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = Cache::memory();
        assert_eq!(cache.get::<Payload>("media_details:404"), None);
    }

    #[test]
    fn test_read_after_expiry_is_miss_and_evicts() {
        let cache = Cache::memory();
        cache.set("k", &payload(), Duration::from_secs(0));
        assert_eq!(cache.get::<Payload>("k"), None);
        // The entry was removed, not merely skipped.
        assert_eq!(cache.get::<Payload>("k"), None);
    }

    #[test]
    fn test_wrong_shape_is_miss() {
        let cache = Cache::memory();
        cache.set("k", &vec![1u32, 2, 3], Duration::from_secs(60));
        assert_eq!(cache.get::<Payload>("k"), None);
    }

    #[test]
    fn test_delete_by_prefix() {
        let cache = Cache::memory();
        cache.set("user_list:alice:COMPLETED:1:50", &payload(), Duration::from_secs(60));
        cache.set("user_list:alice:PLANNING:1:50", &payload(), Duration::from_secs(60));
        cache.set("user_list:bob:COMPLETED:1:50", &payload(), Duration::from_secs(60));

        cache.delete_by_prefix("user_list:alice:");

        assert!(cache.get::<Payload>("user_list:alice:COMPLETED:1:50").is_none());
        assert!(cache.get::<Payload>("user_list:alice:PLANNING:1:50").is_none());
        assert!(cache.get::<Payload>("user_list:bob:COMPLETED:1:50").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = Cache::memory();
        cache.set("a", &payload(), Duration::from_secs(60));
        cache.set("b", &payload(), Duration::from_secs(60));
        cache.clear();
        assert!(cache.get::<Payload>("a").is_none());
        assert!(cache.get::<Payload>("b").is_none());
    }

    #[test]
    fn test_open_falls_back_to_memory_on_bad_dir() {
        // A path under a regular file cannot be created as a directory.
        let file = tempfile::NamedTempFile::new().unwrap();
        let cache = Cache::open(file.path().join("sub"));
        cache.set("k", &payload(), Duration::from_secs(60));
        assert_eq!(cache.get::<Payload>("k"), Some(payload()));
    }
}
