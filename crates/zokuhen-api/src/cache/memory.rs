use std::collections::HashMap;
use std::sync::Mutex;

use super::CacheBackend;

/// Process-local cache backend.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned lock only means another thread panicked mid-write;
        // the map itself is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheBackend for MemoryCache {
    fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: Vec<u8>) {
        self.lock().insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    fn delete_prefix(&self, prefix: &str) {
        self.lock().retain(|key, _| !key.starts_with(prefix));
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
