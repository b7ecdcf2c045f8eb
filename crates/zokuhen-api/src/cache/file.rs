use std::io;
use std::path::{Path, PathBuf};

use super::CacheBackend;

/// Persistent cache backend: one file per key under a single directory.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create the cache directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "file cache initialized");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Map a cache key to a safe filename. Character-wise, so that key
/// prefixes stay filename prefixes and prefix deletion keeps working.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl CacheBackend for FileCache {
    fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed");
                None
            }
        }
    }

    fn set_raw(&self, key: &str, value: Vec<u8>) {
        let path = self.path_for(key);
        if let Err(e) = std::fs::write(&path, value) {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }

    fn delete(&self, key: &str) {
        let path = self.path_for(key);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(key, error = %e, "cache delete failed");
            }
        }
    }

    fn delete_prefix(&self, prefix: &str) {
        let prefix = sanitize_key(prefix);
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "cache directory scan failed");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    tracing::warn!(file = name, error = %e, "cache delete failed");
                }
            }
        }
    }

    fn clear(&self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "cache directory scan failed");
                return;
            }
        };
        for entry in entries.flatten() {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    tracing::warn!(error = %e, "cache delete failed");
                }
            }
        }
    }
}
