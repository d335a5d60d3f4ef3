//! Local key-value cache for persisted role data.
//!
//! The cache stores opaque strings. Callers own the encoding.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::SessionConfig;
use crate::error::CacheError;

/// Key-value persistence local to the principal's session.
pub trait LocalCache: Send + Sync {
    /// Read a value. Missing keys and unreadable storage both yield `None`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Build the cache selected by the configuration.
pub fn cache_from_config(config: &SessionConfig) -> Arc<dyn LocalCache> {
    match &config.cache_dir {
        Some(dir) => Arc::new(FileCache::new(dir.clone())),
        None => Arc::new(MemoryCache::new()),
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}

/// Cache backed by one file per key in a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never sees a partial value.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key).ok()?;
        match fs::read_to_string(&path) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(cache: &dyn LocalCache) {
        assert_eq!(cache.get("role"), None);

        cache.set("role", "publisher").unwrap();
        assert_eq!(cache.get("role").as_deref(), Some("publisher"));

        cache.set("role", "advertiser").unwrap();
        assert_eq!(cache.get("role").as_deref(), Some("advertiser"));

        cache.remove("role").unwrap();
        assert_eq!(cache.get("role"), None);
        cache.remove("role").unwrap();
    }

    #[test]
    fn test_memory_cache() {
        exercise(&MemoryCache::new());
    }

    #[test]
    fn test_file_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FileCache::new(tmp.path().join("nested"));
        exercise(&cache);
    }

    #[test]
    fn test_file_cache_persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        FileCache::new(tmp.path()).set("market_role_data", "{}").unwrap();
        assert_eq!(
            FileCache::new(tmp.path()).get("market_role_data").as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn test_file_cache_rejects_path_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FileCache::new(tmp.path());
        assert!(matches!(cache.set("../escape", "x"), Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.set("", "x"), Err(CacheError::InvalidKey(_))));
        assert_eq!(cache.get("a/b"), None);
    }

    #[test]
    fn test_cache_from_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            cache_dir: Some(tmp.path().to_path_buf()),
            ..SessionConfig::default()
        };
        let cache = cache_from_config(&config);
        cache.set("k", "v").unwrap();
        assert!(tmp.path().join("k.json").exists());
    }
}
