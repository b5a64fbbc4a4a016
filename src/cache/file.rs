use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheError, CacheResult, PutOptions};
use crate::util::time::{millis_to_system_time, system_time_to_millis, Clock, SystemClock};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
struct PersistedEntry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u64>,
}

/// Directory-backed cache storing one JSON document per key.
///
/// Useful when several short-lived processes on one host should share an access token and
/// certificate set instead of each fetching their own.
#[derive(Clone, Debug)]
pub struct FileCache {
    base_dir: Arc<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> CacheResult<Self> {
        Self::with_clock(base_dir, Arc::new(SystemClock))
    }

    pub fn with_clock(base_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> CacheResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|err| {
            CacheError::Io(format!(
                "Failed to create auth cache directory '{}': {}",
                base_dir.display(),
                err
            ))
        })?;
        Ok(Self {
            base_dir: Arc::new(base_dir),
            clock,
        })
    }

    /// Uses `FIREBASE_AUTH_CACHE_DIR` when set, otherwise `./.firebase/auth`.
    pub fn from_env() -> CacheResult<Self> {
        if let Ok(dir) = std::env::var("FIREBASE_AUTH_CACHE_DIR") {
            return Self::new(PathBuf::from(dir));
        }

        let dir = std::env::current_dir()
            .map_err(|err| CacheError::Io(format!("Failed to obtain working directory: {}", err)))?
            .join(".firebase/auth");
        Self::new(dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let encoded = percent_encode(key.as_bytes(), NON_ALPHANUMERIC).to_string();
        self.base_dir.join(format!("{}.json", encoded))
    }

    async fn remove(&self, path: &Path) -> CacheResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::Io(format!(
                "Failed to delete auth cache '{}': {}",
                path.display(),
                err
            ))),
        }
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let path = self.file_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(CacheError::Io(format!(
                    "Failed to read auth cache '{}': {}",
                    path.display(),
                    err
                )))
            }
        };
        let entry: PersistedEntry = serde_json::from_slice(&bytes).map_err(|err| {
            CacheError::Serialization(format!(
                "Failed to parse auth cache '{}': {}",
                path.display(),
                err
            ))
        })?;

        let expired = entry
            .expires_at_ms
            .map(millis_to_system_time)
            .is_some_and(|deadline| self.clock.now() >= deadline);
        if expired {
            self.remove(&path).await?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> CacheResult<()> {
        let path = self.file_for(key);
        let entry = PersistedEntry {
            value,
            expires_at_ms: options
                .deadline(self.clock.now())
                .map(system_time_to_millis),
        };
        let bytes = serde_json::to_vec(&entry).map_err(|err| {
            CacheError::Serialization(format!(
                "Failed to serialize auth cache '{}': {}",
                path.display(),
                err
            ))
        })?;
        tokio::fs::write(&path, bytes).await.map_err(|err| {
            CacheError::Io(format!(
                "Failed to write auth cache '{}': {}",
                path.display(),
                err
            ))
        })
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let path = self.file_for(key);
        self.remove(&path).await
    }
}
