//! Key-value cache capability shared by the access token manager and the ID token verifier.
//!
//! The token subsystems only ever talk to [`Cache`], so the same fetch-or-reuse logic runs
//! whether entries live in process memory ([`MemoryCache`]), on disk ([`FileCache`]) or in a
//! distributed store supplied by the application. Implementations may ignore expiration hints:
//! every cached payload carries its own expiry and is re-checked on read.

mod file;
mod memory;

use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

pub use file::FileCache;
pub use memory::MemoryCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    Io(String),
    Serialization(String),
    Backend(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(message) => write!(f, "Cache I/O error: {message}"),
            CacheError::Serialization(message) => {
                write!(f, "Cache serialization error: {message}")
            }
            CacheError::Backend(message) => write!(f, "Cache backend error: {message}"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Expiration hints attached to a `put`.
///
/// `expiration` is an absolute instant, `ttl` is relative to the moment of the write. When both
/// are given the earlier one wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub expiration: Option<SystemTime>,
    pub ttl: Option<Duration>,
}

impl PutOptions {
    pub fn expires_at(expiration: SystemTime) -> Self {
        Self {
            expiration: Some(expiration),
            ttl: None,
        }
    }

    pub fn expires_in(ttl: Duration) -> Self {
        Self {
            expiration: None,
            ttl: Some(ttl),
        }
    }

    /// The absolute deadline implied by these hints for a write happening at `now`.
    pub fn deadline(&self, now: SystemTime) -> Option<SystemTime> {
        let relative = self.ttl.and_then(|ttl| now.checked_add(ttl));
        match (self.expiration, relative) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;
    async fn put(&self, key: &str, value: String, options: PutOptions) -> CacheResult<()>;
    async fn delete(&self, key: &str) -> CacheResult<()>;
}
