use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::StoreError;

/// Key/value store shared between gateway processes.
///
/// Holds both cached generation results (with a TTL) and per-user history
/// (without one). Values are opaque bytes; callers JSON-encode them.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;
    async fn ping(&self) -> bool;
    fn name(&self) -> &'static str;
}

// Redis-backed store
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection_manager().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// Store entry with timestamp
#[derive(Clone)]
struct StoreEntry {
    value: Vec<u8>,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl StoreEntry {
    fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }
}

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-process store for single-instance deployments and tests.
///
/// Expired entries are dropped on read, and swept from the whole map on a
/// write once `sweep_interval` has passed since the previous sweep.
pub struct MemoryStore {
    entries: DashMap<String, StoreEntry>,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            sweep_interval,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        self.entries.insert(
            key.to_string(),
            StoreEntry {
                value: value.to_vec(),
                created_at: Instant::now(),
                ttl,
            },
        );
        self.sweep_if_due();
    }

    fn sweep_if_due(&self) {
        // a sweep already running elsewhere covers this write too
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if last_sweep.elapsed() < self.sweep_interval {
            return;
        }
        *last_sweep = Instant::now();
        drop(last_sweep);
        self.entries.retain(|_, entry| !entry.is_expired());
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // only drop it if it is still the expired entry, a concurrent write may have replaced it
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.insert(key, value, None);
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.insert(key, value, Some(ttl));
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// Store whose every operation fails, as an unreachable redis would
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
impl FailingStore {
    fn error() -> StoreError {
        StoreError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )))
    }
}

#[cfg(test)]
#[async_trait]
impl SharedStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(Self::error())
    }

    async fn set(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
        Err(Self::error())
    }

    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), StoreError> {
        Err(Self::error())
    }

    async fn ping(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
