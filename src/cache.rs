// Two-tier result cache. The local tier keys on history, the shared tier does not.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{BackendError, StoreError};
use crate::metrics::{CACHE_MISSES, LOCAL_CACHE_HITS, LOCAL_CACHE_SIZE};
use crate::models::CachedResult;
use crate::store::SharedStore;
use crate::templates::Mode;

pub const DEFAULT_LOCAL_CAPACITY: usize = 100;
pub const DEFAULT_SHARED_TTL: Duration = Duration::from_secs(600);

// Create the shared-tier key (the generation fingerprint)
pub fn shared_key(prompt: &str, mode: Mode, max_length: u32) -> String {
    format!("cache:{prompt}:{mode}:{max_length}")
}

// Create the local-tier key (hash of prompt + history + max_length + mode)
pub fn local_key(prompt: &str, history: &[String], max_length: u32, mode: Mode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update([0u8]);
    for turn in history {
        // length prefix keeps ["a b"] and ["a", "b"] apart
        hasher.update((turn.len() as u64).to_le_bytes());
        hasher.update(turn.as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(max_length.to_le_bytes());
    hasher.update(mode.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn read_result(store: &dyn SharedStore, key: &str) -> Result<Option<CachedResult>, StoreError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

async fn write_result(
    store: &dyn SharedStore,
    key: &str,
    result: &CachedResult,
    ttl: Duration,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_vec(result)?;
    store.set_with_ttl(key, &encoded, ttl).await
}

pub struct ResultCache {
    local: Mutex<LruCache<String, String>>,
    store: Option<Arc<dyn SharedStore>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(store: Option<Arc<dyn SharedStore>>, local_capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(local_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            local: Mutex::new(LruCache::new(capacity)),
            store,
            ttl,
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn local_len(&self) -> usize {
        self.lock_local().len()
    }

    fn lock_local(&self) -> MutexGuard<'_, LruCache<String, String>> {
        // entries are plain strings, a panicked writer cannot leave one half-built
        self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Looks up a previously generated result in the shared tier.
    ///
    /// Store failures and undecodable entries count as a miss.
    pub async fn get_shared(&self, prompt: &str, mode: Mode, max_length: u32) -> Option<CachedResult> {
        let store = self.store.as_ref()?;
        let key = shared_key(prompt, mode, max_length);

        match read_result(store.as_ref(), &key).await {
            Ok(Some(result)) => {
                debug!(key = %key, "shared cache hit");
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "shared cache read failed, treating as a miss");
                None
            }
        }
    }

    /// Stores a result in the shared tier with the configured TTL.
    pub async fn set_shared(&self, prompt: &str, mode: Mode, max_length: u32, result: &CachedResult) {
        let Some(store) = &self.store else {
            return;
        };
        let key = shared_key(prompt, mode, max_length);

        if let Err(e) = write_result(store.as_ref(), &key, result, self.ttl).await {
            error!(key = %key, error = %e, "shared cache write failed");
        }
    }

    /// Memoizes `generate` for the exact `(prompt, history, max_length, mode)`.
    ///
    /// The lock is released while `generate` runs, so two concurrent misses on
    /// the same key may both generate; the later insert wins. Failed
    /// generations are not memoized.
    pub async fn get_or_generate_local<F, Fut>(
        &self,
        prompt: &str,
        history: &[String],
        max_length: u32,
        mode: Mode,
        generate: F,
    ) -> Result<String, BackendError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, BackendError>>,
    {
        let key = local_key(prompt, history, max_length, mode);

        let hit = self.lock_local().get(&key).cloned();
        if let Some(output) = hit {
            LOCAL_CACHE_HITS.inc();
            debug!(mode = %mode, "local cache hit");
            return Ok(output);
        }
        CACHE_MISSES.inc();

        let output = generate().await?;

        let size = {
            let mut local = self.lock_local();
            local.put(key, output.clone());
            local.len()
        };
        LOCAL_CACHE_SIZE.set(size as f64);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailingStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cached(output: &str, history: &[&str]) -> CachedResult {
        CachedResult {
            input: "Test".to_string(),
            output: output.to_string(),
            history: history.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn shared_key_matches_wire_format() {
        assert_eq!(shared_key("Test", Mode::General, 100), "cache:Test:general:100");
        assert_eq!(
            shared_key("a:b", Mode::Ecommerce, 42),
            "cache:a:b:ecommerce:42"
        );
    }

    #[test]
    fn local_key_depends_on_history() {
        let empty: Vec<String> = Vec::new();
        let some = vec!["User: hi".to_string()];
        assert_ne!(
            local_key("p", &empty, 100, Mode::General),
            local_key("p", &some, 100, Mode::General)
        );
        assert_eq!(
            local_key("p", &some, 100, Mode::General),
            local_key("p", &some, 100, Mode::General)
        );
        assert_ne!(
            local_key("p", &["a b".to_string()], 100, Mode::General),
            local_key("p", &["a".to_string(), "b".to_string()], 100, Mode::General)
        );
    }

    #[tokio::test]
    async fn shared_tier_round_trips_results() {
        let store = Arc::new(MemoryStore::new());
        let cache = ResultCache::new(Some(store.clone()), 10, DEFAULT_SHARED_TTL);

        assert!(cache.get_shared("Test", Mode::General, 100).await.is_none());
        let entry = cached("Cached response.", &["User: Test", "AI: Cached response."]);
        cache.set_shared("Test", Mode::General, 100, &entry).await;

        assert_eq!(cache.get_shared("Test", Mode::General, 100).await, Some(entry));
        // any part of the fingerprint changing is a miss
        assert!(cache.get_shared("Test", Mode::Support, 100).await.is_none());
        assert!(cache.get_shared("Test", Mode::General, 101).await.is_none());
    }

    #[tokio::test]
    async fn shared_tier_entries_expire() {
        let store = Arc::new(MemoryStore::new());
        let cache = ResultCache::new(Some(store), 10, Duration::from_millis(30));
        cache.set_shared("Test", Mode::General, 100, &cached("x", &[])).await;
        assert!(cache.get_shared("Test", Mode::General, 100).await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get_shared("Test", Mode::General, 100).await.is_none());
    }

    #[tokio::test]
    async fn undecodable_shared_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store.set("cache:Test:general:100", b"{broken").await.unwrap();
        let cache = ResultCache::new(Some(store), 10, DEFAULT_SHARED_TTL);
        assert!(cache.get_shared("Test", Mode::General, 100).await.is_none());
    }

    #[tokio::test]
    async fn shared_tier_survives_store_failures() {
        let cache = ResultCache::new(Some(Arc::new(FailingStore)), 10, DEFAULT_SHARED_TTL);
        cache.set_shared("Test", Mode::General, 100, &cached("x", &[])).await;
        assert!(cache.get_shared("Test", Mode::General, 100).await.is_none());
        assert!(cache.has_store());
    }

    #[tokio::test]
    async fn shared_tier_without_store_is_inert() {
        let cache = ResultCache::new(None, 10, DEFAULT_SHARED_TTL);
        cache.set_shared("Test", Mode::General, 100, &cached("x", &[])).await;
        assert!(cache.get_shared("Test", Mode::General, 100).await.is_none());
        assert!(!cache.has_store());
    }

    #[tokio::test]
    async fn local_tier_memoizes_exact_calls() {
        let cache = ResultCache::new(None, 10, DEFAULT_SHARED_TTL);
        let calls = AtomicUsize::new(0);
        let history = vec!["User: hi".to_string()];

        for _ in 0..3 {
            let output = cache
                .get_or_generate_local("p", &history, 100, Mode::General, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("generated".to_string())
                })
                .await
                .unwrap();
            assert_eq!(output, "generated");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // different history means a different local entry
        cache
            .get_or_generate_local("p", &[], 100, Mode::General, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("other".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn local_tier_evicts_least_recently_used() {
        let cache = ResultCache::new(None, 2, DEFAULT_SHARED_TTL);
        let calls = AtomicUsize::new(0);
        let run = |prompt: &'static str| {
            let cache = &cache;
            let calls = &calls;
            async move {
                cache
                    .get_or_generate_local(prompt, &[], 100, Mode::General, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(prompt.to_uppercase())
                    })
                    .await
                    .unwrap()
            }
        };

        run("a").await;
        run("b").await;
        run("a").await; // refresh a, b is now oldest
        run("c").await; // evicts b
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.local_len(), 2);

        run("a").await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        run("b").await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn local_tier_does_not_memoize_failures() {
        let cache = ResultCache::new(None, 10, DEFAULT_SHARED_TTL);
        let result = cache
            .get_or_generate_local("p", &[], 100, Mode::General, || async {
                Err(BackendError::Unavailable)
            })
            .await;
        assert!(matches!(result, Err(BackendError::Unavailable)));
        assert_eq!(cache.local_len(), 0);
    }
}
