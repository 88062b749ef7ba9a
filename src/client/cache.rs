//! Short-lived request cache with in-flight deduplication.
//!
//! Keys are a method name plus the canonical JSON of the call parameters. Callers asking for
//! the same key while a fetch is running wait for it and reuse its result; completed results
//! are served until their TTL runs out. Failures are never stored.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use super::error::ServiceResult;

/// Called with the key or prefix that was invalidated.
pub type InvalidationHook = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

pub struct RequestCache {
    default_ttl: Duration,
    method_ttls: HashMap<String, Duration>,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
    inflight: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Bumped by every invalidation; a fetch that straddles one is not stored.
    generation: AtomicU64,
    hooks: Vec<InvalidationHook>,
}

/// Holds the per-key fetch lock and drops the key's slot once nobody else is waiting on it.
struct InflightSlot<'a> {
    cache: &'a RequestCache,
    key: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut inflight = self
            .cache
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // The map and this slot are the only holders.
        if Arc::strong_count(&self.lock) == 2 {
            inflight.remove(&self.key);
        }
    }
}

impl RequestCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 256;

    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            method_ttls: HashMap::new(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
            entries: Mutex::new(HashMap::new()),
            inflight: std::sync::Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            hooks: Vec::new(),
        }
    }

    /// Override the TTL for one method name.
    pub fn with_method_ttl(mut self, method: impl Into<String>, ttl: Duration) -> Self {
        self.method_ttls.insert(method.into(), ttl);
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Register a callback run after every invalidation.
    pub fn on_invalidate(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn ttl_for(&self, method: &str) -> Duration {
        self.method_ttls
            .get(method)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Cache key for a method call.
    pub fn key<P: Serialize + ?Sized>(method: &str, params: &P) -> String {
        let params = serde_json::to_value(params)
            .map(|v| canonical_json(&v))
            .unwrap_or_default();
        format!("{}:{}", method, params)
    }

    /// Return the cached result for `method(params)`, or run `fetch` once and cache its success.
    pub async fn get_or_fetch<T, P, F, Fut>(
        &self,
        method: &str,
        params: &P,
        fetch: F,
    ) -> ServiceResult<T>
    where
        T: Serialize + DeserializeOwned,
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let key = Self::key(method, params);

        if let Some(value) = self.lookup(&key).await {
            tracing::debug!(key = %key, "Request cache hit");
            return Ok(serde_json::from_value(value)?);
        }

        // One fetch per key at a time; latecomers wait here and then find the stored value.
        let _slot = self.acquire(&key).await;

        if let Some(value) = self.lookup(&key).await {
            tracing::debug!(key = %key, "Request cache hit after waiting for in-flight fetch");
            return Ok(serde_json::from_value(value)?);
        }

        tracing::debug!(key = %key, "Request cache miss");
        let generation = self.generation.load(Ordering::Acquire);
        let result = fetch().await?;
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(key = %key, "Cache invalidated during fetch, result not stored");
            return Ok(result);
        }
        let entry = CacheEntry {
            value: serde_json::to_value(&result)?,
            stored_at: Instant::now(),
            ttl: self.ttl_for(method),
        };
        self.store(key, entry).await;
        Ok(result)
    }

    pub async fn invalidate(&self, key: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.lock().await.remove(key);
        self.run_hooks(key);
    }

    /// Drop every entry whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries
            .lock()
            .await
            .retain(|key, _| !key.starts_with(prefix));
        self.run_hooks(prefix);
    }

    pub async fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.lock().await.clear();
        self.run_hooks("");
    }

    /// Number of fresh entries.
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.is_fresh())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn lookup(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_fresh() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn store(&self, key: String, entry: CacheEntry) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.is_fresh());
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(key, entry);
    }

    async fn acquire(&self, key: &str) -> InflightSlot<'_> {
        let lock = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let mut slot = InflightSlot {
            cache: self,
            key: key.to_string(),
            lock,
            guard: None,
        };
        slot.guard = Some(Arc::clone(&slot.lock).lock_owned().await);
        slot
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn run_hooks(&self, scope: &str) {
        for hook in &self.hooks {
            hook(scope);
        }
    }
}

/// JSON text with object keys sorted, so equal parameters always produce equal keys.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::{ErrorKind, ServiceError};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_key_ignores_field_order() {
        let a = json!({"status": "pending", "assignedTo": "s1"});
        let b = json!({"assignedTo": "s1", "status": "pending"});
        assert_eq!(
            RequestCache::key("getAllTasks", &a),
            RequestCache::key("getAllTasks", &b)
        );
        assert_ne!(
            RequestCache::key("getAllTasks", &a),
            RequestCache::key("getTodayTasks", &a)
        );
        assert_eq!(RequestCache::key("getAllTasks", &json!({})), "getAllTasks:{}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reuses_result_within_ttl() {
        let cache = RequestCache::new(Duration::from_secs(3));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: u32 = cache
                .get_or_fetch("count", &json!({}), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(4)).await;
        let _: u32 = cache
            .get_or_fetch("count", &json!({}), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(8)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = Arc::new(RequestCache::new(Duration::from_secs(3)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("slow", &json!({"page": 1}), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        Ok::<_, ServiceError>(vec![1, 2, 3])
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = RequestCache::new(Duration::from_secs(3));

        let first: ServiceResult<u32> = cache
            .get_or_fetch("flaky", &(), || async {
                Err(ServiceError::network("connection refused"))
            })
            .await;
        assert_eq!(first.unwrap_err().kind, ErrorKind::Network);

        let second: u32 = cache
            .get_or_fetch("flaky", &(), || async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(second, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_method_ttl_override() {
        let cache = RequestCache::new(Duration::from_secs(2))
            .with_method_ttl("getTaskStatistics", Duration::from_secs(5));
        assert_eq!(cache.ttl_for("getTaskStatistics"), Duration::from_secs(5));
        assert_eq!(cache.ttl_for("getAllTasks"), Duration::from_secs(2));

        let _: u32 = cache
            .get_or_fetch("getTaskStatistics", &(), || async { Ok(1) })
            .await
            .unwrap();
        let _: u32 = cache
            .get_or_fetch("getAllTasks", &(), || async { Ok(1) })
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_prefix_runs_hooks() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let cache = RequestCache::new(Duration::from_secs(3))
            .on_invalidate(move |scope| recorder.lock().unwrap().push(scope.to_string()));

        let _: u32 = cache
            .get_or_fetch("tasks.getAllTasks", &(), || async { Ok(1) })
            .await
            .unwrap();
        let _: u32 = cache
            .get_or_fetch("staff.getAllStaff", &(), || async { Ok(2) })
            .await
            .unwrap();

        cache.invalidate_prefix("tasks.").await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["tasks.".to_string()]);
    }

    #[tokio::test]
    async fn test_evicts_oldest_when_full() {
        let cache = RequestCache::new(Duration::from_secs(3)).with_max_entries(2);
        for n in 0..3u32 {
            let _: u32 = cache
                .get_or_fetch("item", &json!({ "n": n }), || async move { Ok(n) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_fetch_discards_result() {
        let cache = Arc::new(RequestCache::new(Duration::from_secs(3)));
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_fetch("tasks.getAllTasks", &(), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        Ok::<_, ServiceError>("before-write".to_string())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.invalidate_prefix("tasks.").await;

        let after: String = cache
            .get_or_fetch("tasks.getAllTasks", &(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("after-write".to_string())
            })
            .await
            .unwrap();

        assert_eq!(slow.await.unwrap().unwrap(), "before-write");
        assert_eq!(after, "after-write");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inflight_slots_are_released() {
        let cache = RequestCache::new(Duration::from_secs(3)).with_max_entries(2);
        for n in 0..1000u32 {
            let _: u32 = cache
                .get_or_fetch("item", &json!({ "n": n }), || async move { Ok(n) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.inflight_len(), 0);

        let _: ServiceResult<u32> = cache
            .get_or_fetch("item", &json!({ "n": "err" }), || async {
                Err(ServiceError::network("down"))
            })
            .await;
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inflight_slot_kept_while_callers_wait() {
        let cache = Arc::new(RequestCache::new(Duration::from_secs(3)));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("slow", &(), || async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok::<_, ServiceError>(1u32)
                    })
                    .await
            }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.inflight_len(), 1);
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(cache.inflight_len(), 0);
    }
}
