//! Keyed cache of resilience policies.
//!
//! Policies are type-erased so one cache can hold retry policies and rate
//! limiters side by side. Construction is single-flight per key: concurrent
//! callers asking for the same unseen key wait for one factory run, while
//! other keys are created independently.
//!
//! Besides the expiring cache, every live policy is reachable through a
//! secondary index by name. The eviction listener only drops an index entry
//! when it still points at the evicted policy, so a policy recreated under
//! the same key between eviction scheduling and execution survives.
//!
//! ```rust,ignore
//! let cache = PolicyCache::new(Expiration::Sliding(Duration::from_secs(300)));
//! let limiter = cache
//!     .get_or_create("chat-second-42", |_| RateLimiter::new(1, Duration::from_secs(1), 3))
//!     .await?;
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::PolicyError;

/// A type-erased policy.
pub type PolicyHandle = Arc<dyn Any + Send + Sync>;

type Index = Arc<Mutex<HashMap<String, PolicyHandle>>>;

/// Lifetime of a cached policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Kept until invalidated.
    #[default]
    Never,
    /// Evicted a fixed time after creation.
    Absolute(Duration),
    /// Evicted after going unused for the given time.
    Sliding(Duration),
}

#[derive(Clone)]
struct CachedPolicy {
    policy: PolicyHandle,
    expiration: Expiration,
}

struct PolicyExpiry;

impl Expiry<String, CachedPolicy> for PolicyExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedPolicy,
        _created_at: Instant,
    ) -> Option<Duration> {
        match value.expiration {
            Expiration::Never => None,
            Expiration::Absolute(ttl) | Expiration::Sliding(ttl) => Some(ttl),
        }
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &CachedPolicy,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match value.expiration {
            Expiration::Sliding(idle) => Some(idle),
            _ => duration_until_expiry,
        }
    }
}

/// Removes `key` from `index` only if it still maps to `evicted`.
fn remove_if_current(
    index: &Mutex<HashMap<String, PolicyHandle>>,
    key: &str,
    evicted: &PolicyHandle,
) -> bool {
    let mut index = index.lock();
    let current = index
        .get(key)
        .is_some_and(|policy| Arc::ptr_eq(policy, evicted));
    if current {
        index.remove(key);
    }
    current
}

/// Expiring, single-flight cache of named policies.
#[derive(Clone)]
pub struct PolicyCache {
    cache: Cache<String, CachedPolicy>,
    index: Index,
    default_expiration: Expiration,
}

impl PolicyCache {
    /// Creates a cache whose entries expire per `default_expiration`.
    pub fn new(default_expiration: Expiration) -> Self {
        let index: Index = Arc::new(Mutex::new(HashMap::new()));
        let listener_index = Arc::clone(&index);

        let cache = Cache::builder()
            .expire_after(PolicyExpiry)
            .eviction_listener(move |key: Arc<String>, entry: CachedPolicy, cause: RemovalCause| {
                let removed = remove_if_current(&listener_index, key.as_str(), &entry.policy);
                trace!(key = %key, ?cause, removed, "policy evicted");
            })
            .build();

        Self {
            cache,
            index,
            default_expiration,
        }
    }

    /// Returns the policy stored under `key`, creating it with `factory` if
    /// no unexpired entry exists.
    pub async fn get_or_create<P, F>(&self, key: &str, factory: F) -> Result<Arc<P>, PolicyError>
    where
        P: Send + Sync + 'static,
        F: FnOnce(&str) -> P,
    {
        self.get_or_create_for(key, self.default_expiration, factory)
            .await
    }

    /// Like [`get_or_create`](Self::get_or_create) with an explicit lifetime
    /// for a newly created entry.
    pub async fn get_or_create_for<P, F>(
        &self,
        key: &str,
        expiration: Expiration,
        factory: F,
    ) -> Result<Arc<P>, PolicyError>
    where
        P: Send + Sync + 'static,
        F: FnOnce(&str) -> P,
    {
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with(async {
                let policy: PolicyHandle = Arc::new(factory(key));
                debug!(key, policy = type_name::<P>(), ?expiration, "policy created");
                CachedPolicy { policy, expiration }
            })
            .await;

        // Indexed only once the cache holds the policy. A caller dropped
        // before this point leaves the entry unindexed until the next hit.
        let fresh = entry.is_fresh();
        let entry = entry.into_value();
        {
            let mut index = self.index.lock();
            if fresh {
                index.insert(key.to_string(), Arc::clone(&entry.policy));
            } else {
                index
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::clone(&entry.policy));
            }
        }

        entry
            .policy
            .downcast::<P>()
            .map_err(|_| PolicyError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<P>(),
            })
    }

    /// Looks up a live policy by name without touching its expiry.
    pub fn lookup(&self, key: &str) -> Option<PolicyHandle> {
        self.index.lock().get(key).cloned()
    }

    /// Typed [`lookup`](Self::lookup).
    pub fn lookup_as<P: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<P>> {
        self.lookup(key)?.downcast::<P>().ok()
    }

    /// Evicts `key`.
    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Number of cached entries, including ones pending eviction.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance such as expiry and eviction notifications.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        Self::new(Expiration::default())
    }
}

impl fmt::Debug for PolicyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyCache")
            .field("entries", &self.cache.entry_count())
            .field("default_expiration", &self.default_expiration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counter(usize);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_construction() {
        let cache = PolicyCache::default();
        let created = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let created = Arc::clone(&created);
                tokio::spawn(async move {
                    cache
                        .get_or_create("shared", |_| {
                            std::thread::sleep(Duration::from_millis(20));
                            Counter(created.fetch_add(1, Ordering::SeqCst))
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut policies = Vec::new();
        for task in tasks {
            policies.push(task.await.unwrap());
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(policies.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_policies() {
        let cache = PolicyCache::default();

        let a = cache.get_or_create("chat-1", |_| Counter(1)).await.unwrap();
        let b = cache.get_or_create("chat-2", |_| Counter(2)).await.unwrap();
        let again = cache.get_or_create("chat-1", |_| Counter(99)).await.unwrap();

        assert_eq!(a.0, 1);
        assert_eq!(b.0, 2);
        assert!(Arc::ptr_eq(&a, &again));
    }

    #[tokio::test]
    async fn test_factory_receives_key() {
        let cache = PolicyCache::default();
        let policy = cache
            .get_or_create("chat-minute-7", |key| key.to_string())
            .await
            .unwrap();
        assert_eq!(policy.as_str(), "chat-minute-7");
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let cache = PolicyCache::default();
        cache.get_or_create("k", |_| Counter(0)).await.unwrap();

        let err = cache.get_or_create("k", |_| 5_u32).await.unwrap_err();
        assert!(matches!(err, PolicyError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_expired_policy_is_recreated() {
        let cache = PolicyCache::new(Expiration::Absolute(Duration::from_millis(30)));
        let first = cache.get_or_create("k", |_| Counter(1)).await.unwrap();

        std::thread::sleep(Duration::from_millis(60));
        cache.run_pending_tasks().await;

        let second = cache.get_or_create("k", |_| Counter(2)).await.unwrap();
        assert_eq!(second.0, 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.lookup_as::<Counter>("k").unwrap().0, 2);
    }

    #[tokio::test]
    async fn test_invalidate_clears_index() {
        let cache = PolicyCache::default();
        cache.get_or_create("k", |_| Counter(1)).await.unwrap();
        assert!(cache.lookup("k").is_some());

        cache.invalidate("k").await;
        cache.run_pending_tasks().await;

        assert!(cache.lookup("k").is_none());
    }

    #[tokio::test]
    async fn test_recreated_policy_survives_stale_eviction() {
        let cache = PolicyCache::default();
        let stale = cache.get_or_create("k", |_| Counter(1)).await.unwrap();
        let stale: PolicyHandle = stale;

        cache.invalidate("k").await;
        let fresh = cache.get_or_create("k", |_| Counter(2)).await.unwrap();
        cache.run_pending_tasks().await;

        // A late notification for the old policy must not drop the new one.
        assert!(!remove_if_current(&cache.index, "k", &stale));
        let indexed = cache.lookup_as::<Counter>("k").unwrap();
        assert!(Arc::ptr_eq(&indexed, &fresh));
    }

    #[tokio::test]
    async fn test_index_follows_cached_entries() {
        let cache = PolicyCache::default();
        let policy = cache.get_or_create("k", |_| Counter(1)).await.unwrap();
        assert!(Arc::ptr_eq(&cache.lookup_as::<Counter>("k").unwrap(), &policy));

        cache.index.lock().remove("k");
        let again = cache.get_or_create("k", |_| Counter(2)).await.unwrap();

        assert!(Arc::ptr_eq(&again, &policy));
        assert!(Arc::ptr_eq(&cache.lookup_as::<Counter>("k").unwrap(), &policy));
    }

    #[test]
    fn test_remove_if_current() {
        let index = Mutex::new(HashMap::new());
        let old: PolicyHandle = Arc::new(Counter(1));
        let new: PolicyHandle = Arc::new(Counter(2));
        index.lock().insert("k".to_string(), Arc::clone(&new));

        assert!(!remove_if_current(&index, "k", &old));
        assert!(index.lock().contains_key("k"));

        assert!(remove_if_current(&index, "k", &new));
        assert!(index.lock().is_empty());
    }
}
