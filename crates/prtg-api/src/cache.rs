// ── Response cache ──
//
// Memoizes normalized results per request signature with a time-to-live.
// Each key owns an async mutex, so concurrent callers for the same key
// wait for one fetch instead of all hitting the backend. Every store
// sweeps out expired and empty slots; there is no background task.
// Failed fetches are never stored.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::error::Error;
use crate::request::CacheKey;

/// Applied when no TTL is configured.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

type Slot = Arc<Mutex<Option<Entry>>>;

pub struct ResponseCache {
    slots: DashMap<CacheKey, Slot>,
    default_ttl: Duration,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("keys", &self.slots.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the live value for `key`, or run `fetch` and store its result.
    ///
    /// `ttl` overrides the default for this entry. A zero TTL stores
    /// nothing usable: the next call fetches again.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, Error>> + Send,
    {
        let slot = Arc::clone(&self.slots.entry(key.clone()).or_default());
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.take() {
            if entry.expires_at > Instant::now() {
                match Arc::clone(&entry.value).downcast::<T>() {
                    Ok(value) => {
                        trace!(key = key.as_str(), "cache hit");
                        *guard = Some(entry);
                        return Ok(value);
                    }
                    Err(_) => trace!(key = key.as_str(), "cache type mismatch, refetching"),
                }
            } else {
                trace!(key = key.as_str(), "cache entry expired");
            }
        } else {
            trace!(key = key.as_str(), "cache miss");
        }

        let value = Arc::new(fetch().await?);
        let stored: Arc<dyn Any + Send + Sync> = Arc::<T>::clone(&value);
        *guard = Some(Entry {
            value: stored,
            expires_at: Instant::now() + ttl.unwrap_or(self.default_ttl),
        });
        drop(guard);
        self.sweep();
        Ok(value)
    }

    /// Drop slots whose entry has expired or was never filled.
    ///
    /// Slots locked by an in-flight fetch are kept.
    fn sweep(&self) {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry.as_ref().is_some_and(|e| e.expires_at > now),
            Err(_) => true,
        });
        let removed = before.saturating_sub(self.slots.len());
        if removed > 0 {
            trace!(removed, live = self.slots.len(), "cache swept");
        }
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate(&self, key: &CacheKey) {
        self.slots.remove(key);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of keys currently held, live or awaiting the next sweep.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
