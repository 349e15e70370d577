// 🔁 Query Cache
// Stale-while-revalidate cache for remote rate data, with polling and retries

use anyhow::Result;
use moka::sync::Cache;
use std::time::{Duration, Instant};

/// Longest pause between two retries
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// What a cached value is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Rates,
    History(u32),
}

/// Freshness and retry settings for one kind of query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPolicy {
    /// Cached data younger than this is served without fetching
    pub stale_time: Duration,
    /// Poll interval (None = fetch on demand only)
    pub refetch_interval: Option<Duration>,
    /// Entries not read for this long are dropped
    pub gc_time: Duration,
    /// Extra attempts after the first failure
    pub retry: u32,
    /// First back-off; doubles on each retry
    pub retry_delay: Duration,
}

impl QueryPolicy {
    /// Current rates: poll every minute, fresh for 30 s
    pub fn rates() -> Self {
        QueryPolicy {
            stale_time: Duration::from_secs(30),
            refetch_interval: Some(Duration::from_secs(60)),
            gc_time: Duration::from_secs(5 * 60),
            retry: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// History windows: fresh for 5 min, kept for 30 min
    pub fn history() -> Self {
        QueryPolicy {
            stale_time: Duration::from_secs(5 * 60),
            refetch_interval: None,
            gc_time: Duration::from_secs(30 * 60),
            retry: 2,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_delay
            .checked_mul(factor)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

/// Run `fetcher` up to `1 + policy.retry` times, sleeping the back-off
/// between attempts. Blocks the calling thread.
pub fn fetch_with_retry<T, F>(key: QueryKey, policy: &QueryPolicy, mut fetcher: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match fetcher() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retry => {
                let delay = policy.backoff(attempt);
                tracing::warn!(?key, attempt = attempt + 1, ?delay, error = %err, "fetch failed, retrying");
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(?key, error = %err, "fetch failed");
                return Err(err);
            }
        }
    }
}

/// One cached value plus its bookkeeping
#[derive(Debug, Clone)]
pub struct QueryEntry<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    /// Last successful fetch
    pub updated_at: Option<Instant>,
    /// Last fetch start, successful or not
    pub last_attempt: Option<Instant>,
    pub fetching: bool,
}

impl<T> QueryEntry<T> {
    fn empty() -> Self {
        QueryEntry {
            data: None,
            error: None,
            updated_at: None,
            last_attempt: None,
            fetching: false,
        }
    }

    fn is_fresh(&self, policy: &QueryPolicy) -> bool {
        match self.updated_at {
            Some(at) if self.data.is_some() => at.elapsed() < policy.stale_time,
            _ => false,
        }
    }
}

/// QueryCache - Cached results of one data type, keyed by `QueryKey`
///
/// Entries nobody reads for `gc_time` are evicted by moka's idle expiry.
pub struct QueryCache<T> {
    entries: Cache<QueryKey, QueryEntry<T>>,
    policy: QueryPolicy,
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    pub fn new(policy: QueryPolicy) -> Self {
        QueryCache {
            entries: Cache::builder().time_to_idle(policy.gc_time).build(),
            policy,
        }
    }

    pub fn policy(&self) -> &QueryPolicy {
        &self.policy
    }

    fn entry_or_empty(&self, key: QueryKey) -> QueryEntry<T> {
        self.entries.get(&key).unwrap_or_else(QueryEntry::empty)
    }

    /// Serve fresh data from the cache, otherwise fetch in place.
    ///
    /// When every attempt fails the previous data stays cached and the
    /// error is recorded and returned.
    pub fn fetch<F>(&self, key: QueryKey, fetcher: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        if let Some(data) = self.fresh_data(key) {
            tracing::trace!(?key, "cache hit");
            return Ok(data);
        }

        self.begin(key);
        let result = fetch_with_retry(key, &self.policy, fetcher);
        self.resolve(key, result)
    }

    pub fn fresh_data(&self, key: QueryKey) -> Option<T> {
        let entry = self.entries.get(&key)?;
        if entry.is_fresh(&self.policy) {
            entry.data
        } else {
            None
        }
    }

    /// Mark a fetch of `key` as started. False when one is already running.
    pub fn begin(&self, key: QueryKey) -> bool {
        let mut entry = self.entry_or_empty(key);
        if entry.fetching {
            return false;
        }
        entry.fetching = true;
        entry.last_attempt = Some(Instant::now());
        self.entries.insert(key, entry);
        true
    }

    /// Store the outcome of a fetch started with `begin` and hand it back
    pub fn resolve(&self, key: QueryKey, result: Result<T>) -> Result<T> {
        let mut entry = self.entry_or_empty(key);
        entry.fetching = false;
        if entry.last_attempt.is_none() {
            entry.last_attempt = Some(Instant::now());
        }

        match &result {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.error = None;
                entry.updated_at = Some(Instant::now());
            }
            Err(err) => entry.error = Some(format!("{:#}", err)),
        }

        self.entries.insert(key, entry);
        result
    }

    pub fn is_fetching(&self, key: QueryKey) -> bool {
        self.entries.get(&key).map(|e| e.fetching).unwrap_or(false)
    }

    /// Whether the poll loop should start a fetch of `key`.
    ///
    /// The interval counts from the last attempt, so a failing service is
    /// polled once per interval.
    pub fn needs_refetch(&self, key: QueryKey) -> bool {
        let Some(entry) = self.entries.get(&key) else {
            return true;
        };
        if entry.fetching {
            return false;
        }
        let Some(last_attempt) = entry.last_attempt else {
            return true;
        };

        match self.policy.refetch_interval {
            Some(interval) => last_attempt.elapsed() >= interval,
            None => entry.data.is_none() && entry.error.is_none(),
        }
    }

    /// Last successful value, however old. Counts as a use for idle expiry.
    pub fn data(&self, key: QueryKey) -> Option<T> {
        self.entries.get(&key).and_then(|e| e.data)
    }

    /// Error of the last fetch, if it failed
    pub fn error(&self, key: QueryKey) -> Option<String> {
        self.entries.get(&key).and_then(|e| e.error)
    }

    pub fn entry(&self, key: QueryKey) -> Option<QueryEntry<T>> {
        self.entries.get(&key)
    }

    /// Force the next `fetch` or poll to hit the provider
    pub fn invalidate(&self, key: QueryKey) {
        if let Some(mut entry) = self.entries.get(&key) {
            entry.updated_at = None;
            entry.last_attempt = None;
            self.entries.insert(key, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn instant_policy() -> QueryPolicy {
        QueryPolicy {
            stale_time: Duration::from_secs(60),
            refetch_interval: Some(Duration::from_secs(60)),
            gc_time: Duration::from_secs(60),
            retry: 2,
            retry_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_fresh_data_is_served_from_cache() {
        let cache = QueryCache::new(instant_policy());
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache
                .fetch(QueryKey::Rates, || {
                    calls += 1;
                    Ok(36.5)
                })
                .unwrap();
            assert_eq!(value, 36.5);
        }

        assert_eq!(calls, 1);
        assert!(!cache.needs_refetch(QueryKey::Rates));
    }

    #[test]
    fn test_stale_data_is_refetched() {
        let cache = QueryCache::new(QueryPolicy {
            stale_time: Duration::ZERO,
            ..instant_policy()
        });
        let mut calls = 0;

        for _ in 0..2 {
            cache
                .fetch(QueryKey::Rates, || {
                    calls += 1;
                    Ok(calls)
                })
                .unwrap();
        }

        assert_eq!(calls, 2);
        assert_eq!(cache.data(QueryKey::Rates), Some(2));
    }

    #[test]
    fn test_keys_are_cached_separately() {
        let cache = QueryCache::new(instant_policy());

        cache.fetch(QueryKey::History(7), || Ok(7)).unwrap();
        cache.fetch(QueryKey::History(30), || Ok(30)).unwrap();

        assert_eq!(cache.data(QueryKey::History(7)), Some(7));
        assert_eq!(cache.data(QueryKey::History(30)), Some(30));
    }

    #[test]
    fn test_retries_until_success() {
        let cache = QueryCache::new(instant_policy());
        let mut attempts = 0;

        let value = cache
            .fetch(QueryKey::Rates, || {
                attempts += 1;
                if attempts < 3 {
                    Err(anyhow!("timeout"))
                } else {
                    Ok(40.0)
                }
            })
            .unwrap();

        assert_eq!(value, 40.0);
        assert_eq!(attempts, 3);
        assert!(cache.error(QueryKey::Rates).is_none());
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let policy = QueryPolicy {
            stale_time: Duration::ZERO,
            ..instant_policy()
        };
        let cache = QueryCache::new(policy.clone());

        cache.fetch(QueryKey::Rates, || Ok(36.5)).unwrap();

        let mut attempts = 0;
        let result = cache.fetch(QueryKey::Rates, || {
            attempts += 1;
            Err::<f64, _>(anyhow!("connection refused"))
        });

        assert!(result.is_err());
        assert_eq!(attempts, 1 + policy.retry);
        assert_eq!(cache.data(QueryKey::Rates), Some(36.5));
        assert!(cache.error(QueryKey::Rates).unwrap().contains("connection refused"));
    }

    #[test]
    fn test_needs_refetch() {
        let cache: QueryCache<f64> = QueryCache::new(instant_policy());
        assert!(cache.needs_refetch(QueryKey::Rates));

        cache.fetch(QueryKey::Rates, || Ok(1.0)).unwrap();
        assert!(!cache.needs_refetch(QueryKey::Rates));

        let polling_now = QueryCache::new(QueryPolicy {
            refetch_interval: Some(Duration::ZERO),
            ..instant_policy()
        });
        polling_now.fetch(QueryKey::Rates, || Ok(1.0)).unwrap();
        assert!(polling_now.needs_refetch(QueryKey::Rates));

        let on_demand = QueryCache::new(QueryPolicy {
            refetch_interval: None,
            ..instant_policy()
        });
        on_demand.fetch(QueryKey::Rates, || Ok(1.0)).unwrap();
        assert!(!on_demand.needs_refetch(QueryKey::Rates));
    }

    #[test]
    fn test_failed_fetch_waits_for_next_interval() {
        let cache: QueryCache<f64> = QueryCache::new(instant_policy());

        let result = cache.fetch(QueryKey::Rates, || Err(anyhow!("offline")));
        assert!(result.is_err());

        let entry = cache.entry(QueryKey::Rates).unwrap();
        assert!(entry.updated_at.is_none());
        assert!(entry.last_attempt.is_some());
        assert!(!cache.needs_refetch(QueryKey::Rates));
    }

    #[test]
    fn test_begin_blocks_concurrent_fetch() {
        let cache: QueryCache<f64> = QueryCache::new(instant_policy());

        assert!(cache.begin(QueryKey::Rates));
        assert!(!cache.begin(QueryKey::Rates));
        assert!(cache.is_fetching(QueryKey::Rates));
        assert!(!cache.needs_refetch(QueryKey::Rates));

        cache.resolve(QueryKey::Rates, Ok(36.5)).unwrap();
        assert!(!cache.is_fetching(QueryKey::Rates));
        assert_eq!(cache.fresh_data(QueryKey::Rates), Some(36.5));
    }

    #[test]
    fn test_invalidate_forces_fetch() {
        let cache = QueryCache::new(instant_policy());
        let mut calls = 0;

        cache.fetch(QueryKey::Rates, || { calls += 1; Ok(1) }).unwrap();
        cache.invalidate(QueryKey::Rates);
        assert!(cache.needs_refetch(QueryKey::Rates));
        cache.fetch(QueryKey::Rates, || { calls += 1; Ok(2) }).unwrap();

        assert_eq!(calls, 2);
    }

    #[test]
    fn test_idle_entries_expire() {
        let cache = QueryCache::new(QueryPolicy {
            gc_time: Duration::from_millis(50),
            ..instant_policy()
        });
        cache.fetch(QueryKey::History(90), || Ok(1)).unwrap();

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.data(QueryKey::History(90)), None);
        assert!(cache.needs_refetch(QueryKey::History(90)));
    }

    #[test]
    fn test_reading_keeps_entry_alive() {
        let cache = QueryCache::new(QueryPolicy {
            gc_time: Duration::from_millis(400),
            ..instant_policy()
        });
        cache.fetch(QueryKey::History(7), || Ok(7)).unwrap();

        for _ in 0..8 {
            std::thread::sleep(Duration::from_millis(100));
            assert_eq!(cache.data(QueryKey::History(7)), Some(7));
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = QueryPolicy::rates();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(10), MAX_RETRY_DELAY);
        assert_eq!(policy.backoff(40), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_default_policies() {
        assert_eq!(QueryPolicy::rates().refetch_interval, Some(Duration::from_secs(60)));
        assert_eq!(QueryPolicy::rates().retry, 3);
        assert_eq!(QueryPolicy::history().stale_time, Duration::from_secs(300));
        assert_eq!(QueryPolicy::history().retry, 2);
    }
}
