use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;
use tracing::error;

use crate::bucket::TokenBucket;
use crate::error::LimitError;
use crate::error::Result;
use crate::registry::BucketRegistry;

/// Per-exchange admission façade
///
/// Resolves an endpoint-limit selector `K` to a bucket and a weight through a
/// route table fixed at construction, then blocks on that bucket until the
/// full weight is admitted. The limiter holds no global lock; calls routed to
/// different buckets never contend with each other.
///
/// One limiter is built per exchange-client instance and shared by reference
/// (or `Arc`) across its call sites. There is deliberately no process-wide
/// instance, so independent clients never share bucket state.
#[derive(Debug)]
pub struct Limiter<K> {
    routes: HashMap<K, Route>,
    registry: BucketRegistry,
}

/// A selector's resolved cost: which bucket slot it draws from and how much
#[derive(Debug)]
struct Route {
    bucket: usize,
    weight: u32,
}

impl<K: Eq + Hash + Copy + Debug> Limiter<K> {
    /// Create a new limiter builder
    pub fn builder() -> LimiterBuilder<K> {
        LimiterBuilder::new()
    }

    /// Admit one call classed as `key`, waiting for budget as long as it takes
    ///
    /// Returns `Ok` only after the route's full weight has been admitted;
    /// admission is never partial. Dropping the future cancels the wait
    /// without consuming anything.
    pub async fn limit(&self, key: K) -> Result<()> {
        let route = self.route(key)?;
        self.registry.get(route.bucket).acquire(route.weight).await
    }

    /// Admit one call classed as `key`, or fail once `deadline` passes
    ///
    /// An already-elapsed deadline returns [`LimitError::DeadlineExceeded`]
    /// immediately without consuming budget. This is the only call-time error
    /// the limiter produces for factory-built route tables.
    pub async fn limit_until(&self, key: K, deadline: Instant) -> Result<()> {
        let route = self.route(key)?;
        self.registry.get(route.bucket).acquire_until(route.weight, deadline).await
    }

    /// Non-blocking probe: admit `key` now or return [`LimitError::Exhausted`]
    pub fn try_limit(&self, key: K) -> Result<()> {
        let route = self.route(key)?;
        self.registry.get(route.bucket).try_acquire(route.weight)
    }

    /// Whole tokens currently available in the bucket behind `key`
    pub fn available(&self, key: K) -> Result<u32> {
        let route = self.route(key)?;
        Ok(self.registry.get(route.bucket).available())
    }

    /// Capacity of the bucket behind `key`
    pub fn capacity(&self, key: K) -> Result<u32> {
        let route = self.route(key)?;
        Ok(self.registry.get(route.bucket).capacity())
    }

    /// Reset every bucket to full capacity
    pub fn reset(&self) {
        self.registry.reset_all();
    }

    fn route(&self, key: K) -> Result<&Route> {
        match self.routes.get(&key) {
            Some(route) => Ok(route),
            None => {
                // Unreachable when every selector variant was routed at
                // construction; never silently admit a mis-costed call
                error!(selector = ?key, "selector has no rate definition route");
                Err(LimitError::InvalidConfig("selector has no rate definition route"))
            }
        }
    }
}

/// Builder wiring buckets and selector routes for one exchange
///
/// All configuration validation happens in [`build`](LimiterBuilder::build):
/// an invalid schedule yields an error instead of a usable limiter.
pub struct LimiterBuilder<K> {
    buckets: Vec<(&'static str, u32, Duration)>,
    routes: Vec<(K, &'static str, u32)>,
}

impl<K: Eq + Hash + Copy + Debug> LimiterBuilder<K> {
    /// Create a new builder
    pub fn new() -> Self {
        Self { buckets: Vec::new(), routes: Vec::new() }
    }

    /// Declare a named bucket replenishing `capacity` tokens per `window`
    pub fn bucket(mut self, name: &'static str, capacity: u32, window: Duration) -> Self {
        self.buckets.push((name, capacity, window));
        self
    }

    /// Route selector `key` to `weight` units of the named bucket
    pub fn route(mut self, key: K, bucket: &'static str, weight: u32) -> Self {
        self.routes.push((key, bucket, weight));
        self
    }

    /// Build the limiter, validating the whole schedule
    ///
    /// Rejected configurations: zero or oversized bucket capacity, zero
    /// refill window, a window so long the refill rate truncates to zero,
    /// duplicate bucket names, routes to undeclared buckets, duplicate routes
    /// for one selector, zero route weight, and a route weight above its
    /// bucket's capacity (which could never be admitted).
    pub fn build(self) -> Result<Limiter<K>> {
        let mut registry = BucketRegistry::new();
        for (name, capacity, window) in self.buckets {
            registry.insert(name, TokenBucket::new(capacity, window)?)?;
        }

        if registry.is_empty() {
            return Err(LimitError::InvalidConfig("limiter has no buckets"));
        }

        let mut routes = HashMap::new();
        for (key, bucket_name, weight) in self.routes {
            let Some(slot) = registry.index_of(bucket_name) else {
                return Err(LimitError::InvalidConfig("route targets an undeclared bucket"));
            };
            if weight == 0 {
                return Err(LimitError::InvalidConfig("route weight must be non-zero"));
            }
            if weight > registry.get(slot).capacity() {
                return Err(LimitError::InvalidConfig("route weight exceeds bucket capacity"));
            }
            if routes.insert(key, Route { bucket: slot, weight }).is_some() {
                return Err(LimitError::InvalidConfig("duplicate route for selector"));
            }
        }

        if routes.is_empty() {
            return Err(LimitError::InvalidConfig("limiter has no routes"));
        }

        Ok(Limiter { routes, registry })
    }
}

impl<K: Eq + Hash + Copy + Debug> Default for LimiterBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestLimit {
        Cheap,
        Heavy,
        Order,
    }

    fn test_limiter() -> Limiter<TestLimit> {
        Limiter::builder()
            .bucket("weight", 100, Duration::from_secs(1))
            .bucket("orders", 10, Duration::from_secs(1))
            .route(TestLimit::Cheap, "weight", 1)
            .route(TestLimit::Heavy, "weight", 50)
            .route(TestLimit::Order, "orders", 1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_try_limit_consumes_route_weight() {
        let limiter = test_limiter();

        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());
        assert_eq!(limiter.available(TestLimit::Heavy).unwrap(), 50);

        // Separate bucket untouched
        assert_eq!(limiter.available(TestLimit::Order).unwrap(), 10);
    }

    #[test]
    fn test_try_limit_exhausted() {
        let limiter = test_limiter();

        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());
        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());
        assert_eq!(limiter.try_limit(TestLimit::Heavy), Err(LimitError::Exhausted));
    }

    #[test]
    fn test_reset_restores_all_buckets() {
        let limiter = test_limiter();

        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());
        assert!(limiter.try_limit(TestLimit::Order).is_ok());

        limiter.reset();
        assert_eq!(limiter.available(TestLimit::Heavy).unwrap(), 100);
        assert_eq!(limiter.available(TestLimit::Order).unwrap(), 10);
    }

    #[test]
    fn test_capacity_lookup() {
        let limiter = test_limiter();

        assert_eq!(limiter.capacity(TestLimit::Cheap).unwrap(), 100);
        assert_eq!(limiter.capacity(TestLimit::Order).unwrap(), 10);
    }

    #[test]
    fn test_unrouted_selector_is_config_error() {
        let limiter = Limiter::builder()
            .bucket("weight", 100, Duration::from_secs(1))
            .route(TestLimit::Cheap, "weight", 1)
            .build()
            .unwrap();

        assert!(matches!(limiter.try_limit(TestLimit::Heavy), Err(LimitError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_undeclared_bucket() {
        let err = Limiter::builder()
            .bucket("weight", 100, Duration::from_secs(1))
            .route(TestLimit::Cheap, "orders", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, LimitError::InvalidConfig(_)));
    }

    #[test]
    fn test_build_rejects_weight_above_capacity() {
        let err = Limiter::builder()
            .bucket("weight", 40, Duration::from_secs(1))
            .route(TestLimit::Heavy, "weight", 50)
            .build()
            .unwrap_err();
        assert_eq!(err, LimitError::InvalidConfig("route weight exceeds bucket capacity"));
    }

    #[test]
    fn test_build_rejects_duplicate_bucket() {
        let err = Limiter::builder()
            .bucket("weight", 100, Duration::from_secs(1))
            .bucket("weight", 10, Duration::from_secs(1))
            .route(TestLimit::Cheap, "weight", 1)
            .build()
            .unwrap_err();
        assert_eq!(err, LimitError::InvalidConfig("duplicate bucket name"));
    }

    #[test]
    fn test_build_rejects_duplicate_route() {
        let err = Limiter::builder()
            .bucket("weight", 100, Duration::from_secs(1))
            .route(TestLimit::Cheap, "weight", 1)
            .route(TestLimit::Cheap, "weight", 2)
            .build()
            .unwrap_err();
        assert_eq!(err, LimitError::InvalidConfig("duplicate route for selector"));
    }

    #[test]
    fn test_build_rejects_zero_weight_route() {
        let err = Limiter::builder()
            .bucket("weight", 100, Duration::from_secs(1))
            .route(TestLimit::Cheap, "weight", 0)
            .build()
            .unwrap_err();
        assert_eq!(err, LimitError::InvalidConfig("route weight must be non-zero"));
    }

    #[test]
    fn test_build_rejects_empty_schedule() {
        let err = LimiterBuilder::<TestLimit>::new().build().unwrap_err();
        assert_eq!(err, LimitError::InvalidConfig("limiter has no buckets"));
    }

    #[test]
    fn test_build_rejects_unrepresentable_refill_rate() {
        // One token per hour truncates below the fixed-point resolution; once
        // drained such a bucket would never refill and waiters would hang
        let err = Limiter::builder()
            .bucket("glacial", 1, Duration::from_secs(3600))
            .route(TestLimit::Cheap, "glacial", 1)
            .build()
            .unwrap_err();
        assert_eq!(err, LimitError::InvalidConfig("bucket refill window too long for capacity"));
    }

    #[test]
    fn test_limiter_debug_format() {
        let limiter = test_limiter();
        let rendered = format!("{limiter:?}");
        assert!(rendered.contains("Limiter"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_waits_for_refill() {
        let limiter = test_limiter();

        // Drain the weight bucket
        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());
        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());

        let start = Instant::now();
        limiter.limit(TestLimit::Heavy).await.unwrap();

        // 50 tokens at 100/s take 500ms to mint
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_until_deadline() {
        let limiter = test_limiter();

        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());
        assert!(limiter.try_limit(TestLimit::Heavy).is_ok());

        let err = limiter.limit_until(TestLimit::Heavy, Instant::now() + Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, LimitError::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_over_admit() {
        use std::sync::Arc;

        let limiter = Arc::new(test_limiter());

        // Ten waiters of weight 50 against a 100-capacity, 1s-window bucket:
        // 500 units total, so the last admission cannot complete before the
        // refill curve has minted 400 more units (4s in)
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.limit(TestLimit::Heavy).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(3900), "elapsed {:?}", start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_limits_always_replenish() {
        let limiter = test_limiter();

        // 40 heavy calls = 2000 units against a 100-capacity bucket; each
        // call waits its turn and the budget always comes back
        for _ in 0..40 {
            limiter.limit(TestLimit::Heavy).await.unwrap();
        }
    }
}
