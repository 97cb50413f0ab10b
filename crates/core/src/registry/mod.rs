use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::domain::{ChainId, Pool};
use crate::resilience::Resilience;
use crate::Result;

/// Pool discovery collaborator; typically backed by DEX APIs or subgraphs
#[async_trait]
pub trait PoolDiscovery: Send + Sync {
    /// Lists candidate pools for a chain
    async fn fetch_pools(&self, chain: ChainId) -> Result<Vec<Pool>>;
}

/// Registry tuning
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a fetched pool list stays fresh
    pub ttl: Duration,

    /// Pools below this USD liquidity are discarded on ingest
    pub min_liquidity_usd: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            min_liquidity_usd: 10_000.0,
        }
    }
}

/// Caching front for pool discovery.
///
/// Serves validated pool lists per chain from a TTL cache; on a miss it
/// fetches through the resilience layer and filters out structurally
/// invalid or thin pools, keeping the ones that passed. A failed refresh
/// propagates without producing a half-filled entry.
pub struct PoolRegistry {
    discovery: Arc<dyn PoolDiscovery>,
    resilience: Arc<Resilience>,
    cache: TtlCache<ChainId, Arc<Vec<Pool>>>,
    config: RegistryConfig,
}

impl PoolRegistry {
    /// Creates a registry over the given discovery collaborator
    pub fn new(
        discovery: Arc<dyn PoolDiscovery>,
        resilience: Arc<Resilience>,
        config: RegistryConfig,
    ) -> Self {
        let cache = TtlCache::new(config.ttl);
        Self {
            discovery,
            resilience,
            cache,
            config,
        }
    }

    /// Validated pools for a chain, served from cache within the TTL
    pub async fn pools(&self, chain: ChainId) -> Result<Arc<Vec<Pool>>> {
        if let Some(cached) = self.cache.get(&chain) {
            debug!("Pool cache hit for {} ({} pools)", chain, cached.len());
            return Ok(cached);
        }

        let dependency = Resilience::key("pool-discovery", chain);
        let discovery = self.discovery.clone();
        let fetched = self
            .resilience
            .call(&dependency, "fetch_pools", move || {
                let discovery = discovery.clone();
                async move { discovery.fetch_pools(chain).await }
            })
            .await?;

        let total = fetched.len();
        let mut valid = Vec::with_capacity(total);
        let mut dropped_invalid = 0usize;
        let mut dropped_thin = 0usize;

        for pool in fetched {
            if pool.chain != chain {
                dropped_invalid += 1;
                debug!("Discarding pool {}: reported for wrong chain", pool.id);
                continue;
            }
            match pool.validate() {
                Err(err) => {
                    dropped_invalid += 1;
                    debug!("Discarding pool {}: {}", pool.id, err);
                }
                Ok(()) if pool.liquidity_usd < self.config.min_liquidity_usd => {
                    dropped_thin += 1;
                }
                Ok(()) => valid.push(pool),
            }
        }

        if dropped_invalid + dropped_thin > 0 {
            debug!(
                "Discarded {} invalid and {} thin pools out of {} on {}",
                dropped_invalid, dropped_thin, total, chain
            );
        }
        info!("Registered {} pools for {}", valid.len(), chain.name());

        let pools = Arc::new(valid);
        self.cache.insert(chain, pools.clone());
        Ok(pools)
    }

    /// Drops the cached pool list for a chain
    pub fn invalidate(&self, chain: ChainId) {
        self.cache.invalidate(&chain);
    }

    /// Minimum liquidity applied on ingest
    pub fn min_liquidity_usd(&self) -> f64 {
        self.config.min_liquidity_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PoolId, ProtocolVersion, TokenId};
    use crate::resilience::{ResilienceConfig, RetryPolicy};
    use crate::{Error, ErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_test_pool(id: &str, liquidity_usd: f64) -> Pool {
        Pool {
            id: PoolId::new(id),
            chain: ChainId::Polygon,
            dex: "quickswap".into(),
            version: ProtocolVersion::V2,
            token0: TokenId::new("0xaaa"),
            token1: TokenId::new("0xbbb"),
            reserve0: 1_000_000.0,
            reserve1: 1_000_000.0,
            fee_pct: 0.3,
            liquidity_usd,
        }
    }

    struct FakeDiscovery {
        pools: Vec<Pool>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeDiscovery {
        fn serving(pools: Vec<Pool>) -> Arc<Self> {
            Arc::new(Self {
                pools,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                pools: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PoolDiscovery for FakeDiscovery {
        async fn fetch_pools(&self, _chain: ChainId) -> Result<Vec<Pool>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::dependency(
                    "pool-discovery:polygon",
                    ErrorKind::Network,
                    "subgraph unreachable",
                ));
            }
            Ok(self.pools.clone())
        }
    }

    fn quick_resilience() -> Arc<Resilience> {
        Arc::new(Resilience::new(ResilienceConfig {
            retry: RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                jitter: 0.0,
                ..RetryPolicy::default()
            },
            ..ResilienceConfig::default()
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_filters_invalid_and_thin_pools() {
        let mut drained = create_test_pool("0xdrained", 500_000.0);
        drained.reserve0 = 0.0;
        let discovery = FakeDiscovery::serving(vec![
            create_test_pool("0xdeep", 500_000.0),
            create_test_pool("0xthin", 1_000.0),
            drained,
        ]);
        let registry = PoolRegistry::new(
            discovery.clone(),
            quick_resilience(),
            RegistryConfig::default(),
        );

        let pools = registry.pools(ChainId::Polygon).await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, PoolId::new("0xdeep"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_discovery() {
        let discovery = FakeDiscovery::serving(vec![create_test_pool("0xdeep", 500_000.0)]);
        let registry = PoolRegistry::new(
            discovery.clone(),
            quick_resilience(),
            RegistryConfig::default(),
        );

        registry.pools(ChainId::Polygon).await.unwrap();
        registry.pools(ChainId::Polygon).await.unwrap();
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 1);

        registry.invalidate(ChainId::Polygon);
        registry.pools(ChainId::Polygon).await.unwrap();
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches() {
        let discovery = FakeDiscovery::serving(vec![create_test_pool("0xdeep", 500_000.0)]);
        let registry = PoolRegistry::new(
            discovery.clone(),
            quick_resilience(),
            RegistryConfig {
                ttl: Duration::ZERO,
                ..RegistryConfig::default()
            },
        );

        registry.pools(ChainId::Polygon).await.unwrap();
        registry.pools(ChainId::Polygon).await.unwrap();
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_propagates() {
        let registry = PoolRegistry::new(
            FakeDiscovery::failing(),
            quick_resilience(),
            RegistryConfig::default(),
        );

        let result = registry.pools(ChainId::Polygon).await;
        assert!(matches!(result, Err(Error::RetriesExhausted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_market_is_cached_ok() {
        let discovery = FakeDiscovery::serving(Vec::new());
        let registry = PoolRegistry::new(
            discovery.clone(),
            quick_resilience(),
            RegistryConfig::default(),
        );

        let pools = registry.pools(ChainId::Polygon).await.unwrap();
        assert!(pools.is_empty());
        registry.pools(ChainId::Polygon).await.unwrap();
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 1);
    }
}
