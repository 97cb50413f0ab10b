pub mod breaker;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CallPermit, CircuitBreaker};
pub use retry::RetryPolicy;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::domain::ChainId;
use crate::{Error, ErrorKind, Result};

/// Resilience tuning: crate-wide defaults plus per-dependency overrides
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    /// Breaker applied to dependencies without an override
    pub breaker: BreakerConfig,

    /// Retry policy applied to dependencies without an override
    pub retry: RetryPolicy,

    /// Breaker overrides keyed by dependency name
    pub breaker_overrides: HashMap<String, BreakerConfig>,

    /// Retry overrides keyed by dependency name
    pub retry_overrides: HashMap<String, RetryPolicy>,
}

/// Guards every external dependency call.
///
/// Each dependency key gets its own circuit breaker, lazily created. A call
/// runs behind the breaker gate, a per-attempt timeout, and a jittered
/// exponential retry loop that only re-attempts structurally retryable
/// failures.
pub struct Resilience {
    config: ResilienceConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl Resilience {
    /// Creates a resilience layer with the given tuning
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Canonical dependency key for a service on a chain
    pub fn key(service: &str, chain: ChainId) -> String {
        format!("{}:{}", service, chain)
    }

    fn breaker_for(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(dependency) {
            return existing.clone();
        }
        let config = self
            .config
            .breaker_overrides
            .get(dependency)
            .cloned()
            .unwrap_or_else(|| self.config.breaker.clone());
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(dependency, config)))
            .clone()
    }

    fn policy_for(&self, dependency: &str) -> RetryPolicy {
        self.config
            .retry_overrides
            .get(dependency)
            .cloned()
            .unwrap_or_else(|| self.config.retry.clone())
    }

    /// Runs a dependency call under breaker, timeout and retry control.
    ///
    /// `call_fn` is invoked once per attempt. Breaker rejections propagate
    /// immediately; non-retryable failures return after the first attempt;
    /// exhausted retries wrap the last failure with call context.
    pub async fn call<T, F, Fut>(&self, dependency: &str, operation: &str, mut call_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breaker_for(dependency);
        let policy = self.policy_for(dependency);
        let total = policy.total_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let permit = breaker.try_acquire()?;

            let outcome = match tokio::time::timeout(policy.call_timeout, call_fn()).await {
                Ok(Ok(value)) => {
                    permit.success();
                    if attempt > 1 {
                        debug!(
                            "'{}' via '{}' recovered on attempt {}",
                            operation, dependency, attempt
                        );
                    }
                    return Ok(value);
                }
                Ok(Err(err)) => err,
                Err(_) => Error::dependency(
                    dependency,
                    ErrorKind::Timeout,
                    format!("'{}' exceeded {:?}", operation, policy.call_timeout),
                ),
            };

            permit.failure();

            if !outcome.is_retryable() {
                warn!(
                    "'{}' via '{}' failed, not retryable: {}",
                    operation, dependency, outcome
                );
                return Err(outcome);
            }

            if attempt >= total {
                warn!(
                    "'{}' via '{}' exhausted {} attempts: {}",
                    operation, dependency, attempt, outcome
                );
                return Err(Error::RetriesExhausted {
                    operation: operation.to_string(),
                    dependency: dependency.to_string(),
                    attempts: attempt,
                    source: Box::new(outcome),
                });
            }

            let delay = policy.delay_for(attempt);
            debug!(
                "Retrying '{}' via '{}' in {:?} (attempt {}/{})",
                operation, dependency, delay, attempt, total
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Runs a dependency call under breaker and timeout control, exactly
    /// once.
    ///
    /// For non-idempotent calls whose effects may have landed despite a
    /// transport failure, such as transaction submission: a timeout after
    /// broadcast must not be answered by sending again, so the error
    /// propagates to the caller to resolve instead of being retried.
    pub async fn call_once<T, F, Fut>(
        &self,
        dependency: &str,
        operation: &str,
        call_fn: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breaker_for(dependency);
        let policy = self.policy_for(dependency);
        let permit = breaker.try_acquire()?;

        match tokio::time::timeout(policy.call_timeout, call_fn()).await {
            Ok(Ok(value)) => {
                permit.success();
                Ok(value)
            }
            Ok(Err(err)) => {
                permit.failure();
                warn!("'{}' via '{}' failed: {}", operation, dependency, err);
                Err(err)
            }
            Err(_) => {
                permit.failure();
                Err(Error::dependency(
                    dependency,
                    ErrorKind::Timeout,
                    format!("'{}' exceeded {:?}", operation, policy.call_timeout),
                ))
            }
        }
    }

    /// Diagnostic view of one dependency's breaker, if it exists yet
    pub fn breaker_snapshot(&self, dependency: &str) -> Option<BreakerSnapshot> {
        self.breakers.get(dependency).map(|b| b.snapshot())
    }

    /// Diagnostic view of every breaker created so far
    pub fn breaker_snapshots(&self) -> Vec<(String, BreakerSnapshot)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config() -> ResilienceConfig {
        ResilienceConfig {
            breaker: BreakerConfig {
                failure_threshold: 10,
                reset_timeout: Duration::from_secs(5),
                success_threshold: 1,
            },
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(100),
                multiplier: 2.0,
                jitter: 0.0,
                call_timeout: Duration::from_secs(1),
            },
            ..ResilienceConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through_once() {
        let resilience = Resilience::new(fast_config());
        let calls = AtomicU32::new(0);

        let value = resilience
            .call("gas-oracle:base", "estimate", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(7u64)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_retried_to_success() {
        let resilience = Resilience::new(fast_config());
        let calls = AtomicU32::new(0);

        let value = resilience
            .call("price-oracle:polygon", "native_price_usd", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::dependency(
                        "price-oracle:polygon",
                        ErrorKind::Network,
                        "connection reset",
                    ))
                } else {
                    Ok(0.72)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 0.72);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_on_first_attempt() {
        let resilience = Resilience::new(fast_config());
        let calls = AtomicU32::new(0);

        let result: Result<()> = resilience
            .call("settlement:evm:ethereum", "submit", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::dependency(
                    "settlement:evm:ethereum",
                    ErrorKind::InsufficientFunds,
                    "balance too low",
                ))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(Error::Dependency {
                kind: ErrorKind::InsufficientFunds,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_context() {
        let resilience = Resilience::new(fast_config());
        let calls = AtomicU32::new(0);

        let result: Result<()> = resilience
            .call("pool-discovery:arbitrum", "fetch_pools", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::dependency(
                    "pool-discovery:arbitrum",
                    ErrorKind::Unavailable,
                    "subgraph lagging",
                ))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(Error::RetriesExhausted {
                operation,
                dependency,
                attempts,
                source,
            }) => {
                assert_eq!(operation, "fetch_pools");
                assert_eq!(dependency, "pool-discovery:arbitrum");
                assert_eq!(attempts, 4);
                assert_eq!(source.kind(), Some(ErrorKind::Unavailable));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits_without_calling() {
        let mut config = fast_config();
        config.breaker.failure_threshold = 2;
        let resilience = Resilience::new(config);
        let calls = AtomicU32::new(0);

        // Two failed attempts trip the breaker mid-loop, the third attempt
        // is rejected at the gate
        let result: Result<()> = resilience
            .call("gas-oracle:solana", "estimate", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::dependency(
                    "gas-oracle:solana",
                    ErrorKind::Network,
                    "rpc down",
                ))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(result, Err(Error::CircuitOpen { .. })));

        // Later calls fail fast without touching the dependency
        let result: Result<()> = resilience
            .call("gas-oracle:solana", "estimate", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(result, Err(Error::CircuitOpen { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_classified_and_retried() {
        let mut config = fast_config();
        config.retry.max_retries = 1;
        config.retry.call_timeout = Duration::from_millis(50);
        let resilience = Resilience::new(config);
        let calls = AtomicU32::new(0);

        let result: Result<()> = resilience
            .call("pool-discovery:base", "fetch_pools", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result {
            Err(Error::RetriesExhausted { source, .. }) => {
                assert_eq!(source.kind(), Some(ErrorKind::Timeout));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_does_not_wedge_breaker() {
        let mut config = fast_config();
        config.breaker.failure_threshold = 1;
        config.retry.max_retries = 0;
        let resilience = Resilience::new(config);

        // Trip the breaker, then wait out the reset timeout
        let _: Result<()> = resilience
            .call("gas-oracle:base", "estimate", || async {
                Err(Error::dependency(
                    "gas-oracle:base",
                    ErrorKind::Network,
                    "rpc down",
                ))
            })
            .await;
        tokio::time::advance(Duration::from_secs(5)).await;

        // An outer deadline drops the probe call before it reports
        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            resilience.call("gas-oracle:base", "estimate", || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, Error>(0u64)
            }),
        )
        .await;
        assert!(cancelled.is_err());

        // The probe slot was released with the dropped future; the next
        // caller probes and succeeds
        let value = resilience
            .call("gas-oracle:base", "estimate", || async { Ok::<_, Error>(7u64) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_once_never_reattempts() {
        let resilience = Resilience::new(fast_config());
        let calls = AtomicU32::new(0);

        let result: Result<()> = resilience
            .call_once("settlement:evm:polygon", "submit_batch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::dependency(
                    "settlement:evm:polygon",
                    ErrorKind::Network,
                    "connection reset",
                ))
            })
            .await;

        // Retryable or not, a single-shot call is never re-invoked
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(Error::Dependency {
                kind: ErrorKind::Network,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_dependency_retry_override() {
        let mut config = fast_config();
        config.retry_overrides.insert(
            "settlement:evm:base".into(),
            RetryPolicy {
                max_retries: 0,
                ..config.retry.clone()
            },
        );
        let resilience = Resilience::new(config);
        let calls = AtomicU32::new(0);

        let result: Result<()> = resilience
            .call("settlement:evm:base", "submit", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::dependency(
                    "settlement:evm:base",
                    ErrorKind::Network,
                    "flaky",
                ))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::RetriesExhausted { .. })));
    }
}
