use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::domain::{Pool, PoolId, TokenId};
use crate::{Error, Result};

/// Swap outcome estimate for a single pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapQuote {
    /// Estimated output, USD terms
    pub amount_out: f64,

    /// Price impact of the swap, percent
    pub price_impact_pct: f64,

    /// Pool fee taken, USD
    pub fee_usd: f64,

    /// Input after the fee, USD terms
    pub effective_in: f64,
}

/// Swap estimation seam.
///
/// The shipped implementation is a deliberately simplified economic model;
/// real AMM math (concentrated-liquidity curves, stable invariants) slots
/// in behind this trait without touching the search or ranking code.
/// Output is an estimate, not an execution guarantee.
pub trait SwapEstimator: Send + Sync {
    /// Estimates swapping `amount_in` of `token_in` through `pool`
    fn estimate(&self, pool: &Pool, token_in: &TokenId, amount_in: f64) -> Result<SwapQuote>;
}

/// Cache key; the amount is quantized to micro-units so float inputs
/// hash deterministically
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QuoteKey {
    pool: PoolId,
    token_in: TokenId,
    amount_micros: u64,
}

impl QuoteKey {
    fn new(pool: &Pool, token_in: &TokenId, amount_in: f64) -> Self {
        Self {
            pool: pool.id.clone(),
            token_in: token_in.clone(),
            amount_micros: (amount_in * 1e6).round() as u64,
        }
    }
}

/// Constant-product-style estimator with quote caching.
///
/// effective = in × (1 − fee), impact = min(effective / liquidity × 100,
/// cap), out = effective × rate × (1 − impact / 100).
pub struct ConstantProductEstimator {
    max_price_impact_pct: f64,
    cache: TtlCache<QuoteKey, SwapQuote>,
}

impl ConstantProductEstimator {
    /// Creates an estimator with the given impact cap and quote TTL
    pub fn new(max_price_impact_pct: f64, quote_ttl: Duration) -> Self {
        Self {
            max_price_impact_pct,
            cache: TtlCache::new(quote_ttl),
        }
    }
}

impl Default for ConstantProductEstimator {
    fn default() -> Self {
        Self::new(5.0, Duration::from_secs(10))
    }
}

impl SwapEstimator for ConstantProductEstimator {
    fn estimate(&self, pool: &Pool, token_in: &TokenId, amount_in: f64) -> Result<SwapQuote> {
        if amount_in <= 0.0 || !amount_in.is_finite() {
            return Err(Error::InvalidRequest(format!(
                "swap amount must be positive, got {}",
                amount_in
            )));
        }

        let key = QuoteKey::new(pool, token_in, amount_in);
        if let Some(quote) = self.cache.get(&key) {
            return Ok(quote);
        }

        let base_rate = pool.base_rate(token_in).ok_or_else(|| {
            Error::Validation(format!("token {} is not in pool {}", token_in, pool.id))
        })?;
        if pool.liquidity_usd <= 0.0 {
            return Err(Error::Validation(format!(
                "pool {} has no liquidity",
                pool.id
            )));
        }

        let effective_in = amount_in * (1.0 - pool.fee_pct / 100.0);
        let price_impact_pct =
            (effective_in / pool.liquidity_usd * 100.0).min(self.max_price_impact_pct);
        let amount_out = effective_in * base_rate * (1.0 - price_impact_pct / 100.0);

        let quote = SwapQuote {
            amount_out,
            price_impact_pct,
            fee_usd: amount_in - effective_in,
            effective_in,
        };
        self.cache.insert(key, quote);
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainId, ProtocolVersion};

    fn create_test_pool(liquidity_usd: f64, fee_pct: f64, rate: f64) -> Pool {
        Pool {
            id: PoolId::new("0xpool"),
            chain: ChainId::Ethereum,
            dex: "uniswap".into(),
            version: ProtocolVersion::V2,
            token0: TokenId::new("0xaaa"),
            token1: TokenId::new("0xbbb"),
            reserve0: 1_000_000.0,
            reserve1: 1_000_000.0 * rate,
            fee_pct,
            liquidity_usd,
        }
    }

    #[test]
    fn test_effective_input_and_impact() {
        // 0.3% fee on a $1M pool with $10k in: $9,970 effective, 0.997% impact
        let estimator = ConstantProductEstimator::default();
        let pool = create_test_pool(1_000_000.0, 0.3, 1.0);

        let quote = estimator
            .estimate(&pool, &TokenId::new("0xaaa"), 10_000.0)
            .unwrap();

        assert!((quote.effective_in - 9_970.0).abs() < 1e-9);
        assert!((quote.price_impact_pct - 0.997).abs() < 1e-9);
        assert!((quote.fee_usd - 30.0).abs() < 1e-9);
        let expected_out = 9_970.0 * (1.0 - 0.997 / 100.0);
        assert!((quote.amount_out - expected_out).abs() < 1e-6);
        assert!(quote.price_impact_pct < 5.0);
    }

    #[test]
    fn test_impact_capped() {
        let estimator = ConstantProductEstimator::default();
        let pool = create_test_pool(20_000.0, 0.3, 1.0);

        let quote = estimator
            .estimate(&pool, &TokenId::new("0xaaa"), 10_000.0)
            .unwrap();
        assert_eq!(quote.price_impact_pct, 5.0);
    }

    #[test]
    fn test_rate_applied_in_direction() {
        let estimator = ConstantProductEstimator::new(5.0, Duration::ZERO);
        let pool = create_test_pool(1_000_000.0, 0.0, 2.0);

        let forward = estimator
            .estimate(&pool, &TokenId::new("0xaaa"), 100.0)
            .unwrap();
        let back = estimator
            .estimate(&pool, &TokenId::new("0xbbb"), 100.0)
            .unwrap();

        assert!(forward.amount_out > 190.0);
        assert!(back.amount_out < 51.0);
    }

    #[test]
    fn test_cache_hit_bypasses_recomputation() {
        let estimator = ConstantProductEstimator::default();
        let pool = create_test_pool(1_000_000.0, 0.3, 1.0);

        let first = estimator
            .estimate(&pool, &TokenId::new("0xaaa"), 10_000.0)
            .unwrap();

        // Same key, different reserves: a fresh cache entry would change the
        // rate, a hit returns the original quote
        let mut shifted = pool.clone();
        shifted.reserve1 = 3_000_000.0;
        let second = estimator
            .estimate(&shifted, &TokenId::new("0xaaa"), 10_000.0)
            .unwrap();
        assert_eq!(first.amount_out, second.amount_out);

        // With a zero TTL the shifted reserves show through
        let uncached = ConstantProductEstimator::new(5.0, Duration::ZERO);
        let recomputed = uncached
            .estimate(&shifted, &TokenId::new("0xaaa"), 10_000.0)
            .unwrap();
        assert!(recomputed.amount_out > second.amount_out * 2.5);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let estimator = ConstantProductEstimator::default();
        let pool = create_test_pool(1_000_000.0, 0.3, 1.0);

        assert!(matches!(
            estimator.estimate(&pool, &TokenId::new("0xaaa"), 0.0),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            estimator.estimate(&pool, &TokenId::new("0xaaa"), -5.0),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            estimator.estimate(&pool, &TokenId::new("0xccc"), 100.0),
            Err(Error::Validation(_))
        ));
    }
}
