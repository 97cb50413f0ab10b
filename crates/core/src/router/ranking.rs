use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use super::{CandidateRoute, OptimizedRoute, RouterConfig};
use crate::cache::TtlCache;
use crate::domain::{ChainId, ProtocolVersion};
use crate::oracle::{GasOracle, GasOperation, GasPriority, GasQuote, NativePriceOracle};
use crate::resilience::Resilience;
use crate::Result;

/// Gas charged before any hop executes
const BASE_TX_GAS: u64 = 21_000;

/// Gas shaved off per extra hop; one transaction covers all hops
const MULTI_HOP_DISCOUNT: u64 = 15_000;

/// Base expected slippage for a one-hop route against deep liquidity
const BASE_SLIPPAGE_PCT: f64 = 0.1;

/// Candidates dropped by the pre-scoring filters
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCounts {
    /// Dropped for exceeding the price impact cap
    pub price_impact: usize,

    /// Dropped for touching a pool below the liquidity floor
    pub thin_liquidity: usize,

    /// Dropped for a non-positive net output
    pub unprofitable: usize,
}

impl FilterCounts {
    /// Total candidates removed
    pub fn total(&self) -> usize {
        self.price_impact + self.thin_liquidity + self.unprofitable
    }
}

/// Ranked routes plus what the filters removed
#[derive(Debug)]
pub struct RankOutcome {
    /// Surviving routes, best first
    pub routes: Vec<OptimizedRoute>,

    /// Filter tally for empty-result reporting
    pub filtered: FilterCounts,
}

/// Economic ranking over search candidates.
///
/// Filters candidates against the impact cap and liquidity floor, prices
/// gas through the oracle collaborators (cached, behind the resilience
/// layer), then scores what survives. Ordering is descending by score
/// with a lexicographic DEX-path tie-break so equal-scoring routes rank
/// deterministically.
pub struct RouteRanker {
    gas_oracle: Arc<dyn GasOracle>,
    price_oracle: Arc<dyn NativePriceOracle>,
    resilience: Arc<Resilience>,
    config: RouterConfig,
    gas_cache: TtlCache<(ChainId, GasPriority), GasQuote>,
    price_cache: TtlCache<ChainId, f64>,
}

impl RouteRanker {
    /// Creates a ranker over the given oracle collaborators
    pub fn new(
        gas_oracle: Arc<dyn GasOracle>,
        price_oracle: Arc<dyn NativePriceOracle>,
        resilience: Arc<Resilience>,
        config: RouterConfig,
    ) -> Self {
        let gas_cache = TtlCache::new(config.oracle_ttl);
        let price_cache = TtlCache::new(config.oracle_ttl);
        Self {
            gas_oracle,
            price_oracle,
            resilience,
            config,
            gas_cache,
            price_cache,
        }
    }

    /// Filters, scores and sorts candidates for one chain
    pub async fn rank(
        &self,
        chain: ChainId,
        candidates: Vec<CandidateRoute>,
    ) -> Result<RankOutcome> {
        let mut filtered = FilterCounts::default();
        if candidates.is_empty() {
            return Ok(RankOutcome {
                routes: Vec::new(),
                filtered,
            });
        }

        let gas_quote = self.swap_gas_quote(chain).await?;
        let native_usd = self.native_price(chain).await?;

        let mut routes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate.total_price_impact_pct > self.config.max_price_impact_pct {
                filtered.price_impact += 1;
                continue;
            }
            if candidate.min_liquidity_usd < self.config.min_liquidity_usd {
                filtered.thin_liquidity += 1;
                continue;
            }

            let gas_estimate = route_gas(&candidate);
            let gas_cost_usd = gas_estimate as f64 * gas_quote.gas_price_native * native_usd;
            let net_value = candidate.amount_out - gas_cost_usd - candidate.total_fee_usd;
            if net_value <= 0.0 {
                filtered.unprofitable += 1;
                continue;
            }

            let expected_slippage_pct = self.expected_slippage(&candidate);
            let confidence = self.confidence(&candidate, gas_cost_usd);
            let efficiency_score = efficiency(net_value, &candidate, confidence);
            let estimated_time_ms = estimated_time_ms(chain, candidate.hops());

            routes.push(OptimizedRoute {
                chain,
                amount_in: candidate.amount_in,
                amount_out: candidate.amount_out,
                total_price_impact_pct: candidate.total_price_impact_pct,
                total_fee_usd: candidate.total_fee_usd,
                min_liquidity_usd: candidate.min_liquidity_usd,
                gas_estimate,
                gas_cost_usd,
                expected_slippage_pct,
                confidence,
                efficiency_score,
                estimated_time_ms,
                steps: candidate.steps,
            });
        }

        routes.sort_by(|a, b| {
            b.efficiency_score
                .partial_cmp(&a.efficiency_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.dex_path().cmp(&b.dex_path()))
        });

        if filtered.total() > 0 {
            debug!(
                "Filtered {} candidates on {}: {} impact, {} liquidity, {} unprofitable",
                filtered.total(),
                chain,
                filtered.price_impact,
                filtered.thin_liquidity,
                filtered.unprofitable
            );
        }
        Ok(RankOutcome { routes, filtered })
    }

    /// Complexity-and-liquidity-adjusted slippage expectation
    fn expected_slippage(&self, candidate: &CandidateRoute) -> f64 {
        let complexity = 1.0 + 0.25 * (candidate.hops() as f64 - 1.0);
        let depth_pressure = 1.0 + (candidate.amount_in / candidate.min_liquidity_usd).min(2.0);
        BASE_SLIPPAGE_PCT * complexity * depth_pressure
    }

    /// Confidence (0-100) penalizing hops, impact, thin pools and gas share
    fn confidence(&self, candidate: &CandidateRoute, gas_cost_usd: f64) -> f64 {
        let mut confidence = 100.0;
        confidence -= 7.0 * (candidate.hops() as f64 - 1.0);
        confidence -= 3.0 * candidate.total_price_impact_pct;

        let comfortable = self.config.min_liquidity_usd * 2.0;
        if candidate.min_liquidity_usd < comfortable {
            confidence -= 10.0 * (1.0 - candidate.min_liquidity_usd / comfortable);
        }

        confidence -= (gas_cost_usd / candidate.amount_in * 100.0).min(20.0);
        confidence.clamp(0.0, 100.0)
    }

    async fn swap_gas_quote(&self, chain: ChainId) -> Result<GasQuote> {
        let key = (chain, self.config.gas_priority);
        if let Some(quote) = self.gas_cache.get(&key) {
            return Ok(quote);
        }

        let dependency = Resilience::key("gas-oracle", chain);
        let oracle = self.gas_oracle.clone();
        let priority = self.config.gas_priority;
        let quote = self
            .resilience
            .call(&dependency, "estimate_gas", move || {
                let oracle = oracle.clone();
                async move { oracle.estimate(chain, GasOperation::Swap, priority).await }
            })
            .await?;

        self.gas_cache.insert(key, quote);
        Ok(quote)
    }

    async fn native_price(&self, chain: ChainId) -> Result<f64> {
        if let Some(price) = self.price_cache.get(&chain) {
            return Ok(price);
        }

        let dependency = Resilience::key("price-oracle", chain);
        let oracle = self.price_oracle.clone();
        let price = self
            .resilience
            .call(&dependency, "native_price_usd", move || {
                let oracle = oracle.clone();
                async move { oracle.native_price_usd(chain).await }
            })
            .await?;

        self.price_cache.insert(chain, price);
        Ok(price)
    }
}

/// Gas for a swap through one venue
fn venue_gas(dex: &str, version: ProtocolVersion) -> u64 {
    let base = match version {
        ProtocolVersion::V2 => 120_000,
        ProtocolVersion::V3 => 150_000,
        ProtocolVersion::Stable => 135_000,
    };
    // Heavyweight routers cost extra regardless of generation
    let venue_extra = match dex {
        "balancer" => 30_000,
        "curve" => 25_000,
        _ => 0,
    };
    base + venue_extra
}

/// Gas for the whole route transaction
fn route_gas(candidate: &CandidateRoute) -> u64 {
    let hop_gas: u64 = candidate
        .steps
        .iter()
        .map(|step| venue_gas(&step.dex, step.version))
        .sum();
    let discount = MULTI_HOP_DISCOUNT * candidate.hops().saturating_sub(1) as u64;
    (BASE_TX_GAS + hop_gas).saturating_sub(discount)
}

/// Efficiency score: net value shaped by impact, liquidity and confidence
fn efficiency(net_value: f64, candidate: &CandidateRoute, confidence: f64) -> f64 {
    let impact_penalty = candidate.total_price_impact_pct / 100.0 * 0.5;
    let liquidity_bonus = (candidate.min_liquidity_usd / 1_000_000.0).min(1.0) * 0.1;
    let confidence_bonus = confidence / 100.0 * 0.1;
    net_value * (1.0 - impact_penalty + liquidity_bonus + confidence_bonus)
}

/// Wall-clock estimate to confirmation
fn estimated_time_ms(chain: ChainId, hops: usize) -> u64 {
    chain.block_time_ms() * 2 + 500 * hops as u64
}
